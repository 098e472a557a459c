//! OpenAI compatible chat completion API client.
mod core;

pub use self::core::*;
