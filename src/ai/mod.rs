pub mod catalog;
pub mod exchange;
pub mod title;

pub use catalog::{Model, builtin_models, fetch_models, load_models};
pub use exchange::MessageExchangeService;
pub use title::{PLACEHOLDER_TITLE, TitleSummarizer};
