//! Public types for the chat API
use serde::{Deserialize, Serialize};

use crate::openai::Message;

pub const MESSAGES_REQUIRED: &str = "Messages array is required";

#[derive(Deserialize)]
pub struct ChatRequest {
    pub messages: Option<Vec<Message>>,
    // Missing or empty falls back to the configured default model
    pub model: Option<String>,
    pub stream: Option<bool>,
}

/// Payload of each event of a streamed reply.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatChunk {
    pub content: String,
}
