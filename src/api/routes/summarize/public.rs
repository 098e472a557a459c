//! Public types for the summarize API
use serde::{Deserialize, Serialize};

pub const MESSAGE_REQUIRED: &str = "Message is required";

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SummarizeResponse {
    pub title: String,
}
