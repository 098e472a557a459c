//! Conversation records as they are kept in memory and persisted.
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::PLACEHOLDER_TITLE;
use crate::openai::{self, Role};

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Ids sort roughly by creation time: `<prefix>_<epoch ms>_<random>`.
fn new_id(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", prefix, now_millis(), &suffix[..8])
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Self {
            id: new_id("msg"),
            role,
            content: content.to_string(),
            timestamp: now_millis(),
        }
    }

    /// The same message with its content replaced by an edit.
    pub fn edited(&self, content: &str) -> Self {
        Self {
            id: self.id.clone(),
            role: self.role,
            content: content.to_string(),
            timestamp: now_millis(),
        }
    }

    pub fn to_chat_message(&self) -> openai::Message {
        openai::Message::new(self.role, &self.content)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub model: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Conversation {
    pub fn new(model: &str) -> Self {
        let now = now_millis();
        Self {
            id: new_id("conv"),
            title: PLACEHOLDER_TITLE.to_string(),
            messages: Vec::new(),
            model: model.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks the conversation as modified.
    pub fn touch(&mut self) {
        self.updated_at = now_millis().max(self.created_at);
    }

    /// The round-trip context sent to the completion service.
    pub fn history(&self) -> Vec<openai::Message> {
        self.messages.iter().map(Message::to_chat_message).collect()
    }
}
