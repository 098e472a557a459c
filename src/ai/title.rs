//! Short conversation titles derived from the first user message.
use std::time::Duration;

use tokio::time::timeout;

use super::exchange::first_choice_content;
use crate::openai::{BoxedCompletionClient, CompletionError, CompletionRequest, Message, Role};

/// Title of a conversation before it is summarized.
pub const PLACEHOLDER_TITLE: &str = "新对话";

const TITLE_SYSTEM_PROMPT: &str = "你是一个标题生成助手。请根据用户的第一条消息，生成一个简短的中文标题（不超过15个字）。只返回标题，不要其他内容，不要加引号，不要加任何解释。";
const TITLE_REQUEST_PREFIX: &str = "请为以下对话生成一个简短标题：";
const TITLE_TIMEOUT: Duration = Duration::from_secs(10);
const TITLE_MAX_TOKENS: u32 = 30;
const TITLE_TEMPERATURE: f32 = 0.7;
const QUOTES: &[char] = &['"', '\'', '「', '」', '『', '』'];

/// Longest generated title that is accepted as is.
const MAX_TITLE_CHARS: usize = 20;
/// Length of the title cut from the message when falling back.
const FALLBACK_TITLE_CHARS: usize = 15;

pub struct TitleSummarizer {
    client: BoxedCompletionClient,
    model: String,
}

impl TitleSummarizer {
    pub fn new(client: BoxedCompletionClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }

    /// Returns a title for a conversation starting with
    /// `first_message`. Never fails: any problem with the completion
    /// call degrades to `fallback_title`.
    pub async fn summarize(&self, first_message: &str) -> String {
        match self.request_title(first_message).await {
            Ok(raw) => accept_title(&raw, first_message),
            Err(e) => {
                tracing::warn!("Title generation failed, using fallback: {}", e);
                fallback_title(first_message)
            }
        }
    }

    async fn request_title(&self, first_message: &str) -> Result<String, CompletionError> {
        let request = CompletionRequest::new(
            &self.model,
            vec![
                Message::new(Role::System, TITLE_SYSTEM_PROMPT),
                Message::new(
                    Role::User,
                    &format!("{TITLE_REQUEST_PREFIX}{first_message}"),
                ),
            ],
        )
        .max_tokens(TITLE_MAX_TOKENS)
        .temperature(TITLE_TEMPERATURE);

        let resp = timeout(TITLE_TIMEOUT, self.client.completion(&request))
            .await
            .map_err(|_| CompletionError::Timeout)??;
        first_choice_content(&resp)
    }
}

/// Strips one leading and one trailing quote character.
pub fn clean_title(raw: &str) -> String {
    let title = raw.trim();
    let title = title.strip_prefix(QUOTES).unwrap_or(title);
    let title = title.strip_suffix(QUOTES).unwrap_or(title);
    title.trim().to_string()
}

/// Cleans a generated title, replacing it with the fallback when it
/// is empty or too long.
pub fn accept_title(raw: &str, first_message: &str) -> String {
    let title = clean_title(raw);
    if title.is_empty() || title.chars().count() > MAX_TITLE_CHARS {
        fallback_title(first_message)
    } else {
        title
    }
}

pub fn fallback_title(first_message: &str) -> String {
    let title: String = first_message.chars().take(FALLBACK_TITLE_CHARS).collect();
    if title.is_empty() {
        PLACEHOLDER_TITLE.to_string()
    } else {
        title
    }
}
