//! One round trip against the completion service.
use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;

use crate::openai::{BoxedCompletionClient, CompletionError, CompletionRequest, Message};

const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(60);

pub struct MessageExchangeService {
    client: BoxedCompletionClient,
    temperature: f32,
    timeout: Duration,
}

impl MessageExchangeService {
    pub fn new(client: BoxedCompletionClient, temperature: f32) -> Self {
        Self {
            client,
            temperature,
            timeout: EXCHANGE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends the whole `history` to `model` and returns the content of
    /// the first choice. No retry is attempted. Taking longer than the
    /// timeout fails like any other upstream error.
    pub async fn exchange(&self, history: &[Message], model: &str) -> Result<String, CompletionError> {
        let request =
            CompletionRequest::new(model, history.to_vec()).temperature(self.temperature);
        tracing::debug!("Requesting completion from {} with {} messages", model, history.len());

        let resp = timeout(self.timeout, self.client.completion(&request))
            .await
            .map_err(|_| CompletionError::Timeout)??;
        first_choice_content(&resp)
    }
}

/// Extracts `choices[0].message.content`. Missing content and an
/// empty `choices` array both yield an empty reply.
pub fn first_choice_content(resp: &Value) -> Result<String, CompletionError> {
    let choices = resp["choices"]
        .as_array()
        .ok_or_else(|| CompletionError::Malformed(format!("missing choices: {}", resp)))?;

    match choices.first().map(|choice| &choice["message"]["content"]) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(content)) => Ok(content.clone()),
        Some(other) => Err(CompletionError::Malformed(format!(
            "unexpected content: {}",
            other
        ))),
    }
}
