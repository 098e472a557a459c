use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::Stream;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::time::timeout;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

/// A single entry of the history sent to the completion endpoint.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(model: &str, messages: Vec<Message>) -> Self {
        Self {
            model: model.to_string(),
            messages,
            stream: false,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("request to completion service failed: {0}")]
    Network(reqwest::Error),
    #[error("completion service timed out")]
    Timeout,
    #[error("completion service responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed completion response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Network(err)
        }
    }
}

impl From<serde_json::Error> for CompletionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Content deltas of a streamed completion, in arrival order.
pub type ContentStream = BoxStream<'static, Result<String, CompletionError>>;

/// The seam to an OpenAI compatible chat completion API.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the raw completion response body.
    async fn completion(&self, request: &CompletionRequest) -> Result<Value, CompletionError>;

    /// Opens a streamed completion. Errors that happen before the
    /// first byte (connection, non-success status) are returned
    /// directly, later ones are yielded by the stream.
    async fn completion_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<ContentStream, CompletionError>;
}

pub type BoxedCompletionClient = Arc<dyn CompletionClient>;

/// `CompletionClient` talking HTTP to `{api_base}/chat/completions`.
#[derive(Clone, Debug)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn new(api_base: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout,
        }
    }

    fn post(&self, request: &CompletionRequest) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(request)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CompletionError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CompletionError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn completion(&self, request: &CompletionRequest) -> Result<Value, CompletionError> {
        let mut request = request.clone();
        request.stream = false;
        // Bounds the whole exchange, body included
        let response = self.post(&request).timeout(self.timeout).send().await?;
        let response = check_status(response).await?.json().await?;
        Ok(response)
    }

    async fn completion_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<ContentStream, CompletionError> {
        let request = request.clone().streaming();
        // A long reply may take longer than the timeout, so only the
        // wait for headers and the gaps between chunks are bounded
        let response = timeout(self.timeout, self.post(&request).send())
            .await
            .map_err(|_| CompletionError::Timeout)??;
        let response = check_status(response).await?;
        Ok(Box::pin(content_stream(response.bytes_stream(), self.timeout)))
    }
}

/// Turns the raw SSE byte stream of a completion into content deltas.
/// Waiting longer than `idle` for the next chunk is a timeout.
fn content_stream<S, B>(
    bytes: S,
    idle: Duration,
) -> impl Stream<Item = Result<String, CompletionError>> + Send
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    try_stream! {
        let mut bytes = Box::pin(bytes);
        // Events can be split across HTTP frames so bytes are buffered
        // until a full event delimiter arrives.
        let mut buffer: Vec<u8> = Vec::new();
        let mut done = false;

        'outer: loop {
            let chunk = match timeout(idle, bytes.next()).await {
                Ok(Some(chunk)) => chunk?,
                Ok(None) => break,
                Err(_) => Err(CompletionError::Timeout)?,
            };
            buffer.extend_from_slice(chunk.as_ref());

            while let Some((event_end, delimiter_len)) = find_event_end(&buffer) {
                let event: Vec<u8> = buffer.drain(..event_end + delimiter_len).collect();
                match parse_sse_event(&decode_event(event)?)? {
                    SseEvent::Content(content) => yield content,
                    SseEvent::Skip => {}
                    SseEvent::Done => {
                        done = true;
                        break 'outer;
                    }
                }
            }
        }

        // The last event may not be followed by a blank line
        if !done && !buffer.is_empty() {
            if let SseEvent::Content(content) = parse_sse_event(&decode_event(buffer)?)? {
                yield content;
            }
        }
    }
}

fn decode_event(event: Vec<u8>) -> Result<String, CompletionError> {
    String::from_utf8(event).map_err(|e| CompletionError::Malformed(e.to_string()))
}

/// Position and length of the first blank line separating two events.
fn find_event_end(buffer: &[u8]) -> Option<(usize, usize)> {
    const DELIMITERS: [&[u8]; 3] = [b"\r\n\r\n", b"\n\n", b"\r\r"];
    DELIMITERS
        .iter()
        .filter_map(|delimiter| {
            buffer
                .windows(delimiter.len())
                .position(|w| w == *delimiter)
                .map(|position| (position, delimiter.len()))
        })
        .min_by_key(|(position, _)| *position)
}

#[derive(Debug, PartialEq)]
pub enum SseEvent {
    Content(String),
    Skip,
    Done,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunkChoice {
    delta: Option<Delta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<CompletionChunkChoice>,
}

/// Parses one server-sent event of a streamed completion.
pub fn parse_sse_event(event: &str) -> Result<SseEvent, CompletionError> {
    let event = event.trim();
    let Some(data) = event.strip_prefix("data:") else {
        return Ok(SseEvent::Skip);
    };
    let data = data.trim();

    if data.is_empty() {
        return Ok(SseEvent::Skip);
    }
    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }

    let chunk = serde_json::from_str::<CompletionChunk>(data).inspect_err(|e| {
        tracing::error!("Parsing completion chunk failed for {}\nError:{}", data, e)
    })?;
    let Some(choice) = chunk.choices.first() else {
        return Ok(SseEvent::Skip);
    };

    match choice.delta.as_ref().and_then(|d| d.content.clone()) {
        Some(content) if !content.is_empty() => Ok(SseEvent::Content(content)),
        _ if choice.finish_reason.is_some() => Ok(SseEvent::Done),
        _ => Ok(SseEvent::Skip),
    }
}
