//! Router for the chat API

use std::convert::Infallible;
use std::sync::{Arc, RwLock};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response, sse::Event, sse::KeepAlive, sse::Sse},
    routing::post,
};
use futures_util::StreamExt;

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::openai::CompletionRequest;

type SharedState = Arc<RwLock<AppState>>;

/// Relay a completion request to the upstream service, either as a
/// single JSON response or re-framed as SSE content events
async fn chat_handler(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload: public::ChatRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!("Rejecting chat request: {}", e);
        ApiError::invalid_input(public::MESSAGES_REQUIRED)
    })?;
    let messages = payload
        .messages
        .ok_or_else(|| ApiError::invalid_input(public::MESSAGES_REQUIRED))?;

    let (client, default_model, temperature) = {
        let shared_state = state.read().expect("Unable to read share state");
        (
            Arc::clone(&shared_state.client),
            shared_state.config.default_model.clone(),
            shared_state.config.temperature,
        )
    };
    let model = payload
        .model
        .filter(|model| !model.is_empty())
        .unwrap_or(default_model);
    let request = CompletionRequest::new(&model, messages).temperature(temperature);

    if !payload.stream.unwrap_or(false) {
        let resp = client.completion(&request).await?;
        return Ok(Json(resp).into_response());
    }

    let chunks = client.completion_stream(&request).await?;
    let events = chunks.filter_map(|chunk| async move {
        match chunk {
            Ok(content) if content.is_empty() => None,
            Ok(content) => {
                let data = serde_json::to_string(&public::ChatChunk { content }).ok()?;
                Some(Ok::<Event, Infallible>(Event::default().data(data)))
            }
            Err(e) => {
                // Headers are already sent, closing the stream is all that is left
                tracing::error!("Upstream stream failed: {}", e);
                None
            }
        }
    });

    Ok(Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new().route("/", post(chat_handler))
}
