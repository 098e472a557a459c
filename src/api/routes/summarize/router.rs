//! Router for the summarize API

use std::sync::{Arc, RwLock};

use axum::{Json, Router, body::Bytes, extract::State, routing::post};
use serde_json::Value;

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;

type SharedState = Arc<RwLock<AppState>>;

/// Generate a title for a conversation from its first message. An
/// upstream failure still answers with the fallback title.
async fn summarize_handler(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<public::SummarizeResponse>, ApiError> {
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|_| ApiError::invalid_input(public::MESSAGE_REQUIRED))?;
    let message = payload["message"]
        .as_str()
        .filter(|message| !message.is_empty())
        .ok_or_else(|| ApiError::invalid_input(public::MESSAGE_REQUIRED))?;

    let summarizer = Arc::clone(&state.read().expect("Unable to read share state").summarizer);
    let title = summarizer.summarize(message).await;

    Ok(Json(public::SummarizeResponse { title }))
}

pub fn router() -> Router<SharedState> {
    Router::new().route("/", post(summarize_handler))
}
