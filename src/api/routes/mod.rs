//! API routes module

pub mod chat;
mod models;
pub mod summarize;

use std::sync::{Arc, RwLock};

use crate::api::state::AppState;
use axum::Router;

type SharedState = Arc<RwLock<AppState>>;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Completion proxy
        .nest("/chat", chat::router())
        // Title generation proxy
        .nest("/summarize", summarize::router())
        // Model catalog
        .nest("/models", models::router())
}
