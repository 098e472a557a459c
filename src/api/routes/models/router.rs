//! Router for the model catalog

use std::sync::{Arc, RwLock};

use axum::{Json, Router, extract::State, routing::get};

use crate::ai::catalog::ModelList;
use crate::api::state::AppState;

type SharedState = Arc<RwLock<AppState>>;

async fn models_handler(State(state): State<SharedState>) -> Json<ModelList> {
    let models = state.read().expect("Unable to read share state").models.clone();
    Json(ModelList::new(models))
}

pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(models_handler))
}
