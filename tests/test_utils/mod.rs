//! Test utilities for integration tests
#![allow(dead_code)]
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::{Router, body::Body};

use parley::api::AppState;
use parley::api::app;
use parley::core::AppConfig;

/// Config pointing every upstream call at `upstream_base`, typically
/// a `mockito` server url.
pub fn test_config(upstream_base: &str, storage_path: &str) -> AppConfig {
    AppConfig {
        api_base_url: format!("{}/v1", upstream_base),
        api_key: String::from("test-api-key"),
        default_model: String::from("supermind-agent-v1"),
        summary_model: String::from("deepseek"),
        temperature: 0.7,
        request_timeout: Duration::from_secs(5),
        storage_path: storage_path.to_string(),
        catalog_url: None,
    }
}

/// Creates a test application router whose upstream completion
/// service is `upstream_base`.
pub fn test_app(upstream_base: &str) -> Router {
    let app_state = AppState::new(test_config(upstream_base, "./"));
    app(Arc::new(RwLock::new(app_state)))
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not utf-8")
}

/// A non-streaming upstream completion carrying `content`.
pub fn completion_body(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
    .to_string()
}
