//! The catalog of models a conversation can be bound to.
use std::time::Duration;

use anyhow::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl Model {
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

/// Response shape of the catalog endpoint.
#[derive(Serialize, Deserialize, Debug)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<Model>,
}

impl ModelList {
    pub fn new(data: Vec<Model>) -> Self {
        Self {
            object: String::from("list"),
            data,
        }
    }
}

pub fn builtin_models() -> Vec<Model> {
    vec![
        Model::new("deepseek", "DeepSeek", "快速且经济的聊天模型"),
        Model::new(
            "supermind-agent-v1",
            "Supermind Agent",
            "多工具代理，支持网络搜索和 Gemini 切换",
        ),
        Model::new("gemini-2.5-pro", "Gemini 2.5 Pro", "Google Gemini 模型直接访问"),
        Model::new("gemini-3-flash-preview", "Gemini 3 Flash", "快速的 Gemini 推理模型"),
        Model::new("gpt-5", "GPT-5", "OpenAI 兼容提供商"),
        Model::new("grok-4-fast", "Grok 4 Fast", "X.AI Grok API 直通"),
    ]
}

/// Fetches the catalog from a running proxy, e.g.
/// `http://127.0.0.1:2222/api/models`.
pub async fn fetch_models(url: &str) -> Result<Vec<Model>, Error> {
    let list: ModelList = reqwest::Client::new()
        .get(url)
        .timeout(Duration::from_secs(10))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(list.data)
}

/// The catalog at `url` when there is one and it can be fetched,
/// otherwise the built-in list.
pub async fn load_models(url: Option<&str>) -> Vec<Model> {
    let Some(url) = url else {
        return builtin_models();
    };
    match fetch_models(url).await {
        Ok(models) if !models.is_empty() => models,
        Ok(_) => {
            tracing::warn!("Catalog at {} is empty, using built-in models", url);
            builtin_models()
        }
        Err(e) => {
            tracing::warn!("Failed to fetch catalog from {}, using built-in models: {}", url, e);
            builtin_models()
        }
    }
}
