use std::sync::Arc;

use crate::ai::{Model, TitleSummarizer, builtin_models};
use crate::core::AppConfig;
use crate::openai::{BoxedCompletionClient, OpenAiClient};

pub struct AppState {
    pub config: AppConfig,
    // Upstream completion service every proxy route talks to
    pub client: BoxedCompletionClient,
    pub summarizer: Arc<TitleSummarizer>,
    pub models: Vec<Model>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let client: BoxedCompletionClient = Arc::new(OpenAiClient::new(
            &config.api_base_url,
            &config.api_key,
            config.request_timeout,
        ));
        Self::with_client(config, client)
    }

    pub fn with_client(config: AppConfig, client: BoxedCompletionClient) -> Self {
        let summarizer = Arc::new(TitleSummarizer::new(
            Arc::clone(&client),
            &config.summary_model,
        ));
        Self {
            config,
            client,
            summarizer,
            models: builtin_models(),
        }
    }
}
