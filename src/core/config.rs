use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_base_url: String,
    pub api_key: String,
    pub default_model: String,
    pub summary_model: String,
    pub temperature: f32,
    pub request_timeout: Duration,
    pub storage_path: String,
    pub catalog_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let api_base_url = env::var("PARLEY_API_BASE_URL")
            .unwrap_or_else(|_| "https://space.ai-builders.com/backend/v1".to_string());
        let api_key = env::var("PARLEY_API_KEY")
            .or_else(|_| env::var("AI_BUILDER_TOKEN"))
            .unwrap_or_default();
        let default_model =
            env::var("PARLEY_DEFAULT_MODEL").unwrap_or_else(|_| "supermind-agent-v1".to_string());
        let summary_model =
            env::var("PARLEY_SUMMARY_MODEL").unwrap_or_else(|_| "deepseek".to_string());
        let temperature = env::var("PARLEY_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .unwrap_or(0.7);
        let request_timeout = env::var("PARLEY_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));
        let storage_path = env::var("PARLEY_STORAGE_PATH").unwrap_or("./".to_string());
        let catalog_url = env::var("PARLEY_CATALOG_URL").ok().filter(|v| !v.is_empty());

        Self {
            api_base_url,
            api_key,
            default_model,
            summary_model,
            temperature,
            request_timeout,
            storage_path,
            catalog_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "PARLEY_API_BASE_URL",
        "PARLEY_API_KEY",
        "AI_BUILDER_TOKEN",
        "PARLEY_DEFAULT_MODEL",
        "PARLEY_SUMMARY_MODEL",
        "PARLEY_TEMPERATURE",
        "PARLEY_REQUEST_TIMEOUT_SECS",
        "PARLEY_STORAGE_PATH",
        "PARLEY_CATALOG_URL",
    ];

    fn clear_env() {
        for var in VARS {
            // Tests touching the environment are serialized
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn it_uses_defaults() {
        clear_env();
        let config = AppConfig::default();
        assert_eq!(config.api_base_url, "https://space.ai-builders.com/backend/v1");
        assert_eq!(config.api_key, "");
        assert_eq!(config.default_model, "supermind-agent-v1");
        assert_eq!(config.summary_model, "deepseek");
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.storage_path, "./");
        assert!(config.catalog_url.is_none());
    }

    #[test]
    #[serial]
    fn it_reads_overrides() {
        clear_env();
        unsafe {
            env::set_var("PARLEY_API_BASE_URL", "http://localhost:9999/v1");
            env::set_var("AI_BUILDER_TOKEN", "token-from-builder");
            env::set_var("PARLEY_TEMPERATURE", "0.2");
            env::set_var("PARLEY_REQUEST_TIMEOUT_SECS", "5");
            env::set_var("PARLEY_CATALOG_URL", "http://localhost:2222/api/models");
        }
        let config = AppConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:9999/v1");
        assert_eq!(config.api_key, "token-from-builder");
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(
            config.catalog_url.as_deref(),
            Some("http://localhost:2222/api/models")
        );

        unsafe { env::set_var("PARLEY_API_KEY", "explicit") };
        assert_eq!(AppConfig::default().api_key, "explicit");

        unsafe { env::set_var("PARLEY_TEMPERATURE", "warm") };
        assert_eq!(AppConfig::default().temperature, 0.7);
        clear_env();
    }
}
