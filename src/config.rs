use anyhow::Result;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub llm_provider: String,
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub anthropic_base_url: String,
    /// Timeout applied to each individual LLM call.
    pub llm_timeout_secs: u64,
    /// Timeout applied to each individual connector call.
    pub connector_timeout_secs: u64,
    /// Upper bound on data sources processed concurrently per dashboard.
    pub max_concurrent_sources: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let is_production = env::var("RUST_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            == "production";

        Ok(Config {
            server_address: env::var("SERVER_ADDRESS").unwrap_or_else(|_| {
                if is_production {
                    "0.0.0.0:7690".to_string()
                } else {
                    "127.0.0.1:7690".to_string()
                }
            }),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "anthropic".to_string()),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            anthropic_model: env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-5-20250929".to_string()),
            anthropic_base_url: env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string()),
            llm_timeout_secs: env::var("LLM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            connector_timeout_secs: env::var("CONNECTOR_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            max_concurrent_sources: env::var("MAX_CONCURRENT_SOURCES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
        })
    }
}
