pub mod anthropic;
pub mod base;
pub mod parsing;

use std::sync::Arc;

pub use base::{DashboardCode, DashboardContext, LlmProvider, SourceSample, SourceSchema};

use crate::config::Config;
use crate::error::AppError;

/// Registry lookup: maps the configured provider name to an LLM provider
/// instance. Unrecognized configuration is a startup-time error.
pub fn create_llm_provider(config: &Config) -> Result<Arc<dyn LlmProvider>, AppError> {
    match config.llm_provider.to_lowercase().as_str() {
        "anthropic" => Ok(Arc::new(anthropic::AnthropicProvider::new(config)?)),
        other => Err(AppError::Config(format!("unknown LLM provider: {}", other))),
    }
}
