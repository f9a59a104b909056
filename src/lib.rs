// Insight Studio Backend Library
// Exposes the query pipeline, connectors and LLM providers for external use

pub mod api;
pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod state;
pub mod utils;

// Re-export commonly used types for convenience
pub use crate::config::Config;
pub use crate::core::llm::LlmProvider;
pub use crate::core::pipeline::{DashboardOrchestrator, QueryExecutor};
pub use crate::error::AppError;
pub use crate::state::AppState;
pub use crate::utils::datasource::{ConnectorRegistry, DataSourceConnector, TabularResult};
