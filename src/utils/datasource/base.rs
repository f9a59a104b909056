use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::models::SchemaInfo;

/// The universal in-pipeline data shape every connector returns: named
/// columns plus one JSON object per row.
#[derive(Debug, Clone, Default)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl TabularResult {
    pub fn new(columns: Vec<String>, rows: Vec<Map<String, Value>>) -> Self {
        TabularResult { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Capability contract for reading schema and data from one kind of
/// external tabular source. Pure I/O and format translation; orchestration
/// lives in the pipelines.
///
/// `connect` distinguishes `AppError::Connection` (unreachable, credentials
/// rejected) from `AppError::NotFound` (referenced resource absent) because
/// callers surface them differently. `get_schema` is idempotent. Connectors
/// may cache loaded state after `connect`; the cache is private to the
/// instance.
#[async_trait]
pub trait DataSourceConnector: Send + Sync {
    async fn connect(&mut self) -> Result<(), AppError>;

    async fn disconnect(&mut self);

    async fn get_schema(&self) -> Result<SchemaInfo, AppError>;

    /// Interprets `query` in the connector's native query language: SQL for
    /// relational connectors, the frame expression language for flat files.
    /// Failures are `AppError::Execution`.
    async fn execute_query(&self, query: &str) -> Result<TabularResult, AppError>;

    /// The entire source as one result, where a "whole source" notion
    /// exists. Relational connectors fail here and direct the caller to
    /// `execute_query` with an explicit target.
    async fn get_full_data(&self) -> Result<TabularResult, AppError>;
}
