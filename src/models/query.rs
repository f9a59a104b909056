use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::visualization::VisualizationSpec;

/// The language a generated query is written in, matching what the target
/// connector accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// SQL text for relational connectors.
    Sql,
    /// The constrained frame expression language for flat-file connectors.
    Frame,
}

impl QueryType {
    pub fn for_source_type(source_type: &str) -> Self {
        match source_type {
            "csv" => QueryType::Frame,
            _ => QueryType::Sql,
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryType::Sql => write!(f, "sql"),
            QueryType::Frame => write!(f, "frame"),
        }
    }
}

/// An executable query produced by an LLM provider or the fallback policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub query: String,
    pub query_type: QueryType,
    pub explanation: String,
}

/// JSON-safe query result as produced by the materializer: every row holds
/// exactly the keys in `columns`, missing values are null, and
/// `row_count == rows.len()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultData {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    pub row_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl QueryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryStatus::Completed | QueryStatus::Failed)
    }
}

/// Record of one single-query pipeline run, shaped for the persistence
/// boundary. Status advances pending -> processing -> {completed, failed}
/// and never leaves a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: Uuid,
    pub natural_language_query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source_id: Option<Uuid>,
    pub status: QueryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_type: Option<QueryType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_data: Option<ResultData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization: Option<VisualizationSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl QueryRecord {
    pub fn new(natural_language_query: String, data_source_id: Option<Uuid>) -> Self {
        QueryRecord {
            id: Uuid::new_v4(),
            natural_language_query,
            data_source_id,
            status: QueryStatus::Pending,
            generated_query: None,
            query_type: None,
            result_data: None,
            visualization: None,
            error_message: None,
            execution_time_ms: None,
            created_at: Utc::now(),
        }
    }

    /// pending -> processing. Ignored once the run is terminal.
    pub fn begin(&mut self) {
        if !self.status.is_terminal() {
            self.status = QueryStatus::Processing;
        }
    }

    pub fn complete(&mut self, elapsed_ms: u64) {
        if !self.status.is_terminal() {
            self.status = QueryStatus::Completed;
            self.execution_time_ms = Some(elapsed_ms);
        }
    }

    /// The failed transition is the only place `error_message` is set;
    /// elapsed time is stamped so callers can tell a fast failure from one
    /// that did partial work.
    pub fn fail(&mut self, message: String, elapsed_ms: u64) {
        if !self.status.is_terminal() {
            self.status = QueryStatus::Failed;
            self.error_message = Some(message);
            self.execution_time_ms = Some(elapsed_ms);
        }
    }
}
