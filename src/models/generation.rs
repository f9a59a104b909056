use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::query::QueryType;
use super::visualization::ChartType;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualizationPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_types: Option<Vec<ChartType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Optional natural-language query augmenting the dashboard description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization_preferences: Option<VisualizationPreferences>,
}

/// Metadata for one chart component in the generated dashboard code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedComponent {
    pub name: String,
    pub chart_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub data_keys: Vec<String>,
}

/// Summary of the query that was actually executed for one data source.
/// When the fallback policy kicked in, `explanation` says so.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuerySummary {
    pub data_source_id: Uuid,
    pub data_source_name: String,
    pub query: String,
    pub query_type: QueryType,
    pub row_count: usize,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceTiming {
    pub data_source_id: Uuid,
    pub data_source_name: String,
    pub schema_fetch_ms: u64,
    pub query_generation_ms: u64,
    pub query_execution_ms: u64,
    pub materialization_ms: u64,
    pub total_ms: u64,
}

/// Wall-clock breakdown of one generation run. Per-source figures are
/// measured independently inside each source's task, not derived from the
/// pipeline-wide elapsed time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingMetrics {
    pub data_source_timings: Vec<DataSourceTiming>,
    pub total_data_sources_ms: u64,
    pub visualization_generation_ms: u64,
    pub response_assembly_ms: u64,
    pub total_ms: u64,
}

/// Final result of one dashboard generation request. Assembled once and
/// immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub dashboard_id: Uuid,
    pub dashboard_title: String,
    pub react_code: String,
    pub components: Vec<GeneratedComponent>,
    pub data_sources_used: Vec<Uuid>,
    pub queries_generated: Vec<GeneratedQuerySummary>,
    /// Sample rows keyed by data source name.
    pub sample_data: BTreeMap<String, Vec<Value>>,
    pub execution_time_ms: u64,
    pub timing_metrics: TimingMetrics,
    pub metadata: Value,
}
