use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;
use crate::models::{
    GeneratedComponent, GeneratedQuery, ResultData, SchemaInfo, VisualizationPreferences,
    VisualizationSpec,
};

/// One data source's schema as presented to the model.
#[derive(Debug, Clone)]
pub struct SourceSchema {
    pub name: String,
    pub schema: SchemaInfo,
}

/// Sample rows retrieved from one data source.
#[derive(Debug, Clone)]
pub struct SourceSample {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Value>,
    pub total_rows: usize,
}

/// Aggregate context for the single dashboard-code generation call.
#[derive(Debug, Clone)]
pub struct DashboardContext {
    pub title: String,
    pub description: Option<String>,
    pub user_query: Option<String>,
    pub schemas: Vec<SourceSchema>,
}

/// The multi-chart program fragment a provider returns for a dashboard.
#[derive(Debug, Clone)]
pub struct DashboardCode {
    pub react_code: String,
    pub components: Vec<GeneratedComponent>,
    pub reasoning: String,
    pub model: String,
}

/// Capability abstraction over one backing language-model service. Each
/// implementation owns prompt construction, response-envelope normalization
/// and error translation.
///
/// Leniency asymmetry, deliberately preserved: `generate_query` and
/// `generate_dashboard_code` are strict (failures propagate),
/// `recommend_visualization` is lenient (always returns a spec, falling
/// back to the deterministic default), and `health_check` never fails.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Translates a natural-language question into an executable query for
    /// the given source kind. Connection and timeout failures map to
    /// `AppError::LlmConnection`; a response that cannot be normalized into
    /// a query maps to `AppError::LlmResponse`.
    async fn generate_query(
        &self,
        question: &str,
        schema: &SchemaInfo,
        context: Option<&str>,
        source_type: &str,
    ) -> Result<GeneratedQuery, AppError>;

    /// Recommends a chart for a query result. Never fails: any failure,
    /// including transport errors, yields the deterministic default spec.
    async fn recommend_visualization(
        &self,
        result: &ResultData,
        question: &str,
    ) -> VisualizationSpec;

    /// One holistic multi-chart code generation call per dashboard request.
    async fn generate_dashboard_code(
        &self,
        context: &DashboardContext,
        samples: &[SourceSample],
        preferences: Option<&VisualizationPreferences>,
    ) -> Result<DashboardCode, AppError>;

    /// Never raises; any failure collapses to `false`.
    async fn health_check(&self) -> bool;
}
