//! The dashboard generation pipeline: per-source schema/query/execution
//! fan-out, one holistic code-generation call, and timed response assembly.

use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::fallback::execute_with_fallback;
use super::with_timeout;
use crate::config::Config;
use crate::core::data::processor;
use crate::core::llm::{DashboardContext, LlmProvider, SourceSample, SourceSchema};
use crate::error::AppError;
use crate::models::{
    Dashboard, DataSource, DataSourceTiming, GenerateRequest, GenerateResponse,
    GeneratedQuery, GeneratedQuerySummary, ResultData, SchemaInfo, TimingMetrics,
};
use crate::utils::datasource::ConnectorRegistry;

pub struct DashboardOrchestrator {
    llm: Arc<dyn LlmProvider>,
    connectors: Arc<dyn ConnectorRegistry>,
    connector_timeout: Duration,
    max_concurrent_sources: usize,
}

/// Everything one successfully processed data source contributes to the
/// aggregate generation context.
struct SourceOutcome {
    schema: SchemaInfo,
    data: ResultData,
    query: GeneratedQuery,
    timing: DataSourceTiming,
}

impl DashboardOrchestrator {
    pub fn new(
        config: &Config,
        llm: Arc<dyn LlmProvider>,
        connectors: Arc<dyn ConnectorRegistry>,
    ) -> Self {
        DashboardOrchestrator {
            llm,
            connectors,
            connector_timeout: Duration::from_secs(config.connector_timeout_secs),
            max_concurrent_sources: config.max_concurrent_sources.max(1),
        }
    }

    /// Generates multi-chart visualization code for a dashboard. Per-source
    /// failures (after one fallback attempt each) abort the whole request:
    /// a dashboard that fails loudly beats one silently missing a source.
    pub async fn generate(
        &self,
        dashboard: &Dashboard,
        request: Option<&GenerateRequest>,
    ) -> Result<GenerateResponse, AppError> {
        let started = Instant::now();

        if dashboard.data_sources.is_empty() {
            return Err(AppError::Precondition(format!(
                "dashboard '{}' has no associated data sources",
                dashboard.title
            )));
        }

        let user_query = request.and_then(|r| r.query.as_deref());
        let description = dashboard.context_description();

        // Per-source work is independent; process sources concurrently up
        // to the configured bound. Each task owns its handles and source so
        // the buffered futures stay Send regardless of the caller's
        // lifetimes, and timings are measured inside each task so they
        // stay per-source wall-clock figures.
        let sources_started = Instant::now();
        let active_sources: Vec<DataSource> = dashboard
            .data_sources
            .iter()
            .filter(|ds| ds.is_active)
            .cloned()
            .collect();
        let mut outcomes: Vec<(usize, DataSource, SourceOutcome)> =
            stream::iter(
                active_sources
                    .into_iter()
                    .enumerate()
                    .map(|(index, ds)| {
                        let llm = self.llm.clone();
                        let connectors = self.connectors.clone();
                        let connector_timeout = self.connector_timeout;
                        let description = description.to_string();
                        let user_query = user_query.map(String::from);
                        async move {
                            let outcome = process_data_source(
                                llm,
                                connectors,
                                connector_timeout,
                                &ds,
                                &description,
                                user_query.as_deref(),
                            )
                            .await
                            .map_err(|e| AppError::SourceFailed {
                                name: ds.name.clone(),
                                id: ds.id,
                                source: Box::new(e),
                            })?;
                            Ok::<_, AppError>((index, ds, outcome))
                        }
                    }),
            )
            .buffer_unordered(self.max_concurrent_sources)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_, _>>()?;
        let total_data_sources_ms = sources_started.elapsed().as_millis() as u64;

        if outcomes.is_empty() {
            return Err(AppError::Precondition(
                "no active data sources available for generation".into(),
            ));
        }
        // Completion order is nondeterministic; report in dashboard order.
        outcomes.sort_by_key(|(index, _, _)| *index);

        let schemas = outcomes
            .iter()
            .map(|(_, ds, outcome)| SourceSchema {
                name: ds.name.clone(),
                schema: outcome.schema.clone(),
            })
            .collect();
        let samples: Vec<SourceSample> = outcomes
            .iter()
            .map(|(_, ds, outcome)| SourceSample {
                name: ds.name.clone(),
                columns: outcome.data.columns.clone(),
                rows: outcome
                    .data
                    .rows
                    .iter()
                    .map(|row| Value::Object(row.clone()))
                    .collect(),
                total_rows: outcome.data.row_count,
            })
            .collect();
        let context = DashboardContext {
            title: dashboard.title.clone(),
            description: dashboard.description.clone(),
            user_query: user_query.map(|q| q.to_string()),
            schemas,
        };
        let preferences = request.and_then(|r| r.visualization_preferences.as_ref());

        // One holistic generation call across all sources; cross-source
        // layout coherence rules out per-source fragments. Strict: there is
        // no cheap deterministic fallback for multi-chart code.
        let viz_started = Instant::now();
        let code = self
            .llm
            .generate_dashboard_code(&context, &samples, preferences)
            .await?;
        let visualization_generation_ms = viz_started.elapsed().as_millis() as u64;

        let assembly_started = Instant::now();
        let data_sources_used = outcomes.iter().map(|(_, ds, _)| ds.id).collect();
        let queries_generated = outcomes
            .iter()
            .map(|(_, ds, outcome)| GeneratedQuerySummary {
                data_source_id: ds.id,
                data_source_name: ds.name.clone(),
                query: outcome.query.query.clone(),
                query_type: outcome.query.query_type,
                row_count: outcome.data.row_count,
                explanation: outcome.query.explanation.clone(),
            })
            .collect();
        let sample_data: BTreeMap<String, Vec<Value>> = samples
            .iter()
            .map(|sample| (sample.name.clone(), sample.rows.clone()))
            .collect();
        let data_source_timings = outcomes
            .into_iter()
            .map(|(_, _, outcome)| outcome.timing)
            .collect();
        let response_assembly_ms = assembly_started.elapsed().as_millis() as u64;

        let response = GenerateResponse {
            dashboard_id: dashboard.id,
            dashboard_title: dashboard.title.clone(),
            react_code: code.react_code,
            components: code.components,
            data_sources_used,
            queries_generated,
            sample_data,
            execution_time_ms: started.elapsed().as_millis() as u64,
            timing_metrics: TimingMetrics {
                data_source_timings,
                total_data_sources_ms,
                visualization_generation_ms,
                response_assembly_ms,
                total_ms: started.elapsed().as_millis() as u64,
            },
            metadata: json!({
                "model": code.model,
                "reasoning": code.reasoning,
            }),
        };
        info!(
            dashboard_id = %dashboard.id,
            sources = response.data_sources_used.len(),
            elapsed_ms = response.execution_time_ms,
            "dashboard generation completed"
        );
        Ok(response)
    }
}

/// Processes one data source: schema, query generation, execution with
/// the one-shot fallback, materialization. The connector is released on
/// every path. Takes owned handles so the orchestrator can run it on
/// independently owned tasks.
async fn process_data_source(
    llm: Arc<dyn LlmProvider>,
    connectors: Arc<dyn ConnectorRegistry>,
    connector_timeout: Duration,
    data_source: &DataSource,
    description: &str,
    user_query: Option<&str>,
) -> Result<SourceOutcome, AppError> {
    let total_started = Instant::now();
    let mut connector =
        connectors.create(&data_source.source_type, &data_source.connection_config)?;

    with_timeout(connector_timeout, "connector open", connector.connect()).await?;

    let result = async {
        let schema_started = Instant::now();
        let schema =
            with_timeout(connector_timeout, "schema fetch", connector.get_schema()).await?;
        let schema_fetch_ms = schema_started.elapsed().as_millis() as u64;

        let prompt = match user_query {
            Some(query) => query.to_string(),
            None => format!("Get representative data for: {}", description),
        };
        let generation_started = Instant::now();
        let generated = llm
            .generate_query(
                &prompt,
                &schema,
                Some(&format!("Dashboard: {}", description)),
                &data_source.source_type,
            )
            .await?;
        let query_generation_ms = generation_started.elapsed().as_millis() as u64;

        let execution_started = Instant::now();
        let (result, query, fallback_used) = execute_with_fallback(
            &*connector,
            generated,
            &data_source.source_type,
            &schema,
            connector_timeout,
        )
        .await?;
        let query_execution_ms = execution_started.elapsed().as_millis() as u64;
        if fallback_used {
            warn!(
                data_source = %data_source.name,
                "generated query failed, fallback query used"
            );
        }

        let materialization_started = Instant::now();
        let data = processor::materialize(result);
        let materialization_ms = materialization_started.elapsed().as_millis() as u64;

        Ok(SourceOutcome {
            schema,
            data,
            query,
            timing: DataSourceTiming {
                data_source_id: data_source.id,
                data_source_name: data_source.name.clone(),
                schema_fetch_ms,
                query_generation_ms,
                query_execution_ms,
                materialization_ms,
                total_ms: total_started.elapsed().as_millis() as u64,
            },
        })
    }
    .await;

    connector.disconnect().await;
    result
}
