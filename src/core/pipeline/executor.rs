//! The single-query pipeline: natural-language question in, query record
//! with result data and a visualization recommendation out.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

use super::fallback::execute_with_fallback;
use super::with_timeout;
use crate::config::Config;
use crate::core::data::processor;
use crate::core::llm::LlmProvider;
use crate::error::AppError;
use crate::models::{DataSource, QueryRecord};
use crate::utils::datasource::ConnectorRegistry;

pub struct QueryExecutor {
    llm: Arc<dyn LlmProvider>,
    connectors: Arc<dyn ConnectorRegistry>,
    connector_timeout: Duration,
}

impl QueryExecutor {
    pub fn new(
        config: &Config,
        llm: Arc<dyn LlmProvider>,
        connectors: Arc<dyn ConnectorRegistry>,
    ) -> Self {
        QueryExecutor {
            llm,
            connectors,
            connector_timeout: Duration::from_secs(config.connector_timeout_secs),
        }
    }

    /// Runs the full pipeline for one question against one resolved data
    /// source (`None` when no candidate source exists, which is itself a
    /// terminal failure). The returned record is always terminal, with
    /// `error_message` and elapsed time populated on failure.
    pub async fn execute(&self, question: &str, data_source: Option<&DataSource>) -> QueryRecord {
        let started = Instant::now();
        let mut record = QueryRecord::new(question.to_string(), data_source.map(|ds| ds.id));
        record.begin();

        match self.run(question, data_source, &mut record).await {
            Ok(()) => {
                record.complete(started.elapsed().as_millis() as u64);
                info!(
                    query_id = %record.id,
                    elapsed_ms = record.execution_time_ms,
                    "query pipeline completed"
                );
            }
            Err(e) => {
                error!(query_id = %record.id, error = %e, "query pipeline failed");
                record.fail(e.to_string(), started.elapsed().as_millis() as u64);
            }
        }
        record
    }

    async fn run(
        &self,
        question: &str,
        data_source: Option<&DataSource>,
        record: &mut QueryRecord,
    ) -> Result<(), AppError> {
        let data_source = data_source
            .ok_or_else(|| AppError::Precondition("no data source available".into()))?;

        let mut connector = self
            .connectors
            .create(&data_source.source_type, &data_source.connection_config)?;
        with_timeout(
            self.connector_timeout,
            "connector open",
            connector.connect(),
        )
        .await?;

        // Connector must be released on every path from here on.
        let outcome = self.run_connected(question, data_source, &*connector, record).await;
        connector.disconnect().await;
        outcome
    }

    async fn run_connected(
        &self,
        question: &str,
        data_source: &DataSource,
        connector: &dyn crate::utils::datasource::DataSourceConnector,
        record: &mut QueryRecord,
    ) -> Result<(), AppError> {
        let schema = with_timeout(
            self.connector_timeout,
            "schema fetch",
            connector.get_schema(),
        )
        .await?;

        let generated = self
            .llm
            .generate_query(question, &schema, None, &data_source.source_type)
            .await?;
        record.generated_query = Some(generated.query.clone());
        record.query_type = Some(generated.query_type);

        let (result, effective_query, fallback_used) = execute_with_fallback(
            connector,
            generated,
            &data_source.source_type,
            &schema,
            self.connector_timeout,
        )
        .await?;
        if fallback_used {
            record.generated_query = Some(effective_query.query.clone());
            record.query_type = Some(effective_query.query_type);
        }

        let result_data = processor::materialize(result);

        // Best-effort: the lenient contract guarantees a spec comes back,
        // so this step cannot fail the run.
        if result_data.row_count > 0 {
            let spec = self.llm.recommend_visualization(&result_data, question).await;
            record.visualization = Some(spec);
        }
        record.result_data = Some(result_data);
        Ok(())
    }
}
