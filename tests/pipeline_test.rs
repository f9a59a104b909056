//! End-to-end pipeline tests over fake connectors and a fake LLM provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use insight_studio_backend::core::llm::{
    DashboardCode, DashboardContext, LlmProvider, SourceSample,
};
use insight_studio_backend::core::viz::generator;
use insight_studio_backend::models::{
    Dashboard, DataSource, GenerateRequest, GeneratedComponent, GeneratedQuery, QueryStatus,
    QueryType, ResultData, SchemaColumn, SchemaInfo, SchemaTable, VisualizationPreferences,
    VisualizationSpec,
};
use insight_studio_backend::utils::datasource::{
    ConnectorRegistry, DataSourceConnector, TabularResult,
};
use insight_studio_backend::{AppError, Config, DashboardOrchestrator, QueryExecutor};

#[derive(Default)]
struct Counters {
    connector_creates: AtomicUsize,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    query_executions: AtomicUsize,
    llm_query_calls: AtomicUsize,
    llm_dashboard_calls: AtomicUsize,
}

/// Per-source behavior the fake registry hands out, keyed by the `source`
/// field of the data source's connection config.
#[derive(Clone)]
struct SourceBehavior {
    schema: SchemaInfo,
    table: TabularResult,
    /// Queries that fail with an execution error.
    failing_queries: Vec<String>,
    /// Queries that hang well past any configured timeout.
    hanging_queries: Vec<String>,
    /// When set, every query fails, including the fallback.
    fail_all_queries: bool,
    /// Artificial delay inside `connect`.
    connect_delay: Option<Duration>,
}

impl SourceBehavior {
    fn new(schema: SchemaInfo, table: TabularResult) -> Self {
        SourceBehavior {
            schema,
            table,
            failing_queries: Vec::new(),
            hanging_queries: Vec::new(),
            fail_all_queries: false,
            connect_delay: None,
        }
    }
}

struct FakeConnector {
    behavior: SourceBehavior,
    counters: Arc<Counters>,
}

#[async_trait]
impl DataSourceConnector for FakeConnector {
    async fn connect(&mut self) -> Result<(), AppError> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.behavior.connect_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.counters.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    async fn get_schema(&self) -> Result<SchemaInfo, AppError> {
        Ok(self.behavior.schema.clone())
    }

    async fn execute_query(&self, query: &str) -> Result<TabularResult, AppError> {
        self.counters.query_executions.fetch_add(1, Ordering::SeqCst);
        if self.behavior.hanging_queries.iter().any(|q| q == query) {
            tokio::time::sleep(Duration::from_secs(600)).await;
        }
        if self.behavior.fail_all_queries
            || self.behavior.failing_queries.iter().any(|q| q == query)
        {
            return Err(AppError::Execution(format!("query rejected: {}", query)));
        }
        Ok(self.behavior.table.clone())
    }

    async fn get_full_data(&self) -> Result<TabularResult, AppError> {
        Ok(self.behavior.table.clone())
    }
}

struct FakeRegistry {
    behaviors: HashMap<String, SourceBehavior>,
    counters: Arc<Counters>,
}

impl ConnectorRegistry for FakeRegistry {
    fn create(
        &self,
        _source_type: &str,
        config: &Value,
    ) -> Result<Box<dyn DataSourceConnector>, AppError> {
        self.counters.connector_creates.fetch_add(1, Ordering::SeqCst);
        let key = config["source"].as_str().unwrap_or_default();
        let behavior = self
            .behaviors
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::Config(format!("unknown fake source: {}", key)))?;
        Ok(Box::new(FakeConnector {
            behavior,
            counters: self.counters.clone(),
        }))
    }
}

struct FakeLlm {
    generated: GeneratedQuery,
    fail_generate: bool,
    /// Simulates an unusable recommendation response, which the lenient
    /// contract converts to the deterministic default spec.
    recommendation_broken: bool,
    fail_dashboard: bool,
    counters: Arc<Counters>,
    query_prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    fn new(generated: GeneratedQuery, counters: Arc<Counters>) -> Self {
        FakeLlm {
            generated,
            fail_generate: false,
            recommendation_broken: false,
            fail_dashboard: false,
            counters,
            query_prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn generate_query(
        &self,
        question: &str,
        _schema: &SchemaInfo,
        _context: Option<&str>,
        _source_type: &str,
    ) -> Result<GeneratedQuery, AppError> {
        self.counters.llm_query_calls.fetch_add(1, Ordering::SeqCst);
        self.query_prompts
            .lock()
            .map_err(|_| AppError::Execution("prompt log poisoned".into()))?
            .push(question.to_string());
        if self.fail_generate {
            return Err(AppError::LlmResponse("no query in response".into()));
        }
        Ok(self.generated.clone())
    }

    async fn recommend_visualization(
        &self,
        result: &ResultData,
        question: &str,
    ) -> VisualizationSpec {
        if self.recommendation_broken {
            return generator::default_spec(&result.columns, question);
        }
        let mut spec = generator::default_spec(&result.columns, question);
        spec.title = "Model Recommendation".to_string();
        spec
    }

    async fn generate_dashboard_code(
        &self,
        _context: &DashboardContext,
        samples: &[SourceSample],
        _preferences: Option<&VisualizationPreferences>,
    ) -> Result<DashboardCode, AppError> {
        self.counters.llm_dashboard_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_dashboard {
            return Err(AppError::LlmResponse("no code in response".into()));
        }
        Ok(DashboardCode {
            react_code: "const Dashboard = () => null;".to_string(),
            components: samples
                .iter()
                .map(|s| GeneratedComponent {
                    name: format!("{}Chart", s.name),
                    chart_type: "bar".to_string(),
                    description: String::new(),
                    data_keys: s.columns.clone(),
                })
                .collect(),
            reasoning: "one chart per source".to_string(),
            model: "fake-model".to_string(),
        })
    }

    async fn health_check(&self) -> bool {
        true
    }
}

fn test_config() -> Config {
    Config {
        server_address: "127.0.0.1:0".to_string(),
        llm_provider: "anthropic".to_string(),
        anthropic_api_key: String::new(),
        anthropic_model: "test-model".to_string(),
        anthropic_base_url: "http://localhost".to_string(),
        llm_timeout_secs: 5,
        connector_timeout_secs: 5,
        max_concurrent_sources: 2,
    }
}

fn data_source(name: &str, source_type: &str, active: bool) -> DataSource {
    DataSource {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        source_type: source_type.to_string(),
        connection_config: json!({ "source": name }),
        schema_info: None,
        is_active: active,
        created_at: Utc::now(),
    }
}

fn dashboard(title: &str, data_sources: Vec<DataSource>) -> Dashboard {
    Dashboard {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: None,
        data_sources,
        created_at: Utc::now(),
    }
}

fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn sales_behavior() -> SourceBehavior {
    let schema = SchemaInfo::flat(vec![
        SchemaColumn {
            name: "month".to_string(),
            data_type: "string".to_string(),
            nullable: false,
        },
        SchemaColumn {
            name: "region".to_string(),
            data_type: "string".to_string(),
            nullable: false,
        },
        SchemaColumn {
            name: "sales".to_string(),
            data_type: "integer".to_string(),
            nullable: false,
        },
    ]);
    let table = TabularResult::new(
        vec![
            "month".to_string(),
            "region".to_string(),
            "sales".to_string(),
        ],
        vec![
            row(&[
                ("month", json!("Jan")),
                ("region", json!("North")),
                ("sales", json!(120)),
            ]),
            row(&[
                ("month", json!("Feb")),
                ("region", json!("North")),
                ("sales", json!(90)),
            ]),
            row(&[
                ("month", json!("Mar")),
                ("region", json!("South")),
                ("sales", json!(140)),
            ]),
        ],
    );
    SourceBehavior::new(schema, table)
}

fn orders_behavior() -> SourceBehavior {
    let schema = SchemaInfo::relational(vec![SchemaTable {
        name: "orders".to_string(),
        columns: vec![SchemaColumn {
            name: "total".to_string(),
            data_type: "integer".to_string(),
            nullable: false,
        }],
    }]);
    let table = TabularResult::new(
        vec!["total".to_string()],
        vec![row(&[("total", json!(42))])],
    );
    SourceBehavior::new(schema, table)
}

struct Harness {
    counters: Arc<Counters>,
    llm: Arc<FakeLlm>,
    registry: Arc<FakeRegistry>,
    config: Config,
}

impl Harness {
    fn new(behaviors: Vec<(&str, SourceBehavior)>, generated: GeneratedQuery) -> Self {
        let counters = Arc::new(Counters::default());
        let registry = Arc::new(FakeRegistry {
            behaviors: behaviors
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            counters: counters.clone(),
        });
        let llm = Arc::new(FakeLlm::new(generated, counters.clone()));
        Harness {
            counters,
            llm,
            registry,
            config: test_config(),
        }
    }

    fn with_llm(mut self, adjust: impl FnOnce(&mut FakeLlm)) -> Self {
        let mut llm = FakeLlm::new(self.llm.generated.clone(), self.counters.clone());
        adjust(&mut llm);
        self.llm = Arc::new(llm);
        self
    }

    fn executor(&self) -> QueryExecutor {
        QueryExecutor::new(&self.config, self.llm.clone(), self.registry.clone())
    }

    fn orchestrator(&self) -> DashboardOrchestrator {
        DashboardOrchestrator::new(&self.config, self.llm.clone(), self.registry.clone())
    }
}

fn frame_query(query: &str) -> GeneratedQuery {
    GeneratedQuery {
        query: query.to_string(),
        query_type: QueryType::Frame,
        explanation: "generated for test".to_string(),
    }
}

fn sql_query(query: &str) -> GeneratedQuery {
    GeneratedQuery {
        query: query.to_string(),
        query_type: QueryType::Sql,
        explanation: "generated for test".to_string(),
    }
}

#[tokio::test]
async fn question_over_flat_source_completes_with_visualization() {
    let harness = Harness::new(
        vec![("sales", sales_behavior())],
        frame_query("group month sum sales"),
    );
    let source = data_source("sales", "csv", true);

    let record = harness
        .executor()
        .execute("What are monthly sales?", Some(&source))
        .await;

    assert_eq!(record.status, QueryStatus::Completed);
    assert_eq!(record.generated_query.as_deref(), Some("group month sum sales"));
    assert_eq!(record.query_type, Some(QueryType::Frame));
    let result = record.result_data.as_ref().unwrap();
    assert_eq!(result.row_count, 3);
    assert_eq!(result.columns, vec!["month", "region", "sales"]);
    let spec = record.visualization.as_ref().unwrap();
    assert_eq!(spec.title, "Model Recommendation");
    assert!(record.error_message.is_none());
    assert!(record.execution_time_ms.is_some());
    assert_eq!(harness.counters.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_generated_sql_falls_back_to_bounded_scan() {
    let mut behavior = orders_behavior();
    behavior.failing_queries = vec!["SELECT * FROM order_items".to_string()];
    let harness = Harness::new(
        vec![("orders-db", behavior)],
        sql_query("SELECT * FROM order_items"),
    );
    let source = data_source("orders-db", "postgresql", true);

    let record = harness.executor().execute("Show orders", Some(&source)).await;

    assert_eq!(record.status, QueryStatus::Completed);
    assert_eq!(
        record.generated_query.as_deref(),
        Some("SELECT * FROM \"orders\" LIMIT 100")
    );
    assert_eq!(record.result_data.as_ref().unwrap().row_count, 1);
    // Primary attempt plus exactly one fallback attempt.
    assert_eq!(harness.counters.query_executions.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn fallback_failure_is_terminal() {
    let mut behavior = orders_behavior();
    behavior.fail_all_queries = true;
    let harness = Harness::new(
        vec![("orders-db", behavior)],
        sql_query("SELECT * FROM order_items"),
    );
    let source = data_source("orders-db", "postgresql", true);

    let record = harness.executor().execute("Show orders", Some(&source)).await;

    assert_eq!(record.status, QueryStatus::Failed);
    assert!(record.error_message.is_some());
    assert!(record.result_data.is_none());
    // No third attempt after the fallback fails.
    assert_eq!(harness.counters.query_executions.load(Ordering::SeqCst), 2);
    assert_eq!(harness.counters.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn timed_out_query_enters_fallback() {
    let mut behavior = orders_behavior();
    behavior.hanging_queries = vec!["SELECT * FROM order_items".to_string()];
    let mut harness = Harness::new(
        vec![("orders-db", behavior)],
        sql_query("SELECT * FROM order_items"),
    );
    harness.config.connector_timeout_secs = 1;
    let source = data_source("orders-db", "postgresql", true);

    let record = harness.executor().execute("Show orders", Some(&source)).await;

    // The timed-out query counts as an execution failure and gets the same
    // single fallback attempt as an outright error.
    assert_eq!(record.status, QueryStatus::Completed);
    assert_eq!(
        record.generated_query.as_deref(),
        Some("SELECT * FROM \"orders\" LIMIT 100")
    );
    assert_eq!(harness.counters.query_executions.load(Ordering::SeqCst), 2);
    assert_eq!(harness.counters.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_data_source_fails_without_opening_anything() {
    let harness = Harness::new(vec![], frame_query("all"));

    let record = harness.executor().execute("Anything", None).await;

    assert_eq!(record.status, QueryStatus::Failed);
    assert!(record
        .error_message
        .as_deref()
        .unwrap()
        .contains("no data source available"));
    assert_eq!(harness.counters.connector_creates.load(Ordering::SeqCst), 0);
    assert_eq!(harness.counters.llm_query_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_result_skips_visualization() {
    let mut behavior = sales_behavior();
    behavior.table.rows.clear();
    let harness = Harness::new(vec![("sales", behavior)], frame_query("head 5"));
    let source = data_source("sales", "csv", true);

    let record = harness.executor().execute("Any rows?", Some(&source)).await;

    assert_eq!(record.status, QueryStatus::Completed);
    assert_eq!(record.result_data.as_ref().unwrap().row_count, 0);
    assert!(record.visualization.is_none());
}

#[tokio::test]
async fn broken_recommendation_yields_default_bar_spec() {
    let harness = Harness::new(
        vec![("sales", sales_behavior())],
        frame_query("head 10"),
    )
    .with_llm(|llm| llm.recommendation_broken = true);
    let source = data_source("sales", "csv", true);

    let record = harness
        .executor()
        .execute("Sales by month", Some(&source))
        .await;

    assert_eq!(record.status, QueryStatus::Completed);
    let spec = record.visualization.as_ref().unwrap();
    let default = generator::default_spec(
        &record.result_data.as_ref().unwrap().columns,
        "Sales by month",
    );
    assert_eq!(spec.chart_type, default.chart_type);
    assert_eq!(spec.title, default.title);
    assert_eq!(
        spec.chart_config.x_axis.data_key,
        default.chart_config.x_axis.data_key
    );
}

#[tokio::test]
async fn strict_query_generation_failure_fails_the_run() {
    let harness = Harness::new(vec![("sales", sales_behavior())], frame_query("all"))
        .with_llm(|llm| llm.fail_generate = true);
    let source = data_source("sales", "csv", true);

    let record = harness.executor().execute("Sales", Some(&source)).await;

    assert_eq!(record.status, QueryStatus::Failed);
    // Nothing ran; the failure happened before execution.
    assert_eq!(harness.counters.query_executions.load(Ordering::SeqCst), 0);
    assert_eq!(harness.counters.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dashboard_without_sources_fails_before_any_work() {
    let harness = Harness::new(vec![], frame_query("all"));
    let board = dashboard("Empty Board", vec![]);

    let err = harness
        .orchestrator()
        .generate(&board, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "precondition_failed");
    assert_eq!(harness.counters.connector_creates.load(Ordering::SeqCst), 0);
    assert_eq!(harness.counters.llm_query_calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.counters.llm_dashboard_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn dashboard_with_only_inactive_sources_fails() {
    let harness = Harness::new(vec![("sales", sales_behavior())], frame_query("all"));
    let board = dashboard("Stale Board", vec![data_source("sales", "csv", false)]);

    let err = harness
        .orchestrator()
        .generate(&board, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "precondition_failed");
    assert!(err.to_string().contains("no active data sources"));
    assert_eq!(harness.counters.connector_creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn one_failing_source_aborts_whole_generation() {
    let mut broken = sales_behavior();
    broken.fail_all_queries = true;
    let harness = Harness::new(
        vec![("sales", sales_behavior()), ("broken", broken)],
        frame_query("head 10"),
    );
    let board = dashboard(
        "Mixed Board",
        vec![
            data_source("sales", "csv", true),
            data_source("broken", "csv", true),
        ],
    );

    let err = harness
        .orchestrator()
        .generate(&board, None)
        .await
        .unwrap_err();

    match err {
        AppError::SourceFailed { name, .. } => assert_eq!(name, "broken"),
        other => panic!("expected SourceFailed, got {:?}", other),
    }
    // Partial per-source work is discarded; no code generation happens.
    assert_eq!(harness.counters.llm_dashboard_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn dashboard_generation_assembles_full_response() {
    let harness = Harness::new(
        vec![
            ("sales", sales_behavior()),
            ("orders-db", orders_behavior()),
        ],
        frame_query("head 10"),
    );
    let sales = data_source("sales", "csv", true);
    let orders = data_source("orders-db", "postgresql", true);
    let board = dashboard("Revenue Board", vec![sales.clone(), orders.clone()]);

    let response = harness
        .orchestrator()
        .generate(&board, None)
        .await
        .unwrap();

    assert_eq!(response.dashboard_id, board.id);
    assert_eq!(response.react_code, "const Dashboard = () => null;");
    assert_eq!(response.components.len(), 2);
    // Dashboard order is preserved regardless of completion order.
    assert_eq!(response.data_sources_used, vec![sales.id, orders.id]);
    assert_eq!(response.queries_generated.len(), 2);
    assert_eq!(response.queries_generated[0].row_count, 3);
    assert_eq!(response.queries_generated[1].row_count, 1);
    assert!(response.sample_data.contains_key("sales"));
    assert!(response.sample_data.contains_key("orders-db"));
    assert_eq!(response.sample_data["sales"].len(), 3);
    assert_eq!(response.timing_metrics.data_source_timings.len(), 2);
    assert_eq!(harness.counters.llm_dashboard_calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.counters.disconnects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn generation_runs_on_a_spawned_task() {
    let harness = Harness::new(vec![("sales", sales_behavior())], frame_query("all"));
    let board = dashboard("Sales Board", vec![data_source("sales", "csv", true)]);
    let orchestrator = harness.orchestrator();

    // The whole generation future must be Send + 'static so callers can
    // hand it to the runtime.
    let handle = tokio::spawn(async move { orchestrator.generate(&board, None).await });
    let response = handle.await.unwrap().unwrap();

    assert_eq!(response.queries_generated.len(), 1);
    assert_eq!(harness.counters.llm_dashboard_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn schema_timing_excludes_connection_time() {
    let mut behavior = sales_behavior();
    behavior.connect_delay = Some(Duration::from_millis(400));
    let harness = Harness::new(vec![("sales", behavior)], frame_query("all"));
    let board = dashboard("Sales Board", vec![data_source("sales", "csv", true)]);

    let response = harness.orchestrator().generate(&board, None).await.unwrap();

    let timing = &response.timing_metrics.data_source_timings[0];
    assert!(timing.total_ms >= 400);
    assert!(timing.schema_fetch_ms < 200);
}

#[tokio::test]
async fn dashboard_fallback_is_reported_in_query_summaries() {
    let mut behavior = orders_behavior();
    behavior.failing_queries = vec!["SELECT * FROM revenue".to_string()];
    let harness = Harness::new(
        vec![("orders-db", behavior)],
        sql_query("SELECT * FROM revenue"),
    );
    let board = dashboard(
        "Orders Board",
        vec![data_source("orders-db", "postgresql", true)],
    );

    let response = harness
        .orchestrator()
        .generate(&board, None)
        .await
        .unwrap();

    let summary = &response.queries_generated[0];
    assert_eq!(summary.query, "SELECT * FROM \"orders\" LIMIT 100");
    assert!(summary.explanation.contains("Fallback query"));
}

#[tokio::test]
async fn dashboard_prompt_uses_user_query_when_present() {
    let harness = Harness::new(vec![("sales", sales_behavior())], frame_query("all"));
    let board = dashboard("Sales Board", vec![data_source("sales", "csv", true)]);

    let request = GenerateRequest {
        query: Some("top regions by revenue".to_string()),
        visualization_preferences: None,
    };
    harness
        .orchestrator()
        .generate(&board, Some(&request))
        .await
        .unwrap();

    let prompts = harness.llm.query_prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0], "top regions by revenue");
}

#[tokio::test]
async fn dashboard_prompt_defaults_to_descriptive_request() {
    let harness = Harness::new(vec![("sales", sales_behavior())], frame_query("all"));
    let board = dashboard("Sales Board", vec![data_source("sales", "csv", true)]);

    harness.orchestrator().generate(&board, None).await.unwrap();

    let prompts = harness.llm.query_prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].starts_with("Get representative data for:"));
    assert!(prompts[0].contains("Sales Board"));
}

#[tokio::test]
async fn strict_dashboard_code_failure_propagates() {
    let harness = Harness::new(vec![("sales", sales_behavior())], frame_query("all"))
        .with_llm(|llm| llm.fail_dashboard = true);
    let board = dashboard("Sales Board", vec![data_source("sales", "csv", true)]);

    let err = harness
        .orchestrator()
        .generate(&board, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "llm_response_error");
    // Sources were processed before the code call failed.
    assert_eq!(harness.counters.disconnects.load(Ordering::SeqCst), 1);
}
