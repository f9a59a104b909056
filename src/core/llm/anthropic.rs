use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, warn};

use super::base::{DashboardCode, DashboardContext, LlmProvider, SourceSample};
use super::parsing::{extract_code, extract_json_object};
use crate::config::Config;
use crate::core::data::processor;
use crate::core::viz::generator;
use crate::error::AppError;
use crate::models::{
    GeneratedComponent, GeneratedQuery, QueryType, ResultData, SchemaInfo,
    VisualizationPreferences, VisualizationSpec,
};
use crate::utils::datasource::is_relational;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Rows shown to the model per data source.
const PROMPT_SAMPLE_ROWS: usize = 10;

const FRAME_GRAMMAR_HELP: &str = "\
A frame query is a sequence of stages joined by '|', applied left to right:
- select col1, col2        project columns
- filter <col> <op> <val>  op is one of == != > >= < <= contains
- sort <col> [asc|desc]
- group <key> <agg> <col>  agg is one of sum avg min max count
- head <n> / tail <n>
- distinct
Example: filter region == \"EMEA\" | group month sum sales | sort sum_sales desc | head 12";

pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.llm_timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(AnthropicProvider {
            client,
            base_url: config.anthropic_base_url.trim_end_matches('/').to_string(),
            api_key: config.anthropic_api_key.clone(),
            model: config.anthropic_model.clone(),
        })
    }

    async fn invoke(
        &self,
        system: &str,
        user_message: &str,
        max_tokens: u32,
    ) -> Result<String, AppError> {
        let body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "system": system,
            "messages": [{"role": "user", "content": user_message}],
        });

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::LlmConnection(format!("anthropic request timed out: {}", e))
                } else {
                    AppError::LlmConnection(format!("anthropic request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // Rate limits and server errors are worth a retry upstream;
            // anything else means the request itself was rejected.
            return if status.is_server_error() || status.as_u16() == 429 {
                Err(AppError::LlmConnection(format!(
                    "anthropic returned {}: {}",
                    status, text
                )))
            } else {
                Err(AppError::LlmResponse(format!(
                    "anthropic rejected the request ({}): {}",
                    status, text
                )))
            };
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| AppError::LlmResponse(format!("invalid anthropic response: {}", e)))?;

        payload["content"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::LlmResponse("anthropic response had no text content".into()))
    }

    fn query_system_prompt(source_type: &str) -> String {
        if is_relational(source_type) {
            format!(
                "You are a data analyst that converts natural language questions into SQL \
                 for a {} database. Only reference tables and columns from the provided schema. \
                 Respond with a JSON object with keys \"query\" (the SQL text), \
                 \"query_type\" (always \"sql\") and \"explanation\".",
                source_type
            )
        } else {
            format!(
                "You are a data analyst that converts natural language questions into frame \
                 queries over a single in-memory table. Only reference columns from the \
                 provided schema.\n{}\nRespond with a JSON object with keys \"query\" \
                 (the frame query), \"query_type\" (always \"frame\") and \"explanation\".",
                FRAME_GRAMMAR_HELP
            )
        }
    }

    /// User message for a chart recommendation: the question, sample rows,
    /// per-column summary statistics, and a deterministic shape-based chart
    /// hint the model may override.
    fn recommendation_prompt(result: &ResultData, question: &str) -> String {
        let sample_rows: Vec<&serde_json::Map<String, Value>> =
            result.rows.iter().take(PROMPT_SAMPLE_ROWS).collect();
        let summary = processor::summarize(result);
        let characteristics = generator::analyze_characteristics(&result.columns, &result.rows);
        let hint = generator::suggest_chart_type(&characteristics);

        format!(
            "Original Question: {}\n\nData Columns: {:?}\n\nSample Data: {}\n\n\
             Column Summary: {}\n\nTotal Rows: {}\n\n\
             Heuristic suggestion based on data shape: {}",
            question,
            result.columns,
            serde_json::to_string(&sample_rows).unwrap_or_default(),
            serde_json::to_string(&summary).unwrap_or_default(),
            result.row_count,
            hint
        )
    }

    fn build_dashboard_prompt(
        context: &DashboardContext,
        samples: &[SourceSample],
        preferences: Option<&VisualizationPreferences>,
    ) -> String {
        let mut parts = vec![
            format!("Dashboard Title: {}", context.title),
            format!(
                "Description: {}",
                context.description.as_deref().unwrap_or("No description")
            ),
        ];

        if let Some(query) = &context.user_query {
            parts.push(format!("User Request: {}", query));
        }

        if !context.schemas.is_empty() {
            parts.push("--- Data Source Schemas ---".to_string());
            for source in &context.schemas {
                parts.push(format!(
                    "Data Source: {}\nSchema: {}",
                    source.name,
                    serde_json::to_string(&source.schema).unwrap_or_default()
                ));
            }
        }

        if !samples.is_empty() {
            parts.push("--- Sample Data ---".to_string());
            for sample in samples {
                let rows: Vec<&Value> = sample.rows.iter().take(PROMPT_SAMPLE_ROWS).collect();
                parts.push(format!(
                    "Data Source: {}\nColumns: {:?}\nSample Rows ({} of {}): {}",
                    sample.name,
                    sample.columns,
                    rows.len(),
                    sample.total_rows,
                    serde_json::to_string(&rows).unwrap_or_default()
                ));
            }
        }

        if let Some(prefs) = preferences {
            parts.push("--- Visualization Preferences ---".to_string());
            if let Some(chart_types) = &prefs.chart_types {
                let names: Vec<String> = chart_types.iter().map(|c| c.to_string()).collect();
                parts.push(format!("Preferred chart types: {}", names.join(", ")));
            }
            if let Some(scheme) = &prefs.color_scheme {
                parts.push(format!("Color scheme: {}", scheme));
            }
            if let Some(layout) = &prefs.layout {
                parts.push(format!("Layout: {}", layout));
            }
        }

        parts.push("Generate React visualization code for this dashboard.".to_string());
        parts.join("\n\n")
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn generate_query(
        &self,
        question: &str,
        schema: &SchemaInfo,
        context: Option<&str>,
        source_type: &str,
    ) -> Result<GeneratedQuery, AppError> {
        let system = Self::query_system_prompt(source_type);
        let mut user_message = format!(
            "Schema Information:\n{}\n\nNatural Language Question: {}",
            serde_json::to_string_pretty(schema).unwrap_or_default(),
            question
        );
        if let Some(context) = context {
            user_message.push_str(&format!("\n\nAdditional Context: {}", context));
        }

        let content = self.invoke(&system, &user_message, 2048).await?;
        let default_type = QueryType::for_source_type(source_type);

        match extract_json_object(&content) {
            Ok(object) => {
                let query = object["query"].as_str().unwrap_or_default().to_string();
                if query.is_empty() {
                    return Err(AppError::LlmResponse(
                        "model response contained no query".into(),
                    ));
                }
                let query_type = object["query_type"]
                    .as_str()
                    .and_then(|t| serde_json::from_value(Value::String(t.to_string())).ok())
                    .unwrap_or(default_type);
                Ok(GeneratedQuery {
                    query,
                    query_type,
                    explanation: object["explanation"].as_str().unwrap_or_default().to_string(),
                })
            }
            Err(_) => {
                // Not a JSON envelope; the model may have answered with the
                // query text itself.
                warn!("query response was not JSON, extracting raw query text");
                let query = extract_code(&content);
                if query.is_empty() {
                    return Err(AppError::LlmResponse(
                        "could not extract a query from the model response".into(),
                    ));
                }
                Ok(GeneratedQuery {
                    query,
                    query_type: default_type,
                    explanation: "Generated query".to_string(),
                })
            }
        }
    }

    async fn recommend_visualization(
        &self,
        result: &ResultData,
        question: &str,
    ) -> VisualizationSpec {
        let system = "You are a data visualization expert. Recommend the best chart for the \
                      given data. Available chart types: line, bar, pie, area, scatter, \
                      composed. Respond with a JSON object with keys \"chart_type\", \
                      \"title\", \"description\" and \"chart_config\" (with \"x_axis\", \
                      \"y_axis\", \"series\", \"legend\", \"tooltip\", \"grid\").";

        let user_message = Self::recommendation_prompt(result, question);

        let content = match self.invoke(system, &user_message, 2048).await {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "visualization recommendation failed, using default");
                return generator::default_spec(&result.columns, question);
            }
        };

        extract_json_object(&content)
            .and_then(|object| {
                serde_json::from_value::<VisualizationSpec>(object).map_err(|e| {
                    AppError::LlmResponse(format!("unparseable visualization spec: {}", e))
                })
            })
            .unwrap_or_else(|e| {
                warn!(error = %e, "could not normalize visualization spec, using default");
                generator::default_spec(&result.columns, question)
            })
    }

    async fn generate_dashboard_code(
        &self,
        context: &DashboardContext,
        samples: &[SourceSample],
        preferences: Option<&VisualizationPreferences>,
    ) -> Result<DashboardCode, AppError> {
        let system = "You are an expert React developer specializing in data visualization. \
                      Generate a single exportable Dashboard component using React functional \
                      components, Recharts and Tailwind CSS, with a ResponsiveContainer around \
                      every chart. Respond with a JSON object with keys \"react_code\" (the \
                      complete component source), \"components\" (array of {name, chart_type, \
                      description, data_keys}) and \"reasoning\".";

        let user_message = Self::build_dashboard_prompt(context, samples, preferences);
        let content = self.invoke(system, &user_message, 8192).await?;

        match extract_json_object(&content) {
            Ok(object) => {
                let react_code = object["react_code"].as_str().unwrap_or_default().to_string();
                if react_code.is_empty() {
                    return Err(AppError::LlmResponse(
                        "model response contained no dashboard code".into(),
                    ));
                }
                let components: Vec<GeneratedComponent> = object
                    .get("components")
                    .cloned()
                    .and_then(|v| serde_json::from_value(v).ok())
                    .unwrap_or_default();
                Ok(DashboardCode {
                    react_code,
                    components,
                    reasoning: object["reasoning"].as_str().unwrap_or_default().to_string(),
                    model: self.model.clone(),
                })
            }
            Err(_) => {
                warn!("dashboard response was not JSON, extracting code block");
                let code = extract_code(&content);
                if code.is_empty() {
                    return Err(AppError::LlmResponse(
                        "could not extract dashboard code from the model response".into(),
                    ));
                }
                Ok(DashboardCode {
                    react_code: code,
                    components: Vec::new(),
                    reasoning: "Generated dashboard code".to_string(),
                    model: self.model.clone(),
                })
            }
        }
    }

    async fn health_check(&self) -> bool {
        match self
            .invoke("You are a helpful assistant.", "Reply with the word ok.", 16)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "anthropic health check failed");
                false
            }
        }
    }
}
