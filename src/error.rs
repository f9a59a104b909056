use salvo::prelude::*;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Query execution failed: {0}")]
    Execution(String),

    #[error("LLM connection error: {0}")]
    LlmConnection(String),

    #[error("LLM response error: {0}")]
    LlmResponse(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data source '{name}' failed: {source}")]
    SourceFailed {
        name: String,
        id: Uuid,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// Stable machine-readable error kind, independent of the message text.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Connection(_) => "connection_error",
            AppError::NotFound(_) => "not_found",
            AppError::Execution(_) => "execution_error",
            AppError::LlmConnection(_) => "llm_connection_error",
            AppError::LlmResponse(_) => "llm_response_error",
            AppError::Precondition(_) => "precondition_failed",
            AppError::Config(_) => "config_error",
            AppError::SourceFailed { .. } => "source_failed",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Precondition(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_) => StatusCode::BAD_REQUEST,
            AppError::Connection(_) => StatusCode::BAD_GATEWAY,
            AppError::LlmConnection(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::SourceFailed { name, id, source } => Some(json!({
                "data_source_id": id,
                "data_source_name": name,
                "cause_kind": source.kind(),
            })),
            _ => None,
        }
    }
}

#[async_trait]
impl Writer for AppError {
    async fn write(mut self, _req: &mut Request, _depot: &mut Depot, res: &mut Response) {
        res.status_code(self.status_code());
        res.render(Json(json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
                "details": self.details(),
            }
        })));
    }
}
