use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::Config;
use crate::core::llm::{create_llm_provider, LlmProvider};
use crate::error::AppError;
use crate::models::{Dashboard, DataSource, QueryRecord};
use crate::utils::datasource::{BuiltinConnectorRegistry, ConnectorRegistry};

/// Shared application state. Entity stores are in-memory maps standing in
/// for the persistence collaborator; pipelines only ever see already-loaded
/// `DataSource` and `Dashboard` values.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub llm: Arc<dyn LlmProvider>,
    pub connectors: Arc<dyn ConnectorRegistry>,
    pub data_sources: Arc<RwLock<HashMap<Uuid, DataSource>>>,
    pub dashboards: Arc<RwLock<HashMap<Uuid, Dashboard>>>,
    pub queries: Arc<RwLock<Vec<QueryRecord>>>,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let llm = create_llm_provider(config)?;
        Ok(AppState {
            config: Arc::new(config.clone()),
            llm,
            connectors: Arc::new(BuiltinConnectorRegistry),
            data_sources: Arc::new(RwLock::new(HashMap::new())),
            dashboards: Arc::new(RwLock::new(HashMap::new())),
            queries: Arc::new(RwLock::new(Vec::new())),
        })
    }

    /// Resolves the pipeline's target source: the explicit id when given,
    /// otherwise the most recently created active source. `None` when no
    /// candidate exists.
    pub async fn resolve_data_source(&self, id: Option<Uuid>) -> Option<DataSource> {
        let sources = self.data_sources.read().await;
        match id {
            Some(id) => sources.get(&id).cloned(),
            None => sources
                .values()
                .filter(|ds| ds.is_active)
                .max_by_key(|ds| ds.created_at)
                .cloned(),
        }
    }
}
