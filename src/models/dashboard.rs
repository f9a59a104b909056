use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::data_source::DataSource;

/// A dashboard with its associated data sources already loaded, as handed
/// to the generation pipeline by the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub data_sources: Vec<DataSource>,
    pub created_at: DateTime<Utc>,
}

impl Dashboard {
    /// Prompt context when the caller supplied no explicit query.
    pub fn context_description(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.title)
    }
}
