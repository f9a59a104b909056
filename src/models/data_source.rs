use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A registered tabular data source as handed to the pipelines by the
/// persistence layer. `connection_config` is opaque; its shape depends on
/// `source_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source_type: String,
    pub connection_config: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_info: Option<SchemaInfo>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaTable {
    pub name: String,
    pub columns: Vec<SchemaColumn>,
}

/// Schema of one data source. Relational sources populate `tables`; flat
/// sources (CSV) populate `columns` and leave `tables` empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<SchemaTable>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<SchemaColumn>>,
}

impl SchemaInfo {
    pub fn relational(tables: Vec<SchemaTable>) -> Self {
        SchemaInfo {
            tables: Some(tables),
            columns: None,
        }
    }

    pub fn flat(columns: Vec<SchemaColumn>) -> Self {
        SchemaInfo {
            tables: None,
            columns: Some(columns),
        }
    }

    pub fn first_table(&self) -> Option<&SchemaTable> {
        self.tables.as_deref().and_then(|tables| tables.first())
    }
}
