pub mod base;
pub mod csv;
pub mod frame;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

use serde_json::Value;

pub use base::{DataSourceConnector, TabularResult};

use crate::error::AppError;

/// Source kinds the connector registry knows about.
pub const SOURCE_TYPES: &[&str] = &["postgresql", "mysql", "sqlite", "csv"];

/// True for source kinds whose native query language is SQL.
pub fn is_relational(source_type: &str) -> bool {
    matches!(
        source_type.to_lowercase().as_str(),
        "postgresql" | "postgres" | "mysql" | "sqlite"
    )
}

/// Constructor seam the pipelines go through to open connectors, so tests
/// can substitute fakes for real backends.
pub trait ConnectorRegistry: Send + Sync {
    fn create(
        &self,
        source_type: &str,
        config: &Value,
    ) -> Result<Box<dyn DataSourceConnector>, AppError>;
}

/// The built-in registry over every bundled connector.
pub struct BuiltinConnectorRegistry;

impl ConnectorRegistry for BuiltinConnectorRegistry {
    fn create(
        &self,
        source_type: &str,
        config: &Value,
    ) -> Result<Box<dyn DataSourceConnector>, AppError> {
        create_connector(source_type, config)
    }
}

/// Registry lookup: maps a `source_type` discriminator to a connector. An
/// unrecognized type is a configuration error, not a pipeline error.
pub fn create_connector(
    source_type: &str,
    config: &Value,
) -> Result<Box<dyn DataSourceConnector>, AppError> {
    match source_type.to_lowercase().as_str() {
        "postgresql" | "postgres" => Ok(Box::new(postgres::PostgresConnector::new(config)?)),
        "mysql" => Ok(Box::new(mysql::MySqlConnector::new(config)?)),
        "sqlite" => Ok(Box::new(sqlite::SqliteConnector::new(config)?)),
        "csv" => Ok(Box::new(csv::CsvConnector::new(config)?)),
        other => Err(AppError::Config(format!(
            "unknown data source type: {} (expected one of: {})",
            other,
            SOURCE_TYPES.join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_source_type_is_a_config_error() {
        match create_connector("mongodb", &json!({})) {
            Err(AppError::Config(message)) => {
                assert!(message.contains("mongodb"));
                assert!(message.contains("csv"));
            }
            _ => panic!("expected a config error"),
        }
    }

    #[test]
    fn known_types_construct() {
        assert!(create_connector("csv", &json!({"file_path": "/tmp/x.csv"})).is_ok());
        assert!(create_connector("sqlite", &json!({"path": ":memory:"})).is_ok());
        assert!(
            create_connector("postgresql", &json!({"database": "d", "username": "u"})).is_ok()
        );
    }

    #[test]
    fn relational_classification() {
        assert!(is_relational("postgresql"));
        assert!(is_relational("SQLite"));
        assert!(!is_relational("csv"));
    }
}
