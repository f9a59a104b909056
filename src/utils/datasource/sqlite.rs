use async_trait::async_trait;
use serde_json::{Number, Value};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Column, Row};
use std::path::Path;
use tracing::info;

use super::base::{DataSourceConnector, TabularResult};
use super::postgres::rows_to_tabular;
use crate::error::AppError;
use crate::models::{SchemaColumn, SchemaInfo, SchemaTable};

pub struct SqliteConnector {
    path: String,
    pool: Option<SqlitePool>,
}

impl SqliteConnector {
    pub fn new(config: &Value) -> Result<Self, AppError> {
        let path = config
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Config("sqlite connector requires path".into()))?
            .to_string();
        Ok(SqliteConnector { path, pool: None })
    }

    fn pool(&self) -> Result<&SqlitePool, AppError> {
        self.pool
            .as_ref()
            .ok_or_else(|| AppError::Connection("sqlite connector is not connected".into()))
    }
}

fn decode_sqlite_value(row: &SqliteRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    Value::Null
}

#[async_trait]
impl DataSourceConnector for SqliteConnector {
    async fn connect(&mut self) -> Result<(), AppError> {
        // An absent database file is a missing resource, not a transport
        // failure; sqlx would otherwise create an empty database.
        if self.path != ":memory:" && !Path::new(&self.path).exists() {
            return Err(AppError::NotFound(format!(
                "sqlite database not found: {}",
                self.path
            )));
        }
        let connection_string = format!("sqlite://{}", self.path);
        let pool = SqlitePool::connect(&connection_string)
            .await
            .map_err(|e| AppError::Connection(format!("failed to connect to sqlite: {}", e)))?;
        info!(path = %self.path, "connected to sqlite");
        self.pool = Some(pool);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
    }

    async fn get_schema(&self) -> Result<SchemaInfo, AppError> {
        let pool = self.pool()?;
        let table_rows =
            sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(pool)
                .await
                .map_err(|e| AppError::Execution(format!("failed to list sqlite tables: {}", e)))?;

        let mut tables = Vec::new();
        for table_row in table_rows {
            let table_name: String = table_row.get("name");
            let columns = sqlx::query(&format!("PRAGMA table_info(\"{}\")", table_name))
                .fetch_all(pool)
                .await
                .map_err(|e| {
                    AppError::Execution(format!(
                        "failed to inspect sqlite table '{}': {}",
                        table_name, e
                    ))
                })?;
            let columns = columns
                .iter()
                .map(|col| SchemaColumn {
                    name: col.get::<String, _>("name"),
                    data_type: col.get::<String, _>("type"),
                    nullable: col.get::<i32, _>("notnull") == 0,
                })
                .collect();
            tables.push(SchemaTable {
                name: table_name,
                columns,
            });
        }
        Ok(SchemaInfo::relational(tables))
    }

    async fn execute_query(&self, query: &str) -> Result<TabularResult, AppError> {
        let pool = self.pool()?;
        let rows = sqlx::query(query)
            .fetch_all(pool)
            .await
            .map_err(|e| AppError::Execution(format!("sqlite query failed: {}", e)))?;

        if rows.is_empty() {
            return Ok(TabularResult::default());
        }
        let columns: Vec<String> = rows[0]
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        Ok(rows_to_tabular(&rows, columns, decode_sqlite_value))
    }

    async fn get_full_data(&self) -> Result<TabularResult, AppError> {
        Err(AppError::Execution(
            "sqlite has no single whole-source representation; use execute_query with an explicit table".into(),
        ))
    }
}
