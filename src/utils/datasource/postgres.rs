use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Number, Value};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Column, Row};
use tracing::info;

use super::base::{DataSourceConnector, TabularResult};
use crate::error::AppError;
use crate::models::{SchemaColumn, SchemaInfo, SchemaTable};

pub struct PostgresConnector {
    connection_string: String,
    pool: Option<PgPool>,
}

impl PostgresConnector {
    pub fn new(config: &Value) -> Result<Self, AppError> {
        let host = config
            .get("host")
            .and_then(|v| v.as_str())
            .unwrap_or("localhost");
        let port = config.get("port").and_then(|v| v.as_u64()).unwrap_or(5432);
        let database = config
            .get("database")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Config("postgresql connector requires database".into()))?;
        let username = config
            .get("username")
            .and_then(|v| v.as_str())
            .unwrap_or("postgres");
        let password = config.get("password").and_then(|v| v.as_str()).unwrap_or("");

        let connection_string = if password.is_empty() {
            format!("postgres://{}@{}:{}/{}", username, host, port, database)
        } else {
            format!(
                "postgres://{}:{}@{}:{}/{}",
                username, password, host, port, database
            )
        };

        Ok(PostgresConnector {
            connection_string,
            pool: None,
        })
    }

    fn pool(&self) -> Result<&PgPool, AppError> {
        self.pool
            .as_ref()
            .ok_or_else(|| AppError::Connection("postgresql connector is not connected".into()))
    }
}

/// Best-effort typed decode of a single column into a JSON value. SQL NULL
/// becomes JSON null; non-finite floats also collapse to null.
pub(crate) fn decode_pg_value(row: &PgRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
        return v
            .map(|n| Value::Number((n as i64).into()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(index) {
        return v
            .map(|n| Value::Number((n as i64).into()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(index) {
        return v
            .and_then(|f| Number::from_f64(f as f64))
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(index) {
        return v
            .map(|t| Value::String(t.to_rfc3339()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(index) {
        return v
            .map(|t| Value::String(t.to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(index) {
        return v
            .map(|t| Value::String(t.to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<uuid::Uuid>, _>(index) {
        return v
            .map(|u| Value::String(u.to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Value>, _>(index) {
        return v.unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    Value::Null
}

pub(crate) fn rows_to_tabular<R, F>(rows: &[R], columns: Vec<String>, decode: F) -> TabularResult
where
    F: Fn(&R, usize) -> Value,
{
    let result_rows = rows
        .iter()
        .map(|row| {
            let mut object = Map::new();
            for (i, column) in columns.iter().enumerate() {
                object.insert(column.clone(), decode(row, i));
            }
            object
        })
        .collect();
    TabularResult::new(columns, result_rows)
}

#[async_trait]
impl DataSourceConnector for PostgresConnector {
    async fn connect(&mut self) -> Result<(), AppError> {
        let pool = PgPool::connect(&self.connection_string)
            .await
            .map_err(|e| AppError::Connection(format!("failed to connect to postgresql: {}", e)))?;
        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| AppError::Connection(format!("postgresql connection check failed: {}", e)))?;
        info!("connected to postgresql");
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
        let rows = sqlx::query(
            "SELECT table_name, column_name, data_type, is_nullable
             FROM information_schema.columns
             WHERE table_schema = 'public'
             ORDER BY table_name, ordinal_position",
        )
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::Execution(format!("failed to fetch postgresql schema: {}", e)))?;

        let mut tables: Vec<SchemaTable> = Vec::new();
        for row in rows {
            let table_name: String = row.get("table_name");
            let column = SchemaColumn {
                name: row.get("column_name"),
                data_type: row.get("data_type"),
                nullable: row.get::<String, _>("is_nullable") == "YES",
            };
            match tables.last_mut() {
                Some(table) if table.name == table_name => table.columns.push(column),
                _ => tables.push(SchemaTable {
                    name: table_name,
                    columns: vec![column],
                }),
            }
        }
        Ok(SchemaInfo::relational(tables))
    }

    async fn execute_query(&self, query: &str) -> Result<TabularResult, AppError> {
        let pool = self.pool()?;
        let rows = sqlx::query(query)
            .fetch_all(pool)
            .await
            .map_err(|e| AppError::Execution(format!("postgresql query failed: {}", e)))?;

        if rows.is_empty() {
            return Ok(TabularResult::default());
        }
        let columns: Vec<String> = rows[0]
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        Ok(rows_to_tabular(&rows, columns, decode_pg_value))
    }

    async fn get_full_data(&self) -> Result<TabularResult, AppError> {
        Err(AppError::Execution(
            "postgresql has no single whole-source representation; use execute_query with an explicit table".into(),
        ))
    }
}
