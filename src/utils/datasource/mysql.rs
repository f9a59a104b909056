use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};
use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::{Column, Row};
use tracing::info;

use super::base::{DataSourceConnector, TabularResult};
use super::postgres::rows_to_tabular;
use crate::error::AppError;
use crate::models::{SchemaColumn, SchemaInfo, SchemaTable};

pub struct MySqlConnector {
    connection_string: String,
    pool: Option<MySqlPool>,
}

impl MySqlConnector {
    pub fn new(config: &Value) -> Result<Self, AppError> {
        let host = config
            .get("host")
            .and_then(|v| v.as_str())
            .unwrap_or("localhost");
        let port = config.get("port").and_then(|v| v.as_u64()).unwrap_or(3306);
        let database = config
            .get("database")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Config("mysql connector requires database".into()))?;
        let username = config
            .get("username")
            .and_then(|v| v.as_str())
            .unwrap_or("root");
        let password = config.get("password").and_then(|v| v.as_str()).unwrap_or("");

        let connection_string = if password.is_empty() {
            format!("mysql://{}@{}:{}/{}", username, host, port, database)
        } else {
            format!(
                "mysql://{}:{}@{}:{}/{}",
                username, password, host, port, database
            )
        };

        Ok(MySqlConnector {
            connection_string,
            pool: None,
        })
    }

    fn pool(&self) -> Result<&MySqlPool, AppError> {
        self.pool
            .as_ref()
            .ok_or_else(|| AppError::Connection("mysql connector is not connected".into()))
    }
}

fn decode_mysql_value(row: &MySqlRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
        return v
            .map(|n| Value::Number((n as i64).into()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(index) {
        return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
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
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    Value::Null
}

#[async_trait]
impl DataSourceConnector for MySqlConnector {
    async fn connect(&mut self) -> Result<(), AppError> {
        let pool = MySqlPool::connect(&self.connection_string)
            .await
            .map_err(|e| AppError::Connection(format!("failed to connect to mysql: {}", e)))?;
        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| AppError::Connection(format!("mysql connection check failed: {}", e)))?;
        info!("connected to mysql");
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
            "SELECT TABLE_NAME as table_name,
                    COLUMN_NAME as column_name,
                    DATA_TYPE as data_type,
                    IS_NULLABLE as is_nullable
             FROM INFORMATION_SCHEMA.COLUMNS
             WHERE TABLE_SCHEMA = DATABASE()
             ORDER BY TABLE_NAME, ORDINAL_POSITION",
        )
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::Execution(format!("failed to fetch mysql schema: {}", e)))?;

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
            .map_err(|e| AppError::Execution(format!("mysql query failed: {}", e)))?;

        if rows.is_empty() {
            return Ok(TabularResult::default());
        }
        let columns: Vec<String> = rows[0]
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        Ok(rows_to_tabular(&rows, columns, decode_mysql_value))
    }

    async fn get_full_data(&self) -> Result<TabularResult, AppError> {
        Err(AppError::Execution(
            "mysql has no single whole-source representation; use execute_query with an explicit table".into(),
        ))
    }
}
