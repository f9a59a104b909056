use async_trait::async_trait;
use csv::ReaderBuilder;
use serde_json::{Map, Number, Value};
use std::path::Path;
use tracing::{debug, info};

use super::base::{DataSourceConnector, TabularResult};
use super::frame;
use crate::error::AppError;
use crate::models::{SchemaColumn, SchemaInfo};

/// Rows sampled per column when inferring data types.
const TYPE_SAMPLE_ROWS: usize = 200;

/// Connector for CSV files. `connect` parses the whole file into an
/// in-memory table; queries are frame expression programs evaluated against
/// that table.
pub struct CsvConnector {
    file_path: String,
    delimiter: u8,
    has_header: bool,
    table: Option<TabularResult>,
}

impl CsvConnector {
    pub fn new(config: &Value) -> Result<Self, AppError> {
        let file_path = config
            .get("file_path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Config("csv connector requires file_path".into()))?
            .to_string();

        let delimiter = config
            .get("delimiter")
            .and_then(|v| v.as_str())
            .and_then(|s| s.chars().next())
            .unwrap_or(',') as u8;

        let has_header = config
            .get("has_header")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        Ok(CsvConnector {
            file_path,
            delimiter,
            has_header,
            table: None,
        })
    }

    fn loaded(&self) -> Result<&TabularResult, AppError> {
        self.table
            .as_ref()
            .ok_or_else(|| AppError::Connection("csv connector is not connected".into()))
    }

    /// Typed cell parse: empty -> null, then integer, float, bool, string.
    fn parse_cell(raw: &str) -> Value {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        if let Ok(n) = trimmed.parse::<i64>() {
            return Value::Number(n.into());
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if let Some(n) = Number::from_f64(f) {
                return Value::Number(n);
            }
        }
        match trimmed {
            "true" | "True" | "TRUE" => return Value::Bool(true),
            "false" | "False" | "FALSE" => return Value::Bool(false),
            _ => {}
        }
        Value::String(raw.to_string())
    }

    fn infer_column_type(table: &TabularResult, column: &str) -> (String, bool) {
        let mut nullable = false;
        let mut saw_float = false;
        let mut saw_int = false;
        let mut saw_bool = false;
        let mut saw_string = false;

        for row in table.rows.iter().take(TYPE_SAMPLE_ROWS) {
            match row.get(column) {
                None | Some(Value::Null) => nullable = true,
                Some(Value::Number(n)) => {
                    if n.is_i64() {
                        saw_int = true;
                    } else {
                        saw_float = true;
                    }
                }
                Some(Value::Bool(_)) => saw_bool = true,
                Some(_) => saw_string = true,
            }
        }

        let data_type = if saw_string {
            "string"
        } else if saw_float {
            "float"
        } else if saw_int {
            "integer"
        } else if saw_bool {
            "boolean"
        } else {
            "string"
        };
        (data_type.to_string(), nullable)
    }

    fn load(&self) -> Result<TabularResult, AppError> {
        let path = Path::new(&self.file_path);
        if !path.exists() {
            return Err(AppError::NotFound(format!(
                "CSV file not found: {}",
                self.file_path
            )));
        }

        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.has_header)
            .flexible(true)
            .from_path(path)
            .map_err(|e| AppError::Connection(format!("failed to open CSV file: {}", e)))?;

        let columns: Vec<String> = if self.has_header {
            reader
                .headers()
                .map_err(|e| AppError::Connection(format!("failed to read CSV header: {}", e)))?
                .iter()
                .map(|h| h.to_string())
                .collect()
        } else {
            // Synthesize column names from the first record's width.
            let width = reader
                .records()
                .next()
                .transpose()
                .map_err(|e| AppError::Connection(format!("failed to read CSV: {}", e)))?
                .map(|r| r.len())
                .unwrap_or(0);
            // Re-open so the first record is not consumed.
            return self.load_headerless(width);
        };

        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|e| AppError::Connection(format!("failed to read CSV: {}", e)))?;
            let mut row = Map::new();
            for (i, column) in columns.iter().enumerate() {
                let value = record.get(i).map(Self::parse_cell).unwrap_or(Value::Null);
                row.insert(column.clone(), value);
            }
            rows.push(row);
        }

        Ok(TabularResult::new(columns, rows))
    }

    fn load_headerless(&self, width: usize) -> Result<TabularResult, AppError> {
        let columns: Vec<String> = (0..width).map(|i| format!("column_{}", i)).collect();
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_path(&self.file_path)
            .map_err(|e| AppError::Connection(format!("failed to open CSV file: {}", e)))?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|e| AppError::Connection(format!("failed to read CSV: {}", e)))?;
            let mut row = Map::new();
            for (i, column) in columns.iter().enumerate() {
                let value = record.get(i).map(Self::parse_cell).unwrap_or(Value::Null);
                row.insert(column.clone(), value);
            }
            rows.push(row);
        }
        Ok(TabularResult::new(columns, rows))
    }
}

#[async_trait]
impl DataSourceConnector for CsvConnector {
    async fn connect(&mut self) -> Result<(), AppError> {
        let table = self.load()?;
        info!(
            file_path = %self.file_path,
            rows = table.row_count(),
            "loaded CSV file"
        );
        self.table = Some(table);
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.table = None;
    }

    async fn get_schema(&self) -> Result<SchemaInfo, AppError> {
        let table = self.loaded()?;
        let columns = table
            .columns
            .iter()
            .map(|name| {
                let (data_type, nullable) = Self::infer_column_type(table, name);
                SchemaColumn {
                    name: name.clone(),
                    data_type,
                    nullable,
                }
            })
            .collect();
        Ok(SchemaInfo::flat(columns))
    }

    async fn execute_query(&self, query: &str) -> Result<TabularResult, AppError> {
        let table = self.loaded()?;
        debug!(query = %query, "executing frame query against CSV table");
        frame::execute(query, table)
    }

    async fn get_full_data(&self) -> Result<TabularResult, AppError> {
        Ok(self.loaded()?.clone())
    }
}
