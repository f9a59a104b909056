//! Materializes connector results into JSON-safe response data and summary
//! statistics.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::models::ResultData;
use crate::utils::datasource::TabularResult;

/// Converts a `TabularResult` into response-ready `ResultData`: every row is
/// normalized to exactly the column set (missing keys become null, stray
/// keys are dropped) and `row_count` equals the number of rows.
pub fn materialize(result: TabularResult) -> ResultData {
    let columns = result.columns;
    let rows: Vec<Map<String, Value>> = result
        .rows
        .into_iter()
        .map(|row| {
            let mut normalized = Map::new();
            for column in &columns {
                normalized.insert(
                    column.clone(),
                    row.get(column).cloned().unwrap_or(Value::Null),
                );
            }
            normalized
        })
        .collect();
    let row_count = rows.len();
    ResultData {
        columns,
        rows,
        row_count,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub data_type: String,
    pub null_count: usize,
    pub distinct_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataSummary {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<ColumnSummary>,
}

fn observed_type(values: &[&Value]) -> &'static str {
    let mut ty = "null";
    for value in values {
        let candidate = match value {
            Value::Null => continue,
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::String(_) => "string",
            _ => "object",
        };
        if ty == "null" {
            ty = candidate;
        } else if ty != candidate {
            return "mixed";
        }
    }
    ty
}

/// Per-column summary statistics over materialized data.
pub fn summarize(data: &ResultData) -> DataSummary {
    let columns = data
        .columns
        .iter()
        .map(|name| {
            let values: Vec<&Value> = data
                .rows
                .iter()
                .map(|row| row.get(name).unwrap_or(&Value::Null))
                .collect();
            let null_count = values.iter().filter(|v| v.is_null()).count();
            let distinct_count = values
                .iter()
                .filter(|v| !v.is_null())
                .map(|v| v.to_string())
                .collect::<HashSet<_>>()
                .len();
            let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
            let (min, max, mean) = if numbers.is_empty() {
                (None, None, None)
            } else {
                let min = numbers.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
                (Some(min), Some(max), Some(mean))
            };
            ColumnSummary {
                name: name.clone(),
                data_type: observed_type(&values).to_string(),
                null_count,
                distinct_count,
                min,
                max,
                mean,
            }
        })
        .collect();

    DataSummary {
        row_count: data.row_count,
        column_count: data.columns.len(),
        columns,
    }
}
