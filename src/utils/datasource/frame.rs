//! The frame expression language: a small filter/project/aggregate grammar
//! evaluated against an in-memory table. This is the only query language
//! flat-file connectors accept; there is no code evaluation of any kind.
//!
//! A program is a sequence of stages joined by `|`, applied left to right:
//!
//! ```text
//! filter region == "EMEA" | group month sum sales | sort sum_sales desc | head 10
//! ```
//!
//! Stages: `select c1, c2`, `filter <col> <op> <literal>`, `sort <col>
//! [asc|desc]`, `group <key> <agg> <col>`, `head <n>`, `tail <n>`,
//! `distinct`. The empty program and the bare word `all` are the identity.

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

use super::base::TabularResult;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
}

impl FilterOp {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "==" | "=" => Some(FilterOp::Eq),
            "!=" => Some(FilterOp::Ne),
            ">" => Some(FilterOp::Gt),
            ">=" => Some(FilterOp::Ge),
            "<" => Some(FilterOp::Lt),
            "<=" => Some(FilterOp::Le),
            "contains" => Some(FilterOp::Contains),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AggFn {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

impl AggFn {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "sum" => Some(AggFn::Sum),
            "avg" | "mean" => Some(AggFn::Avg),
            "min" => Some(AggFn::Min),
            "max" => Some(AggFn::Max),
            "count" => Some(AggFn::Count),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AggFn::Sum => "sum",
            AggFn::Avg => "avg",
            AggFn::Min => "min",
            AggFn::Max => "max",
            AggFn::Count => "count",
        }
    }
}

#[derive(Debug, Clone)]
enum Stage {
    Select(Vec<String>),
    Filter {
        column: String,
        op: FilterOp,
        literal: Value,
    },
    Sort {
        column: String,
        descending: bool,
    },
    Group {
        key: String,
        agg: AggFn,
        column: String,
    },
    Head(usize),
    Tail(usize),
    Distinct,
}

fn parse_error(stage: &str, reason: &str) -> AppError {
    AppError::Execution(format!("frame query: {} in stage '{}'", reason, stage))
}

/// Parses a literal token: quoted string, number, bool, null, or bare word.
fn parse_literal(token: &str) -> Value {
    let trimmed = token.trim();
    if (trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2)
        || (trimmed.starts_with('\'') && trimmed.ends_with('\'') && trimmed.len() >= 2)
    {
        return Value::String(trimmed[1..trimmed.len() - 1].to_string());
    }
    match trimmed {
        "null" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(trimmed.to_string())
}

fn parse_stage(raw: &str) -> Result<Stage, AppError> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    let keyword = tokens.first().copied().unwrap_or("");
    match keyword {
        "select" => {
            let rest = raw.trim_start_matches("select").trim();
            let columns: Vec<String> = rest
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            if columns.is_empty() {
                return Err(parse_error(raw, "select needs at least one column"));
            }
            Ok(Stage::Select(columns))
        }
        "filter" => {
            if tokens.len() < 4 {
                return Err(parse_error(raw, "expected 'filter <column> <op> <value>'"));
            }
            let op = FilterOp::parse(tokens[2])
                .ok_or_else(|| parse_error(raw, "unknown comparison operator"))?;
            let literal = parse_literal(&tokens[3..].join(" "));
            Ok(Stage::Filter {
                column: tokens[1].to_string(),
                op,
                literal,
            })
        }
        "sort" => {
            if tokens.len() < 2 || tokens.len() > 3 {
                return Err(parse_error(raw, "expected 'sort <column> [asc|desc]'"));
            }
            let descending = match tokens.get(2).copied() {
                None | Some("asc") => false,
                Some("desc") => true,
                Some(_) => return Err(parse_error(raw, "sort direction must be asc or desc")),
            };
            Ok(Stage::Sort {
                column: tokens[1].to_string(),
                descending,
            })
        }
        "group" => {
            if tokens.len() != 4 {
                return Err(parse_error(raw, "expected 'group <key> <agg> <column>'"));
            }
            let agg = AggFn::parse(tokens[2])
                .ok_or_else(|| parse_error(raw, "unknown aggregate function"))?;
            Ok(Stage::Group {
                key: tokens[1].to_string(),
                agg,
                column: tokens[3].to_string(),
            })
        }
        "head" | "tail" => {
            if tokens.len() != 2 {
                return Err(parse_error(raw, "expected one row-count argument"));
            }
            let n: usize = tokens[1]
                .parse()
                .map_err(|_| parse_error(raw, "row count must be a non-negative integer"))?;
            if keyword == "head" {
                Ok(Stage::Head(n))
            } else {
                Ok(Stage::Tail(n))
            }
        }
        "distinct" => {
            if tokens.len() != 1 {
                return Err(parse_error(raw, "distinct takes no arguments"));
            }
            Ok(Stage::Distinct)
        }
        _ => Err(parse_error(raw, "unknown stage keyword")),
    }
}

fn parse_program(program: &str) -> Result<Vec<Stage>, AppError> {
    let trimmed = program.trim();
    if trimmed.is_empty() || trimmed == "all" {
        return Ok(Vec::new());
    }
    trimmed
        .split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_stage)
        .collect()
}

fn as_f64(value: &Value) -> Option<f64> {
    value.as_f64()
}

/// Total-ish ordering over JSON scalars: numbers numerically, otherwise by
/// string representation. Null sorts last.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => {
            if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            } else {
                display(a).cmp(&display(b))
            }
        }
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn check_column(table: &TabularResult, column: &str, stage: &str) -> Result<(), AppError> {
    if table.columns.iter().any(|c| c == column) {
        Ok(())
    } else {
        Err(AppError::Execution(format!(
            "frame query: unknown column '{}' in stage '{}'",
            column, stage
        )))
    }
}

fn matches_filter(value: &Value, op: FilterOp, literal: &Value) -> bool {
    match op {
        FilterOp::Eq => {
            if literal.is_null() {
                return value.is_null();
            }
            if value.is_null() {
                return false;
            }
            compare_values(value, literal) == Ordering::Equal
        }
        FilterOp::Ne => {
            if literal.is_null() {
                return !value.is_null();
            }
            if value.is_null() {
                return false;
            }
            compare_values(value, literal) != Ordering::Equal
        }
        // Null never satisfies an ordering or substring comparison.
        _ if value.is_null() || literal.is_null() => false,
        FilterOp::Gt => compare_values(value, literal) == Ordering::Greater,
        FilterOp::Ge => compare_values(value, literal) != Ordering::Less,
        FilterOp::Lt => compare_values(value, literal) == Ordering::Less,
        FilterOp::Le => compare_values(value, literal) != Ordering::Greater,
        FilterOp::Contains => display(value).contains(&display(literal)),
    }
}

fn apply_group(
    table: TabularResult,
    key: &str,
    agg: AggFn,
    column: &str,
) -> Result<TabularResult, AppError> {
    let out_column = format!("{}_{}", agg.name(), column);
    // First-seen key order.
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, (Value, Vec<Value>)> =
        std::collections::HashMap::new();

    for row in &table.rows {
        let key_value = row.get(key).cloned().unwrap_or(Value::Null);
        let bucket = display(&key_value);
        let entry = groups.entry(bucket.clone()).or_insert_with(|| {
            order.push(bucket);
            (key_value, Vec::new())
        });
        if let Some(v) = row.get(column) {
            if !v.is_null() {
                entry.1.push(v.clone());
            }
        }
    }

    let mut rows = Vec::with_capacity(order.len());
    for bucket in order {
        let (key_value, values) = groups.remove(&bucket).unwrap_or((Value::Null, Vec::new()));
        let aggregated = match agg {
            AggFn::Count => Value::Number((values.len() as u64).into()),
            AggFn::Sum | AggFn::Avg => {
                let numbers: Vec<f64> = values.iter().filter_map(as_f64).collect();
                if numbers.is_empty() {
                    Value::Null
                } else {
                    let sum: f64 = numbers.iter().sum();
                    let result = if agg == AggFn::Avg {
                        sum / numbers.len() as f64
                    } else {
                        sum
                    };
                    Number::from_f64(result).map(Value::Number).unwrap_or(Value::Null)
                }
            }
            AggFn::Min | AggFn::Max => {
                let mut sorted = values;
                sorted.sort_by(compare_values);
                let picked = if agg == AggFn::Min {
                    sorted.first()
                } else {
                    sorted.last()
                };
                picked.cloned().unwrap_or(Value::Null)
            }
        };
        let mut row = Map::new();
        row.insert(key.to_string(), key_value);
        row.insert(out_column.clone(), aggregated);
        rows.push(row);
    }

    Ok(TabularResult::new(vec![key.to_string(), out_column], rows))
}

fn apply_stage(table: TabularResult, stage: &Stage) -> Result<TabularResult, AppError> {
    match stage {
        Stage::Select(columns) => {
            for column in columns {
                check_column(&table, column, "select")?;
            }
            let rows = table
                .rows
                .into_iter()
                .map(|row| {
                    let mut projected = Map::new();
                    for column in columns {
                        projected.insert(
                            column.clone(),
                            row.get(column).cloned().unwrap_or(Value::Null),
                        );
                    }
                    projected
                })
                .collect();
            Ok(TabularResult::new(columns.clone(), rows))
        }
        Stage::Filter {
            column,
            op,
            literal,
        } => {
            check_column(&table, column, "filter")?;
            let rows = table
                .rows
                .into_iter()
                .filter(|row| {
                    let value = row.get(column).unwrap_or(&Value::Null);
                    matches_filter(value, *op, literal)
                })
                .collect();
            Ok(TabularResult::new(table.columns, rows))
        }
        Stage::Sort { column, descending } => {
            check_column(&table, column, "sort")?;
            let mut rows = table.rows;
            rows.sort_by(|a, b| {
                let left = a.get(column).unwrap_or(&Value::Null);
                let right = b.get(column).unwrap_or(&Value::Null);
                let ordering = compare_values(left, right);
                if *descending {
                    // Keep nulls last in both directions.
                    match (left.is_null(), right.is_null()) {
                        (true, false) => Ordering::Greater,
                        (false, true) => Ordering::Less,
                        _ => ordering.reverse(),
                    }
                } else {
                    ordering
                }
            });
            Ok(TabularResult::new(table.columns, rows))
        }
        Stage::Group { key, agg, column } => {
            check_column(&table, key, "group")?;
            check_column(&table, column, "group")?;
            apply_group(table, key, *agg, column)
        }
        Stage::Head(n) => {
            let mut rows = table.rows;
            rows.truncate(*n);
            Ok(TabularResult::new(table.columns, rows))
        }
        Stage::Tail(n) => {
            let rows = if table.rows.len() > *n {
                table.rows[table.rows.len() - n..].to_vec()
            } else {
                table.rows
            };
            Ok(TabularResult::new(table.columns, rows))
        }
        Stage::Distinct => {
            let mut seen = std::collections::HashSet::new();
            let rows = table
                .rows
                .into_iter()
                .filter(|row| seen.insert(Value::Object(row.clone()).to_string()))
                .collect();
            Ok(TabularResult::new(table.columns, rows))
        }
    }
}

/// Evaluates a frame program against a table. Pure: no I/O, and the input
/// table is only consumed, never mutated in place across calls.
pub fn execute(program: &str, table: &TabularResult) -> Result<TabularResult, AppError> {
    let stages = parse_program(program)?;
    let mut current = table.clone();
    for stage in &stages {
        current = apply_stage(current, stage)?;
    }
    Ok(current)
}
