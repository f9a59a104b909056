//! Deterministic, model-free visualization defaults. Used as the lenient
//! fallback whenever an LLM recommendation cannot be normalized, and for
//! chart-type suggestions from data shape alone. Everything here is pure:
//! identical inputs always produce identical specs.

use serde_json::{Map, Value};

use crate::models::{AxisConfig, ChartConfig, ChartType, SeriesConfig, VisualizationSpec};

const SERIES_COLORS: &[&str] = &["#8884d8", "#82ca9d", "#ffc658", "#ff7300", "#0088fe"];

const DATE_HINTS: &[&str] = &["date", "time", "year", "month", "day"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataKind {
    Empty,
    TimeSeries,
    Comparison,
    Distribution,
    Correlation,
}

#[derive(Debug, Clone)]
pub struct DataCharacteristics {
    pub kind: DataKind,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub date_columns: Vec<String>,
    pub row_count: usize,
}

/// Classifies columns from the first row's values and column names, then
/// derives the overall result kind.
pub fn analyze_characteristics(
    columns: &[String],
    rows: &[Map<String, Value>],
) -> DataCharacteristics {
    if rows.is_empty() {
        return DataCharacteristics {
            kind: DataKind::Empty,
            numeric_columns: Vec::new(),
            categorical_columns: Vec::new(),
            date_columns: Vec::new(),
            row_count: 0,
        };
    }

    let mut numeric_columns = Vec::new();
    let mut categorical_columns = Vec::new();
    let mut date_columns = Vec::new();

    let sample = &rows[0];
    for column in columns {
        match sample.get(column) {
            Some(Value::Number(_)) => numeric_columns.push(column.clone()),
            Some(Value::String(_)) => {
                let lowered = column.to_lowercase();
                if DATE_HINTS.iter().any(|hint| lowered.contains(hint)) {
                    date_columns.push(column.clone());
                } else {
                    categorical_columns.push(column.clone());
                }
            }
            _ => {}
        }
    }

    let kind = if !date_columns.is_empty() {
        DataKind::TimeSeries
    } else if numeric_columns.len() >= 2 && categorical_columns.is_empty() {
        DataKind::Correlation
    } else if categorical_columns.len() == 1 && numeric_columns.len() == 1 && rows.len() <= 6 {
        DataKind::Distribution
    } else {
        DataKind::Comparison
    };

    DataCharacteristics {
        kind,
        numeric_columns,
        categorical_columns,
        date_columns,
        row_count: rows.len(),
    }
}

pub fn suggest_chart_type(characteristics: &DataCharacteristics) -> ChartType {
    match characteristics.kind {
        DataKind::TimeSeries => ChartType::Line,
        DataKind::Correlation => ChartType::Scatter,
        DataKind::Distribution => ChartType::Pie,
        DataKind::Comparison | DataKind::Empty => ChartType::Bar,
    }
}

fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_title(question: &str) -> String {
    if question.chars().count() > 50 {
        let prefix: String = question.chars().take(50).collect();
        format!("{}...", prefix)
    } else {
        question.to_string()
    }
}

/// The default spec substituted on the lenient path: first column on the
/// x-axis, second column (or the first when only one exists) as the sole
/// series, bar chart, legend/tooltip/grid enabled.
pub fn default_spec(columns: &[String], question: &str) -> VisualizationSpec {
    let x_key = columns.first().cloned().unwrap_or_else(|| "x".to_string());
    let y_key = columns
        .get(1)
        .or_else(|| columns.first())
        .cloned()
        .unwrap_or_else(|| "y".to_string());

    VisualizationSpec {
        chart_type: ChartType::Bar,
        title: truncate_title(question),
        description: Some("Data visualization".to_string()),
        chart_config: ChartConfig {
            x_axis: AxisConfig {
                data_key: x_key.clone(),
                label: Some(title_case(&x_key)),
            },
            y_axis: Some(AxisConfig {
                data_key: y_key.clone(),
                label: Some(title_case(&y_key)),
            }),
            series: vec![SeriesConfig {
                data_key: y_key.clone(),
                name: Some(title_case(&y_key)),
                color: Some(SERIES_COLORS[0].to_string()),
            }],
            legend: true,
            tooltip: true,
            grid: true,
        },
        data_config: Value::Object(Map::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows_of(pairs: Vec<Vec<(&str, Value)>>) -> Vec<Map<String, Value>> {
        pairs
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect::<Map<String, Value>>()
            })
            .collect()
    }

    #[test]
    fn default_spec_is_pure() {
        let columns = vec!["month".to_string(), "sales".to_string()];
        let a = default_spec(&columns, "monthly sales");
        let b = default_spec(&columns, "monthly sales");
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap()
        );
        assert_eq!(a.chart_type, ChartType::Bar);
        assert_eq!(a.chart_config.x_axis.data_key, "month");
        assert_eq!(a.chart_config.series.len(), 1);
        assert_eq!(a.chart_config.series[0].data_key, "sales");
        assert!(a.chart_config.legend && a.chart_config.tooltip && a.chart_config.grid);
    }

    #[test]
    fn default_spec_single_column_reuses_it() {
        let columns = vec!["total".to_string()];
        let spec = default_spec(&columns, "the total");
        assert_eq!(spec.chart_config.x_axis.data_key, "total");
        assert_eq!(spec.chart_config.series[0].data_key, "total");
    }

    #[test]
    fn default_spec_truncates_long_titles() {
        let question = "x".repeat(80);
        let spec = default_spec(&["a".to_string()], &question);
        assert_eq!(spec.title.chars().count(), 53);
        assert!(spec.title.ends_with("..."));
    }

    #[test]
    fn date_named_string_column_means_time_series() {
        let columns = vec!["order_date".to_string(), "revenue".to_string()];
        let rows = rows_of(vec![vec![
            ("order_date", json!("2026-01-01")),
            ("revenue", json!(10.5)),
        ]]);
        let chars = analyze_characteristics(&columns, &rows);
        assert_eq!(chars.kind, DataKind::TimeSeries);
        assert_eq!(suggest_chart_type(&chars), ChartType::Line);
    }

    #[test]
    fn two_numeric_columns_mean_correlation() {
        let columns = vec!["height".to_string(), "weight".to_string()];
        let rows = rows_of(vec![vec![("height", json!(1.8)), ("weight", json!(80))]]);
        let chars = analyze_characteristics(&columns, &rows);
        assert_eq!(chars.kind, DataKind::Correlation);
        assert_eq!(suggest_chart_type(&chars), ChartType::Scatter);
    }

    #[test]
    fn small_categorical_breakdown_means_distribution() {
        let columns = vec!["region".to_string(), "sales".to_string()];
        let rows = rows_of(vec![
            vec![("region", json!("EMEA")), ("sales", json!(10))],
            vec![("region", json!("APAC")), ("sales", json!(20))],
        ]);
        let chars = analyze_characteristics(&columns, &rows);
        assert_eq!(chars.kind, DataKind::Distribution);
        assert_eq!(suggest_chart_type(&chars), ChartType::Pie);
    }

    #[test]
    fn empty_rows_default_to_bar() {
        let chars = analyze_characteristics(&["a".to_string()], &[]);
        assert_eq!(chars.kind, DataKind::Empty);
        assert_eq!(suggest_chart_type(&chars), ChartType::Bar);
    }
}
