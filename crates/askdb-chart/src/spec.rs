use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use askdb_core::{Error, QueryResult, Result, ScalarValue};

/// Renderable chart kinds. `Table` is the non-chart hint: the caller
/// shows the raw result instead of drawing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    HorizontalBar,
    Line,
    Pie,
    Doughnut,
    Scatter,
    Table,
}

impl ChartKind {
    /// Parse a user- or model-supplied kind tag.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "bar" => Some(ChartKind::Bar),
            "horizontal_bar" | "horizontalbar" | "hbar" => Some(ChartKind::HorizontalBar),
            "line" => Some(ChartKind::Line),
            "pie" => Some(ChartKind::Pie),
            "doughnut" | "donut" => Some(ChartKind::Doughnut),
            "scatter" => Some(ChartKind::Scatter),
            "table" => Some(ChartKind::Table),
            _ => None,
        }
    }
}

impl ChartKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::HorizontalBar => "horizontal_bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Doughnut => "doughnut",
            ChartKind::Scatter => "scatter",
            ChartKind::Table => "table",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Declarative chart description, independent of any rendering library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub label_field: String,
    pub value_fields: Vec<String>,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnClass {
    Numeric,
    TimeLike,
    Categorical,
}

/// Derive a chart spec from a result and an optional requested kind.
///
/// Inference is purely local and type-driven: a time-like column plus a
/// numeric column becomes a line; a small categorical domain with one
/// numeric column becomes a pie; categorical plus numeric becomes a bar
/// (horizontal when the label domain is wide or labels are long); two
/// numeric columns with no label column become a scatter. A result with
/// no numeric column fails with `NoChartableColumns`, which callers
/// treat as "show the table" rather than an error for the end user.
pub fn infer_chart(
    result: &QueryResult,
    requested: Option<ChartKind>,
    title: &str,
) -> Result<ChartSpec> {
    if result.columns.is_empty() || result.rows.is_empty() {
        return Err(Error::NoChartableColumns);
    }

    let classes: Vec<ColumnClass> = result
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| classify_column(name, result.rows.iter().map(|row| &row[idx])))
        .collect();

    let numeric_fields: Vec<String> = result
        .columns
        .iter()
        .zip(&classes)
        .filter(|(_, class)| **class == ColumnClass::Numeric)
        .map(|(name, _)| name.clone())
        .collect();
    if numeric_fields.is_empty() {
        return Err(Error::NoChartableColumns);
    }

    let label_idx = classes
        .iter()
        .position(|class| *class == ColumnClass::TimeLike)
        .or_else(|| classes.iter().position(|class| *class == ColumnClass::Categorical));

    let spec = match label_idx {
        Some(idx) => {
            let label_field = result.columns[idx].clone();
            let value_fields: Vec<String> = numeric_fields
                .into_iter()
                .filter(|field| *field != label_field)
                .collect();
            if value_fields.is_empty() {
                return Err(Error::NoChartableColumns);
            }
            let kind = requested.unwrap_or_else(|| {
                infer_kind_for_label(result, idx, classes[idx], value_fields.len())
            });
            ChartSpec {
                kind,
                label_field,
                value_fields,
                title: title.to_string(),
            }
        }
        None => {
            // All columns numeric: pair the first two as a scatter, or
            // fall back to the table hint for a single column.
            if numeric_fields.len() >= 2 {
                ChartSpec {
                    kind: requested.unwrap_or(ChartKind::Scatter),
                    label_field: numeric_fields[0].clone(),
                    value_fields: vec![numeric_fields[1].clone()],
                    title: title.to_string(),
                }
            } else {
                ChartSpec {
                    kind: requested.unwrap_or(ChartKind::Table),
                    label_field: numeric_fields[0].clone(),
                    value_fields: numeric_fields,
                    title: title.to_string(),
                }
            }
        }
    };

    Ok(spec)
}

fn infer_kind_for_label(
    result: &QueryResult,
    label_idx: usize,
    label_class: ColumnClass,
    value_count: usize,
) -> ChartKind {
    if label_class == ColumnClass::TimeLike {
        return ChartKind::Line;
    }

    let labels: Vec<String> = result
        .rows
        .iter()
        .map(|row| row[label_idx].to_string())
        .collect();
    let distinct: BTreeSet<&str> = labels.iter().map(|label| label.as_str()).collect();

    if distinct.len() <= 8 && value_count == 1 {
        return ChartKind::Pie;
    }
    let long_labels = !labels.is_empty()
        && labels.iter().map(|label| label.len()).sum::<usize>() / labels.len() > 15;
    if distinct.len() > 12 || long_labels {
        return ChartKind::HorizontalBar;
    }
    ChartKind::Bar
}

fn classify_column<'a>(
    name: &str,
    values: impl Iterator<Item = &'a ScalarValue>,
) -> ColumnClass {
    let mut saw_value = false;
    let mut all_numeric = true;
    let mut all_date_shaped = true;

    for value in values {
        if value.is_null() {
            continue;
        }
        saw_value = true;
        if value.as_f64().is_none() {
            all_numeric = false;
        }
        match value {
            ScalarValue::Text(text) if is_date_shaped(text) => {}
            _ => all_date_shaped = false,
        }
    }

    if !saw_value {
        return ColumnClass::Categorical;
    }
    // Values decide first: a purely numeric column is a value column
    // even when its name mentions a time word (`orders_per_day`). The
    // name hint only promotes non-numeric text to the time axis.
    if all_date_shaped {
        return ColumnClass::TimeLike;
    }
    if all_numeric {
        return ColumnClass::Numeric;
    }
    if time_hinted_name(name) {
        return ColumnClass::TimeLike;
    }
    ColumnClass::Categorical
}

fn time_hinted_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    ["date", "time", "month", "year", "day", "week", "quarter", "created", "updated"]
        .iter()
        .any(|hint| lower.contains(hint))
}

/// `YYYY-MM-DD` optionally followed by a time component.
fn is_date_shaped(text: &str) -> bool {
    let bytes = text.trim().as_bytes();
    bytes.len() >= 10
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(columns: &[&str], rows: Vec<Vec<ScalarValue>>) -> QueryResult {
        QueryResult {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
            truncated: false,
        }
    }

    fn text(value: &str) -> ScalarValue {
        ScalarValue::Text(value.to_string())
    }

    #[test]
    fn small_categorical_domain_becomes_pie() {
        let res = result(
            &["region", "revenue"],
            vec![
                vec![text("north"), ScalarValue::Int(10)],
                vec![text("south"), ScalarValue::Int(20)],
                vec![text("west"), ScalarValue::Int(15)],
            ],
        );
        let spec = infer_chart(&res, None, "revenue by region").unwrap();
        assert_eq!(spec.kind, ChartKind::Pie);
        assert_eq!(spec.label_field, "region");
        assert_eq!(spec.value_fields, ["revenue"]);
    }

    #[test]
    fn time_ordered_column_becomes_line() {
        let res = result(
            &["order_date", "total"],
            vec![
                vec![text("2024-01-01"), ScalarValue::Float(10.0)],
                vec![text("2024-01-02"), ScalarValue::Float(12.0)],
            ],
        );
        let spec = infer_chart(&res, None, "daily totals").unwrap();
        assert_eq!(spec.kind, ChartKind::Line);
        assert_eq!(spec.label_field, "order_date");
    }

    #[test]
    fn wide_categorical_domain_becomes_bar() {
        let rows: Vec<Vec<ScalarValue>> = (0..10)
            .map(|i| vec![text(&format!("c{i}")), ScalarValue::Int(i), ScalarValue::Int(i * 2)])
            .collect();
        let res = result(&["name", "count", "total"], rows);
        // Two value columns, so the pie rule does not apply.
        let spec = infer_chart(&res, None, "t").unwrap();
        assert_eq!(spec.kind, ChartKind::Bar);
        assert_eq!(spec.value_fields, ["count", "total"]);
    }

    #[test]
    fn many_categories_become_horizontal_bar() {
        let rows: Vec<Vec<ScalarValue>> = (0..20)
            .map(|i| vec![text(&format!("category-{i}")), ScalarValue::Int(i), ScalarValue::Int(i)])
            .collect();
        let res = result(&["name", "a", "b"], rows);
        let spec = infer_chart(&res, None, "t").unwrap();
        assert_eq!(spec.kind, ChartKind::HorizontalBar);
    }

    #[test]
    fn two_numeric_columns_become_scatter() {
        let res = result(
            &["price", "quantity"],
            vec![
                vec![ScalarValue::Float(1.5), ScalarValue::Int(3)],
                vec![ScalarValue::Float(2.5), ScalarValue::Int(1)],
            ],
        );
        let spec = infer_chart(&res, None, "t").unwrap();
        assert_eq!(spec.kind, ChartKind::Scatter);
        assert_eq!(spec.label_field, "price");
        assert_eq!(spec.value_fields, ["quantity"]);
    }

    #[test]
    fn numeric_column_with_time_word_in_name_stays_a_value_column() {
        let res = result(
            &["customer", "orders_per_day"],
            vec![
                vec![text("alice"), ScalarValue::Int(4)],
                vec![text("bob"), ScalarValue::Int(2)],
                vec![text("carol"), ScalarValue::Int(2)],
            ],
        );
        let spec = infer_chart(&res, None, "orders per day by customer").unwrap();
        assert_eq!(spec.kind, ChartKind::Pie);
        assert_eq!(spec.label_field, "customer");
        assert_eq!(spec.value_fields, ["orders_per_day"]);
    }

    #[test]
    fn no_numeric_column_is_not_chartable() {
        let res = result(
            &["name", "city"],
            vec![vec![text("alice"), text("lisbon")]],
        );
        let err = infer_chart(&res, None, "t").unwrap_err();
        assert_eq!(err.kind(), "no_chartable_columns");
    }

    #[test]
    fn empty_result_is_not_chartable() {
        let res = result(&["a"], vec![]);
        assert!(infer_chart(&res, None, "t").is_err());
    }

    #[test]
    fn requested_kind_wins() {
        let res = result(
            &["region", "revenue"],
            vec![vec![text("north"), ScalarValue::Int(10)]],
        );
        let spec = infer_chart(&res, Some(ChartKind::Doughnut), "t").unwrap();
        assert_eq!(spec.kind, ChartKind::Doughnut);
    }

    #[test]
    fn parses_kind_aliases() {
        assert_eq!(ChartKind::parse("horizontalBar"), Some(ChartKind::HorizontalBar));
        assert_eq!(ChartKind::parse("Donut"), Some(ChartKind::Doughnut));
        assert_eq!(ChartKind::parse("sparkline"), None);
    }
}
