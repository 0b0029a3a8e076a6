use std::fmt;

use serde::{Deserialize, Serialize};

/// A single scalar cell decoded from a driver row. Richer backend types
/// (dates, decimals, uuids, json) are carried as their text form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    /// Numeric view of the value, used by chart inference and dataset
    /// building. Text that parses as a number counts.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int(v) => Some(*v as f64),
            ScalarValue::Float(v) => Some(*v),
            ScalarValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            ScalarValue::Text(v) => v.trim().parse().ok(),
            ScalarValue::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => f.write_str(""),
            ScalarValue::Bool(v) => write!(f, "{v}"),
            ScalarValue::Int(v) => write!(f, "{v}"),
            ScalarValue::Float(v) => write!(f, "{v}"),
            ScalarValue::Text(v) => f.write_str(v),
        }
    }
}

/// Rows plus column metadata returned by the executor. Immutable once
/// produced; `truncated` is set when the executor hit the row cap and
/// more rows existed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<ScalarValue>>,
    pub truncated: bool,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col == name)
    }

    /// Render the result as a markdown table, with a footnote when the
    /// row cap truncated the result.
    pub fn format_markdown(&self) -> String {
        if self.columns.is_empty() {
            return "Query returned no results.".to_string();
        }

        let mut lines = Vec::with_capacity(self.rows.len() + 3);
        lines.push(format!("| {} |", self.columns.join(" | ")));
        lines.push(format!(
            "| {} |",
            self.columns.iter().map(|_| "---").collect::<Vec<_>>().join(" | ")
        ));
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|value| value.to_string()).collect();
            lines.push(format!("| {} |", cells.join(" | ")));
        }

        let mut table = lines.join("\n");
        if self.truncated {
            table.push_str(&format!(
                "\n\n*Results truncated to {} rows.*",
                self.rows.len()
            ));
        }
        table
    }
}
