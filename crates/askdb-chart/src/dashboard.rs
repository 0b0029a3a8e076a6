use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use askdb_core::{Error, QueryResult, Result};

use crate::config::chartjs_config;
use crate::spec::ChartSpec;

const CHARTJS_CDN: &str = "https://cdn.jsdelivr.net/npm/chart.js";

/// One answered question on a dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardEntry {
    pub question: String,
    pub sql: String,
    pub result: QueryResult,
    pub chart: Option<ChartSpec>,
}

/// Append-only collection of answered questions, serializable to a
/// self-contained HTML page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub title: String,
    pub entries: Vec<DashboardEntry>,
}

impl Dashboard {
    pub fn new(title: impl Into<String>) -> Self {
        Dashboard {
            title: title.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: DashboardEntry) {
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to a standalone HTML page. Charts load Chart.js from a
    /// CDN; results render as plain tables. Fails with
    /// `EmptySerialization` when no entry has been pushed.
    pub fn to_html(&self) -> Result<String> {
        if self.entries.is_empty() {
            return Err(Error::EmptySerialization);
        }

        let mut page = String::new();
        let _ = write!(
            page,
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{title}</title>\n<script src=\"{cdn}\"></script>\n<style>{css}</style>\n\
             </head>\n<body>\n<h1>{title}</h1>\n",
            title = escape_html(&self.title),
            cdn = CHARTJS_CDN,
            css = PAGE_CSS,
        );

        let mut scripts = String::new();
        for (index, entry) in self.entries.iter().enumerate() {
            let _ = write!(
                page,
                "<section class=\"card\">\n<h2>{}</h2>\n<pre class=\"sql\">{}</pre>\n",
                escape_html(&entry.question),
                escape_html(&entry.sql),
            );
            match &entry.chart {
                Some(spec) => {
                    let canvas_id = format!("chart-{index}");
                    let config = chartjs_config(&entry.result, spec);
                    if config.is_null() {
                        page.push_str(&result_table(&entry.result));
                    } else {
                        let _ = write!(
                            page,
                            "<div class=\"chart\"><canvas id=\"{canvas_id}\"></canvas></div>\n"
                        );
                        let _ = write!(
                            scripts,
                            "new Chart(document.getElementById(\"{canvas_id}\"), {config});\n"
                        );
                    }
                }
                None => page.push_str(&result_table(&entry.result)),
            }
            page.push_str("</section>\n");
        }

        let _ = write!(
            page,
            "<footer>Generated {}</footer>\n<script>\n{scripts}</script>\n</body>\n</html>\n",
            Utc::now().format("%Y-%m-%d %H:%M UTC"),
        );
        Ok(page)
    }

    /// Write the rendered page under `dir` as `<slug>-<uuid>.html` and
    /// return the path.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let html = self.to_html()?;
        std::fs::create_dir_all(dir)
            .map_err(|err| Error::Other(format!("creating {}: {err}", dir.display())))?;
        let file_name = format!("{}-{}.html", slugify(&self.title), Uuid::new_v4());
        let path = dir.join(file_name);
        std::fs::write(&path, html)
            .map_err(|err| Error::Other(format!("writing {}: {err}", path.display())))?;
        Ok(path)
    }
}

const PAGE_CSS: &str = "body{font-family:system-ui,sans-serif;max-width:960px;margin:2rem auto;\
padding:0 1rem;color:#1f2430}.card{border:1px solid #d8dce3;border-radius:8px;padding:1rem 1.5rem;\
margin-bottom:1.5rem}.sql{background:#f4f6f8;padding:.75rem;border-radius:6px;overflow-x:auto}\
.chart{max-width:720px}table{border-collapse:collapse;width:100%}th,td{border:1px solid #d8dce3;\
padding:.4rem .6rem;text-align:left}footer{color:#7a8190;font-size:.85rem}";

fn result_table(result: &QueryResult) -> String {
    let mut table = String::from("<table>\n<tr>");
    for column in &result.columns {
        let _ = write!(table, "<th>{}</th>", escape_html(column));
    }
    table.push_str("</tr>\n");
    for row in &result.rows {
        table.push_str("<tr>");
        for cell in row {
            let _ = write!(table, "<td>{}</td>", escape_html(&cell.to_string()));
        }
        table.push_str("</tr>\n");
    }
    table.push_str("</table>\n");
    if result.truncated {
        table.push_str("<p><em>Result truncated.</em></p>\n");
    }
    table
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "dashboard".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::ChartKind;
    use askdb_core::ScalarValue;

    fn entry() -> DashboardEntry {
        DashboardEntry {
            question: "Revenue by region?".into(),
            sql: "SELECT region, SUM(amount) AS revenue FROM orders GROUP BY region".into(),
            result: QueryResult {
                columns: vec!["region".into(), "revenue".into()],
                rows: vec![vec![ScalarValue::Text("north".into()), ScalarValue::Int(10)]],
                truncated: false,
            },
            chart: Some(ChartSpec {
                kind: ChartKind::Bar,
                label_field: "region".into(),
                value_fields: vec!["revenue".into()],
                title: "Revenue by region".into(),
            }),
        }
    }

    #[test]
    fn empty_dashboard_refuses_to_serialize() {
        let err = Dashboard::new("Sales").to_html().unwrap_err();
        assert_eq!(err.kind(), "empty_serialization");
    }

    #[test]
    fn page_carries_question_and_sql_verbatim() {
        let mut dash = Dashboard::new("Sales");
        dash.push(entry());
        let html = dash.to_html().unwrap();
        assert!(html.contains("Revenue by region?"));
        assert!(html.contains("SELECT region, SUM(amount) AS revenue"));
        assert!(html.contains(CHARTJS_CDN));
        assert!(html.contains("new Chart(document.getElementById(\"chart-0\")"));
    }

    #[test]
    fn html_in_questions_is_escaped() {
        let mut dash = Dashboard::new("Sales");
        let mut bad = entry();
        bad.question = "<script>alert(1)</script>".into();
        dash.push(bad);
        let html = dash.to_html().unwrap();
        assert!(!html.contains("<script>alert(1)"));
        assert!(html.contains("&lt;script&gt;alert(1)"));
    }

    #[test]
    fn chartless_entry_renders_a_table() {
        let mut dash = Dashboard::new("Sales");
        let mut plain = entry();
        plain.chart = None;
        dash.push(plain);
        let html = dash.to_html().unwrap();
        assert!(html.contains("<th>region</th>"));
        assert!(html.contains("<td>north</td>"));
    }

    #[test]
    fn save_writes_a_slugged_file() {
        let dir = std::env::temp_dir().join(format!("askdb-dash-{}", Uuid::new_v4()));
        let mut dash = Dashboard::new("Q3 Sales Review");
        dash.push(entry());
        let path = dash.save(&dir).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("q3-sales-review-"));
        assert!(std::fs::read_to_string(&path).unwrap().contains("Q3 Sales Review"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
