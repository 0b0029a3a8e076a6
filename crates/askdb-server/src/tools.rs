use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use askdb_chart::{chartjs_config, infer_chart, ChartKind, ChartSpec, Dashboard, DashboardEntry};
use askdb_core::{QueryResult, Result};
use askdb_nl::{chart_prompt, explain_prompt, extract_and_guard, guard_read_only, sql_prompt};

use crate::session::{ConnectedDb, Session};

/// Result of one answered question.
#[derive(Debug, Clone, Serialize)]
pub struct AskOutcome {
    pub question: String,
    pub sql: String,
    pub result: QueryResult,
    pub markdown: String,
}

/// Result of the chart pipeline: the answered question plus a chart
/// spec and its rendered Chart.js configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ChartOutcome {
    pub question: String,
    pub sql: String,
    pub result: QueryResult,
    pub chart: ChartSpec,
    pub config: Value,
}

/// Result of explaining a query: the SQL that was explained (either
/// given directly or generated from a question) and the explanation.
#[derive(Debug, Clone, Serialize)]
pub struct ExplainOutcome {
    pub sql: String,
    pub explanation: String,
}

/// Result of saving a dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    pub path: PathBuf,
    pub entries: usize,
    pub charts: usize,
    pub warnings: Vec<String>,
}

/// Chart hints parsed from the model's JSON suggestion. Field-level
/// tolerance: anything missing or malformed just drops out.
#[derive(Debug, Default)]
struct ChartSuggestion {
    kind: Option<ChartKind>,
    title: Option<String>,
}

impl Session {
    /// Full question-to-result pipeline: prompt, completion, extraction
    /// and read-only guard, then capped execution. The guard sits
    /// between the model and the executor; nothing it rejects is ever
    /// sent to the database.
    pub async fn ask_question(&self, question: &str) -> Result<AskOutcome> {
        let inner = self.inner.lock().await;
        let db = inner.db()?;
        self.ask_inner(db, question).await
    }

    async fn ask_inner(&self, db: &ConnectedDb, question: &str) -> Result<AskOutcome> {
        let client = self.client()?;
        let prompt = sql_prompt(&db.schema_text, db.dialect, question);
        let response = client.complete(&prompt).await?;
        let sql = match extract_and_guard(&response) {
            Ok(sql) => sql,
            Err(err) => {
                warn!(event = "statement_rejected", kind = err.kind(), %err);
                return Err(err);
            }
        };
        let result = db.adapter.execute(&sql, self.settings.max_rows).await?;
        info!(
            event = "question_answered",
            rows = result.row_count(),
            truncated = result.truncated,
        );
        let markdown = result.format_markdown();
        Ok(AskOutcome {
            question: question.to_string(),
            sql,
            result,
            markdown,
        })
    }

    /// Answer a question and derive a chart for the result. Chart kind
    /// resolution: an explicit `requested` kind always wins; otherwise
    /// local type-driven inference decides, and the model's suggestion
    /// is consulted only for the title and as a tiebreak when
    /// inference has no signal.
    pub async fn generate_chart(
        &self,
        question: &str,
        requested: Option<ChartKind>,
    ) -> Result<ChartOutcome> {
        let inner = self.inner.lock().await;
        let db = inner.db()?;
        let outcome = self.ask_inner(db, question).await?;

        let suggestion = self.chart_suggestion(question, &outcome.result).await;
        let title = suggestion.title.as_deref().unwrap_or(question);
        let mut chart = infer_chart(&outcome.result, requested, title)?;
        if requested.is_none() && chart.kind == ChartKind::Table {
            if let Some(kind) = suggestion.kind {
                chart.kind = kind;
            }
        }
        let config = chartjs_config(&outcome.result, &chart);
        info!(event = "chart_generated", kind = %chart.kind);
        Ok(ChartOutcome {
            question: outcome.question,
            sql: outcome.sql,
            result: outcome.result,
            chart,
            config,
        })
    }

    /// Best-effort model consultation; any failure falls back to
    /// defaults rather than failing the chart.
    async fn chart_suggestion(&self, question: &str, result: &QueryResult) -> ChartSuggestion {
        let client = match self.client() {
            Ok(client) => client,
            Err(_) => return ChartSuggestion::default(),
        };
        let prompt = chart_prompt(question, result);
        let text = match client.complete_with(&prompt, 0.3, 300).await {
            Ok(text) => text,
            Err(err) => {
                warn!(event = "chart_suggestion_failed", %err);
                return ChartSuggestion::default();
            }
        };
        parse_suggestion(&text)
    }

    /// Explain a query in plain language, grounded in the connected
    /// schema. The input is taken as SQL when it reads as a guarded
    /// statement; anything else is treated as a question and goes
    /// through the generation pipeline first.
    pub async fn explain_query(&self, input: &str) -> Result<ExplainOutcome> {
        let inner = self.inner.lock().await;
        let db = inner.db()?;
        let client = self.client()?;

        let trimmed = input.trim();
        let lowered = trimmed.to_ascii_lowercase();
        let looks_like_sql = (lowered.starts_with("select") || lowered.starts_with("with"))
            && guard_read_only(trimmed).is_ok();
        let sql = if looks_like_sql {
            trimmed.to_string()
        } else {
            let prompt = sql_prompt(&db.schema_text, db.dialect, trimmed);
            let response = client.complete(&prompt).await?;
            extract_and_guard(&response)?
        };

        let prompt = explain_prompt(&db.schema_text, &sql);
        let explanation = client.complete_with(&prompt, 0.3, 500).await?;
        Ok(ExplainOutcome { sql, explanation })
    }

    /// Answer each question, chart what can be charted, and write one
    /// self-contained HTML page. Individual question failures become
    /// warnings; the save fails only when nothing succeeded.
    pub async fn save_dashboard(&self, title: &str, questions: &[String]) -> Result<SaveOutcome> {
        let inner = self.inner.lock().await;
        let db = inner.db()?;

        let mut dashboard = Dashboard::new(title);
        let mut warnings = Vec::new();
        let mut charts = 0usize;
        for question in questions {
            let outcome = match self.ask_inner(db, question).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(event = "dashboard_question_failed", question = %question, %err);
                    warnings.push(format!("{question}: {err}"));
                    continue;
                }
            };
            let chart = match infer_chart(&outcome.result, None, question) {
                Ok(spec) if spec.kind != ChartKind::Table => {
                    charts += 1;
                    Some(spec)
                }
                _ => None,
            };
            dashboard.push(DashboardEntry {
                question: outcome.question,
                sql: outcome.sql,
                result: outcome.result,
                chart,
            });
        }

        let path = dashboard.save(&self.settings.dashboard_dir)?;
        info!(
            event = "dashboard_saved",
            path = %path.display(),
            entries = dashboard.entries.len(),
            charts,
            warnings = warnings.len(),
        );
        Ok(SaveOutcome {
            path,
            entries: dashboard.entries.len(),
            charts,
            warnings,
        })
    }
}

fn parse_suggestion(text: &str) -> ChartSuggestion {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    let parsed: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return ChartSuggestion::default(),
    };
    ChartSuggestion {
        kind: parsed
            .get("chart_type")
            .and_then(Value::as_str)
            .and_then(ChartKind::parse),
        title: parsed
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_chart_suggestion() {
        let suggestion =
            parse_suggestion(r#"{"chart_type": "pie", "title": "Orders by region"}"#);
        assert_eq!(suggestion.kind, Some(ChartKind::Pie));
        assert_eq!(suggestion.title.as_deref(), Some("Orders by region"));
    }

    #[test]
    fn fenced_suggestion_is_unwrapped() {
        let suggestion = parse_suggestion("```json\n{\"chart_type\": \"line\"}\n```");
        assert_eq!(suggestion.kind, Some(ChartKind::Line));
        assert!(suggestion.title.is_none());
    }

    #[test]
    fn garbage_suggestion_falls_back_to_defaults() {
        let suggestion = parse_suggestion("a bar chart would be nice");
        assert!(suggestion.kind.is_none());
        assert!(suggestion.title.is_none());
    }
}
