//! Web chat front-end: a single embedded page plus a small JSON API.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tracing::info;

use askdb_core::{Error, SchemaDescription};

use crate::session::{ConnectSummary, Session};
use crate::tools::AskOutcome;

const CHAT_PAGE: &str = include_str!("../assets/chat.html");

/// Build the router; the caller picks the listener.
pub fn router(session: Arc<Session>) -> Router {
    Router::new()
        .route("/", get(chat_page))
        .route("/api/schema", get(get_schema))
        .route("/api/connect", post(post_connect))
        .route("/api/ask", post(post_ask))
        .route("/api/explain", post(post_explain))
        .layer(CorsLayer::permissive())
        .with_state(session)
}

/// Bind and serve until the process is stopped.
pub async fn serve(session: Arc<Session>, bind: &str) -> askdb_core::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|err| Error::Other(format!("binding {bind}: {err}")))?;
    info!(event = "web_started", bind = %bind);
    axum::serve(listener, router(session))
        .await
        .map_err(|err| Error::Other(format!("serving: {err}")))
}

struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Connection(_) | Error::UnsupportedDialect(_) => StatusCode::BAD_REQUEST,
            Error::NoStatementFound
            | Error::MultipleStatements
            | Error::UnsafeStatement(_)
            | Error::Execution(_)
            | Error::NoChartableColumns
            | Error::EmptySerialization => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Upstream(_) | Error::EmptyResponse => StatusCode::BAD_GATEWAY,
            Error::InvalidSchema(_) | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({
            "error_kind": self.0.kind(),
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

async fn chat_page() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

async fn get_schema(
    State(session): State<Arc<Session>>,
) -> Result<Json<SchemaDescription>, ApiError> {
    Ok(Json(session.schema().await?))
}

#[derive(Debug, Deserialize)]
struct ConnectRequest {
    connection: String,
    dialect: Option<String>,
}

async fn post_connect(
    State(session): State<Arc<Session>>,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<ConnectSummary>, ApiError> {
    let summary = session
        .connect_db(&request.connection, request.dialect.as_deref())
        .await?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    message: String,
    chart_type: Option<String>,
}

/// Chat reply: either an answered question with an optional chart, or
/// a plain-text explanation for `/explain` messages.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum AskResponse {
    Answer {
        #[serde(flatten)]
        outcome: AskOutcome,
        chart: Option<Value>,
    },
    Explanation {
        sql: String,
        text: String,
    },
}

async fn post_ask(
    State(session): State<Arc<Session>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let message = request.message.trim();

    // `/explain SELECT ...` goes to the explainer instead of the pipeline.
    if let Some(input) = message.strip_prefix("/explain ") {
        let outcome = session.explain_query(input.trim()).await?;
        return Ok(Json(AskResponse::Explanation {
            sql: outcome.sql,
            text: outcome.explanation,
        }));
    }

    let requested = request
        .chart_type
        .as_deref()
        .and_then(askdb_chart::ChartKind::parse);
    let outcome = session.ask_question(message).await?;

    // Chart inference is best-effort here; unchartable results are
    // still answered as a table.
    let chart = askdb_chart::infer_chart(&outcome.result, requested, message)
        .ok()
        .filter(|spec| spec.kind != askdb_chart::ChartKind::Table)
        .map(|spec| askdb_chart::chartjs_config(&outcome.result, &spec));
    Ok(Json(AskResponse::Answer { outcome, chart }))
}

#[derive(Debug, Deserialize)]
struct ExplainRequest {
    sql: String,
}

async fn post_explain(
    State(session): State<Arc<Session>>,
    Json(request): Json<ExplainRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let outcome = session.explain_query(&request.sql).await?;
    Ok(Json(AskResponse::Explanation {
        sql: outcome.sql,
        text: outcome.explanation,
    }))
}
