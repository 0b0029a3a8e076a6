//! Newline-delimited JSON-RPC 2.0 loop over stdin/stdout.
//!
//! Exposes the five session operations as tools under the usual
//! `initialize` / `tools/list` / `tools/call` trio. One request per
//! line in, one response per line out; notifications get no reply.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use askdb_chart::ChartKind;
use askdb_core::{Error, Result};

use crate::session::Session;

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "askdb";

#[derive(Debug, Deserialize)]
struct Request {
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Serve requests from stdin until it closes.
pub async fn serve_stdio(session: Arc<Session>) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    info!(event = "rpc_started");
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|err| Error::Other(format!("reading stdin: {err}")))?
    {
        if line.trim().is_empty() {
            continue;
        }
        let Some(response) = handle_line(&session, &line).await else {
            continue;
        };
        let mut bytes = serde_json::to_vec(&response)
            .map_err(|err| Error::Other(format!("serializing response: {err}")))?;
        bytes.push(b'\n');
        stdout
            .write_all(&bytes)
            .await
            .map_err(|err| Error::Other(format!("writing stdout: {err}")))?;
        stdout
            .flush()
            .await
            .map_err(|err| Error::Other(format!("flushing stdout: {err}")))?;
    }
    info!(event = "rpc_finished");
    Ok(())
}

async fn handle_line(session: &Session, line: &str) -> Option<Value> {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            warn!(event = "rpc_parse_error", %err);
            return Some(error_response(Value::Null, -32700, "parse error", None));
        }
    };
    let id = request.id.clone()?;

    let outcome = dispatch(session, &request).await;
    Some(match outcome {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err(err) => {
            warn!(event = "rpc_call_failed", method = %request.method, kind = err.kind(), %err);
            error_response(id, error_code(&err), &err.to_string(), Some(err.kind()))
        }
    })
}

async fn dispatch(session: &Session, request: &Request) -> Result<Value> {
    match request.method.as_str() {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
        })),
        "tools/list" => Ok(json!({ "tools": tool_descriptors() })),
        "tools/call" => {
            let call: ToolCall = serde_json::from_value(request.params.clone())
                .map_err(|err| Error::Other(format!("invalid params: {err}")))?;
            call_tool(session, &call).await
        }
        "ping" => Ok(json!({})),
        other => Err(Error::Other(format!("unknown method: {other}"))),
    }
}

async fn call_tool(session: &Session, call: &ToolCall) -> Result<Value> {
    let args = &call.arguments;
    let payload = match call.name.as_str() {
        "connect_db" => {
            let connection = required_str(args, "connection")?;
            let dialect = args.get("dialect").and_then(Value::as_str);
            let summary = session.connect_db(connection, dialect).await?;
            serde_json::to_value(summary)
        }
        "ask_question" => {
            let question = required_str(args, "question")?;
            let outcome = session.ask_question(question).await?;
            serde_json::to_value(outcome)
        }
        "generate_chart" => {
            let question = required_str(args, "question")?;
            let requested = args
                .get("chart_type")
                .and_then(Value::as_str)
                .and_then(ChartKind::parse);
            let outcome = session.generate_chart(question, requested).await?;
            serde_json::to_value(outcome)
        }
        "explain_query" => {
            let input = args
                .get("sql")
                .or_else(|| args.get("question"))
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Other("missing required argument: sql".into()))?;
            let outcome = session.explain_query(input).await?;
            serde_json::to_value(outcome)
        }
        "save_dashboard" => {
            let title = required_str(args, "title")?;
            let questions: Vec<String> = args
                .get("questions")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let outcome = session.save_dashboard(title, &questions).await?;
            serde_json::to_value(outcome)
        }
        other => return Err(Error::Other(format!("unknown tool: {other}"))),
    }
    .map_err(|err| Error::Other(format!("serializing result: {err}")))?;

    // Tool hosts expect content blocks; ship the structured payload as
    // JSON text plus a machine-readable copy.
    Ok(json!({
        "content": [{ "type": "text", "text": payload.to_string() }],
        "structuredContent": payload,
        "isError": false,
    }))
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Other(format!("missing required argument: {key}")))
}

fn error_code(err: &Error) -> i64 {
    match err {
        Error::Other(message) if message.starts_with("unknown method") => -32601,
        Error::Other(message)
            if message.starts_with("invalid params")
                || message.starts_with("missing required argument") =>
        {
            -32602
        }
        _ => -32000,
    }
}

fn error_response(id: Value, code: i64, message: &str, kind: Option<&str>) -> Value {
    let mut error = json!({ "code": code, "message": message });
    if let Some(kind) = kind {
        error["data"] = json!({ "kind": kind });
    }
    json!({ "jsonrpc": "2.0", "id": id, "error": error })
}

fn tool_descriptors() -> Value {
    json!([
        {
            "name": "connect_db",
            "description": "Connect to a SQLite, PostgreSQL, or MySQL database and \
                            introspect its schema. Replaces any existing connection.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "connection": {
                        "type": "string",
                        "description": "Connection string or SQLite file path",
                    },
                    "dialect": {
                        "type": "string",
                        "enum": ["sqlite", "postgres", "mysql"],
                        "description": "Optional; inferred from the connection string when omitted",
                    },
                },
                "required": ["connection"],
            },
        },
        {
            "name": "ask_question",
            "description": "Answer a natural-language question about the connected database \
                            by generating and running a single read-only SQL query.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "question": { "type": "string" },
                },
                "required": ["question"],
            },
        },
        {
            "name": "generate_chart",
            "description": "Answer a question and build a Chart.js configuration for the result.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "question": { "type": "string" },
                    "chart_type": {
                        "type": "string",
                        "enum": ["bar", "horizontal_bar", "line", "pie", "doughnut", "scatter"],
                        "description": "Optional; inferred from the result when omitted",
                    },
                },
                "required": ["question"],
            },
        },
        {
            "name": "explain_query",
            "description": "Explain a SQL query in plain language, using the connected schema. \
                            Accepts either SQL or a natural-language question.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "sql": { "type": "string" },
                    "question": { "type": "string" },
                },
            },
        },
        {
            "name": "save_dashboard",
            "description": "Answer a list of questions and save the results and charts \
                            as a standalone HTML dashboard.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "questions": {
                        "type": "array",
                        "items": { "type": "string" },
                    },
                },
                "required": ["title", "questions"],
            },
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionSettings;

    fn session() -> Session {
        Session::new(SessionSettings::default(), None)
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let response = handle_line(
            &session(),
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
        )
        .await
        .unwrap();
        assert_eq!(response["result"]["serverInfo"]["name"], "askdb");
    }

    #[tokio::test]
    async fn tools_list_names_all_five_tools() {
        let response = handle_line(&session(), r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
            .await
            .unwrap();
        let names: Vec<&str> = response["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|tool| tool["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            ["connect_db", "ask_question", "generate_chart", "explain_query", "save_dashboard"]
        );
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let response = handle_line(
            &session(),
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        )
        .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn unknown_method_maps_to_method_not_found() {
        let response = handle_line(&session(), r#"{"jsonrpc":"2.0","id":3,"method":"nope"}"#)
            .await
            .unwrap();
        assert_eq!(response["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn tool_call_without_connection_fails_with_kind() {
        let response = handle_line(
            &session(),
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"ask_question","arguments":{"question":"how many?"}}}"#,
        )
        .await
        .unwrap();
        assert_eq!(response["error"]["data"]["kind"], "connection");
    }

    #[tokio::test]
    async fn parse_error_is_reported() {
        let response = handle_line(&session(), "{nope").await.unwrap();
        assert_eq!(response["error"]["code"], -32700);
    }
}
