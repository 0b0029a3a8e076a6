mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use askdb_core::{validate_schema, Dialect, Error as CoreError};
use askdb_introspect::{connect, IntrospectOptions};
use askdb_nl::{CompletionClient, CompletionConfig};
use askdb_server::{rpc, web, Session, SessionSettings};
use config::FileConfig;

#[derive(Debug, Error)]
enum CliError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "askdb", version, about = "Ask questions of a database in plain language")]
struct Cli {
    /// Path to a config file (default: ./askdb.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web chat front-end.
    Serve(ServeArgs),
    /// Speak newline-delimited JSON-RPC tools over stdin/stdout.
    Tools(SessionArgs),
    /// Introspect a database and print its schema as JSON.
    Introspect(IntrospectArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long)]
    bind: Option<String>,
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// Connection string to open at startup.
    #[arg(long)]
    conn: Option<String>,
    /// Dialect of --conn; inferred from the string when omitted.
    #[arg(long)]
    dialect: Option<String>,
    /// Cap on rows returned per query.
    #[arg(long)]
    max_rows: Option<usize>,
    /// Sample rows captured per table during introspection.
    #[arg(long)]
    sample_rows: Option<usize>,
    /// Directory for saved dashboards.
    #[arg(long)]
    dashboard_dir: Option<PathBuf>,
    /// Completion model name.
    #[arg(long)]
    model: Option<String>,
    /// Completion API base URL.
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Args, Debug)]
struct IntrospectArgs {
    /// Database connection string (flag form).
    #[arg(long, value_name = "CONNECTION_STRING", conflicts_with = "conn_pos")]
    conn: Option<String>,
    /// Database connection string (positional form).
    #[arg(value_name = "CONNECTION_STRING", required_unless_present = "conn")]
    conn_pos: Option<String>,
    /// Dialect; inferred from the connection string when omitted.
    #[arg(long)]
    dialect: Option<String>,
    /// Sample rows captured per table.
    #[arg(long)]
    sample_rows: Option<usize>,
    /// Optional output path instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenv::dotenv().ok();
    // Logs go to stderr: in tools mode stdout carries the protocol.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let file = FileConfig::load(cli.config.as_deref()).map_err(CliError::InvalidConfig)?;

    match cli.command {
        Command::Serve(args) => {
            let bind = args
                .bind
                .or_else(|| file.bind.clone())
                .unwrap_or_else(|| "127.0.0.1:8080".to_string());
            let session = build_session(args.session, &file).await?;
            web::serve(session, &bind).await?;
            Ok(())
        }
        Command::Tools(args) => {
            let session = build_session(args, &file).await?;
            rpc::serve_stdio(session).await?;
            Ok(())
        }
        Command::Introspect(args) => run_introspect(args, &file).await,
    }
}

/// Flags win over the config file, which wins over defaults.
async fn build_session(args: SessionArgs, file: &FileConfig) -> Result<Arc<Session>, CliError> {
    let defaults = SessionSettings::default();
    let settings = SessionSettings {
        max_rows: args.max_rows.or(file.max_rows).unwrap_or(defaults.max_rows),
        sample_rows: args
            .sample_rows
            .or(file.sample_rows)
            .unwrap_or(defaults.sample_rows),
        dashboard_dir: args
            .dashboard_dir
            .clone()
            .or_else(|| file.dashboard_dir.clone())
            .unwrap_or(defaults.dashboard_dir),
    };
    if settings.max_rows == 0 {
        return Err(CliError::InvalidConfig("max_rows must be positive".into()));
    }

    let client = completion_client(&args, file)?;
    if client.is_none() {
        tracing::warn!(
            event = "no_completion_client",
            "OPENAI_API_KEY not set; question answering is disabled"
        );
    }
    let session = Arc::new(Session::new(settings, client));

    let conn = args.conn.or_else(|| file.connection.clone());
    if let Some(conn) = conn {
        let dialect = args.dialect.as_deref().or(file.dialect.as_deref());
        let summary = session.connect_db(&conn, dialect).await?;
        tracing::info!(
            event = "startup_connect",
            dialect = %summary.dialect,
            tables = summary.tables.len(),
        );
    }
    Ok(session)
}

fn completion_client(
    args: &SessionArgs,
    file: &FileConfig,
) -> Result<Option<CompletionClient>, CliError> {
    let Some(mut config) = CompletionConfig::from_env() else {
        return Ok(None);
    };
    if let Some(model) = args.model.clone().or_else(|| file.model.clone()) {
        config.model = model;
    }
    if let Some(base_url) = args.base_url.clone().or_else(|| file.base_url.clone()) {
        config.base_url = base_url;
    }
    Ok(Some(CompletionClient::new(config)?))
}

async fn run_introspect(args: IntrospectArgs, file: &FileConfig) -> Result<(), CliError> {
    let conn = match (args.conn, args.conn_pos) {
        (Some(value), None) | (None, Some(value)) => value,
        (Some(_), Some(_)) => {
            return Err(CliError::InvalidConfig(
                "use either --conn or the positional connection string".into(),
            ))
        }
        (None, None) => match file.connection.clone() {
            Some(value) => value,
            None => {
                return Err(CliError::InvalidConfig("connection string is required".into()))
            }
        },
    };

    let dialect = match args.dialect.as_deref().or(file.dialect.as_deref()) {
        Some(tag) => Dialect::parse(tag)?,
        None => Dialect::from_connection_string(&conn)
            .ok_or_else(|| CoreError::UnsupportedDialect(conn.clone()))?,
    };

    let options = IntrospectOptions {
        sample_rows: args
            .sample_rows
            .or(file.sample_rows)
            .unwrap_or_else(|| SessionSettings::default().sample_rows),
        count_rows: true,
    };

    let adapter = connect(dialect, &conn).await?;
    let schema = adapter.introspect(&options).await?;
    validate_schema(&schema)?;

    let json = serde_json::to_string_pretty(&schema)?;
    match args.out {
        Some(path) => std::fs::write(&path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}
