use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use askdb_core::{redact_connection_string, Dialect, Error, Result, SchemaDescription};
use askdb_introspect::{connect, Adapter, IntrospectOptions};
use askdb_nl::{render_schema, CompletionClient};

/// Runtime knobs shared by both front-ends.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub max_rows: usize,
    pub sample_rows: usize,
    pub dashboard_dir: PathBuf,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            max_rows: 1000,
            sample_rows: 5,
            dashboard_dir: PathBuf::from("dashboards"),
        }
    }
}

/// Summary returned by `connect_db`, safe to show and to log.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectSummary {
    pub dialect: Dialect,
    pub database: Option<String>,
    pub tables: Vec<String>,
    pub total_rows: i64,
    pub connection: String,
}

pub(crate) struct ConnectedDb {
    pub dialect: Dialect,
    pub adapter: Box<dyn Adapter>,
    pub schema: SchemaDescription,
    pub schema_text: String,
}

pub(crate) struct SessionInner {
    pub db: Option<ConnectedDb>,
}

/// One conversation's worth of state: at most one connected database
/// plus the optional completion client. The inner mutex is held for
/// the whole of each tool invocation so concurrent calls from the web
/// front-end serialize instead of interleaving on one adapter.
pub struct Session {
    pub(crate) settings: SessionSettings,
    pub(crate) client: Option<CompletionClient>,
    pub(crate) inner: Mutex<SessionInner>,
}

impl Session {
    pub fn new(settings: SessionSettings, client: Option<CompletionClient>) -> Self {
        Session {
            settings,
            client,
            inner: Mutex::new(SessionInner { db: None }),
        }
    }

    pub(crate) fn client(&self) -> Result<&CompletionClient> {
        self.client.as_ref().ok_or_else(|| {
            Error::Other(
                "no completion client configured; set OPENAI_API_KEY to enable \
                 language model features"
                    .into(),
            )
        })
    }

    /// Open a database, introspect it, and make it the session's
    /// active connection, replacing any previous one. The dialect is
    /// inferred from the connection string when not given explicitly.
    pub async fn connect_db(
        &self,
        connection: &str,
        dialect: Option<&str>,
    ) -> Result<ConnectSummary> {
        let dialect = match dialect {
            Some(tag) => Dialect::parse(tag)?,
            None => Dialect::from_connection_string(connection)
                .ok_or_else(|| Error::UnsupportedDialect(connection.to_string()))?,
        };
        let redacted = redact_connection_string(connection);

        let adapter = connect(dialect, connection).await?;
        let options = IntrospectOptions {
            sample_rows: self.settings.sample_rows,
            count_rows: true,
        };
        let schema = adapter.introspect(&options).await?;
        let schema_text = render_schema(&schema);

        info!(
            event = "database_connected",
            dialect = %dialect,
            connection = %redacted.redacted,
            tables = schema.tables.len(),
        );

        let summary = ConnectSummary {
            dialect,
            database: schema.database.clone(),
            tables: schema.tables.iter().map(|t| t.name.clone()).collect(),
            total_rows: schema.total_rows(),
            connection: redacted.redacted,
        };

        let mut inner = self.inner.lock().await;
        inner.db = Some(ConnectedDb {
            dialect,
            adapter,
            schema,
            schema_text,
        });
        Ok(summary)
    }

    /// Snapshot of the active connection's schema, if any.
    pub async fn schema(&self) -> Result<SchemaDescription> {
        let inner = self.inner.lock().await;
        match &inner.db {
            Some(db) => Ok(db.schema.clone()),
            None => Err(Error::Connection("no database connected".into())),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.db.is_some()
    }
}

impl SessionInner {
    pub fn db(&self) -> Result<&ConnectedDb> {
        self.db
            .as_ref()
            .ok_or_else(|| Error::Connection("no database connected".into()))
    }
}
