use std::time::Duration;

use sqlx::mysql::MySqlPoolOptions;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;

use askdb_core::{Dialect, Error, Result};

use crate::adapter::Adapter;
use crate::mysql::MysqlAdapter;
use crate::postgres::PostgresAdapter;
use crate::sqlite::SqliteAdapter;

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Open a pool for the given dialect and wrap it in its adapter.
///
/// For SQLite the connection string may be a bare file path or a
/// `sqlite:` URL; `:memory:` works for tests. Opening a missing SQLite
/// file fails rather than creating it, since this tool never writes.
pub async fn connect(dialect: Dialect, conn: &str) -> Result<Box<dyn Adapter>> {
    match dialect {
        Dialect::Sqlite => {
            let url = sqlite_url(conn);
            let pool = SqlitePoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .acquire_timeout(ACQUIRE_TIMEOUT)
                .connect(&url)
                .await
                .map_err(|err| Error::Connection(format!("sqlite: {err}")))?;
            Ok(Box::new(SqliteAdapter::new(pool)))
        }
        Dialect::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .acquire_timeout(ACQUIRE_TIMEOUT)
                .connect(conn)
                .await
                .map_err(|err| Error::Connection(format!("postgres: {err}")))?;
            Ok(Box::new(PostgresAdapter::new(pool)))
        }
        Dialect::Mysql => {
            let pool = MySqlPoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .acquire_timeout(ACQUIRE_TIMEOUT)
                .connect(conn)
                .await
                .map_err(|err| Error::Connection(format!("mysql: {err}")))?;
            Ok(Box::new(MysqlAdapter::new(pool)))
        }
    }
}

fn sqlite_url(conn: &str) -> String {
    if conn.starts_with("sqlite:") {
        conn.to_string()
    } else if conn == ":memory:" {
        "sqlite::memory:".to_string()
    } else {
        format!("sqlite:{conn}")
    }
}
