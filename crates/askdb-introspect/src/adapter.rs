use async_trait::async_trait;

use askdb_core::{Dialect, QueryResult, Result, SchemaDescription};

use crate::options::IntrospectOptions;

/// Trait implemented by per-dialect adapters.
///
/// `introspect` is idempotent and side-effect-free on the target
/// database; `execute` assumes the statement already passed the
/// read-only guard and enforces the row cap.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// The dialect this adapter speaks.
    fn dialect(&self) -> Dialect;

    /// Introspect the database and return a full schema snapshot.
    async fn introspect(&self, opts: &IntrospectOptions) -> Result<SchemaDescription>;

    /// Execute a guarded statement, returning at most `max_rows` rows
    /// and flagging truncation when more existed.
    async fn execute(&self, sql: &str, max_rows: usize) -> Result<QueryResult>;
}
