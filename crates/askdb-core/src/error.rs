use thiserror::Error;

/// Error taxonomy shared across askdb crates.
///
/// Every failure is terminal for the invocation that raised it; callers
/// surface the kind plus the human-readable cause and never retry on
/// `UnsafeStatement`.
#[derive(Debug, Error)]
pub enum Error {
    /// The database handle could not be opened or has gone away.
    #[error("connection error: {0}")]
    Connection(String),
    /// No catalog query set exists for the requested dialect.
    #[error("unsupported dialect: {0}")]
    UnsupportedDialect(String),
    /// The completion service failed at the transport or HTTP level.
    #[error("upstream completion error: {0}")]
    Upstream(String),
    /// The completion service returned no usable text.
    #[error("completion service returned an empty response")]
    EmptyResponse,
    /// No SQL statement could be located in the model output.
    #[error("no SQL statement found in model response")]
    NoStatementFound,
    /// More than one top-level statement was present in the model output.
    #[error("model response contains multiple SQL statements")]
    MultipleStatements,
    /// The statement is not a read-only SELECT and was rejected for safety.
    #[error("statement rejected for safety: {0}")]
    UnsafeStatement(String),
    /// The backend rejected the statement at execution time.
    #[error("query execution failed: {0}")]
    Execution(String),
    /// The result has no numeric column to bind a chart to.
    #[error("result has no numeric column to chart")]
    NoChartableColumns,
    /// The dashboard has no entries to serialize.
    #[error("dashboard has no entries to serialize")]
    EmptySerialization,
    /// The operation exceeded its deadline.
    #[error("operation timed out: {0}")]
    Timeout(String),
    /// The schema snapshot violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// Catch-all for unexpected failures.
    #[error("other error: {0}")]
    Other(String),
}

impl Error {
    /// Stable machine-readable kind tag, surfaced alongside the message
    /// by both front-ends.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Connection(_) => "connection",
            Error::UnsupportedDialect(_) => "unsupported_dialect",
            Error::Upstream(_) => "upstream",
            Error::EmptyResponse => "empty_response",
            Error::NoStatementFound => "no_statement_found",
            Error::MultipleStatements => "multiple_statements",
            Error::UnsafeStatement(_) => "unsafe_statement",
            Error::Execution(_) => "execution",
            Error::NoChartableColumns => "no_chartable_columns",
            Error::EmptySerialization => "empty_serialization",
            Error::Timeout(_) => "timeout",
            Error::InvalidSchema(_) => "invalid_schema",
            Error::Other(_) => "other",
        }
    }
}

/// Convenience alias for results returned by askdb crates.
pub type Result<T> = std::result::Result<T, Error>;
