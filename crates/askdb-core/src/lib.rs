//! Core contracts and helpers for askdb.
//!
//! This crate defines the shared dialect tag, schema description types,
//! query result types, the error taxonomy, and utilities used by the
//! introspection adapters, the NL engine, and the front-ends.

pub mod dialect;
pub mod error;
pub mod redaction;
pub mod schema;
pub mod validation;
pub mod value;

pub use dialect::Dialect;
pub use error::{Error, Result};
pub use redaction::{redact_connection_string, RedactedConnection};
pub use schema::{ColumnDescription, ColumnType, ForeignKeyRef, SchemaDescription, TableDescription};
pub use validation::validate_schema;
pub use value::{QueryResult, ScalarValue};
