//! Database introspection and execution adapters.
//!
//! One adapter per supported dialect, each over its matching sqlx pool.
//! Adapters own both the catalog queries that build a
//! [`askdb_core::SchemaDescription`] and the capped, read-only query
//! executor. The read-only guard itself lives in `askdb-nl`; adapters
//! only ever receive statements that already passed it.

pub mod adapter;
pub mod connect;
pub mod mysql;
pub mod options;
pub mod postgres;
pub mod sqlite;

pub use adapter::Adapter;
pub use connect::connect;
pub use mysql::MysqlAdapter;
pub use options::IntrospectOptions;
pub use postgres::PostgresAdapter;
pub use sqlite::SqliteAdapter;

pub use askdb_core::SchemaDescription;
