use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::value::ScalarValue;

/// Normalized snapshot of a connected database, rebuilt in full on every
/// connect. Tables are sorted by name and names are unique (see
/// [`crate::validation::validate_schema`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDescription {
    pub dialect: Dialect,
    /// Database name when the backend reports one.
    pub database: Option<String>,
    pub tables: Vec<TableDescription>,
}

impl SchemaDescription {
    /// Total row-count estimate across all tables.
    pub fn total_rows(&self) -> i64 {
        self.tables.iter().map(|table| table.row_count).sum()
    }
}

/// One table: columns in physical order plus key metadata, a row-count
/// estimate, and a small bounded set of sample rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescription {
    pub name: String,
    pub columns: Vec<ColumnDescription>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyRef>,
    pub row_count: i64,
    pub sample_rows: Vec<Vec<ScalarValue>>,
}

/// Column metadata with the declared type kept verbatim alongside its
/// dialect-neutral tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescription {
    pub name: String,
    pub declared_type: String,
    pub column_type: ColumnType,
    pub is_nullable: bool,
}

/// An outgoing foreign-key relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

/// Dialect-neutral column type tag, normalized from the declared type
/// string each backend reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    Decimal,
    Text,
    Boolean,
    Date,
    Time,
    Timestamp,
    Binary,
    Json,
    Uuid,
    Other(String),
}

impl ColumnType {
    /// Normalize a declared type string (e.g. `VARCHAR(255)`, `int8`,
    /// `timestamp with time zone`) to its neutral tag.
    pub fn from_declared(declared: &str) -> Self {
        let base = declared
            .split(|c| c == '(' || c == '<')
            .next()
            .unwrap_or(declared)
            .trim()
            .to_ascii_lowercase();

        match base.as_str() {
            "int" | "integer" | "int2" | "int4" | "int8" | "smallint" | "bigint" | "tinyint"
            | "mediumint" | "serial" | "bigserial" | "smallserial" | "year" => ColumnType::Integer,
            "real" | "float" | "float4" | "float8" | "double" | "double precision" => {
                ColumnType::Float
            }
            "numeric" | "decimal" | "money" => ColumnType::Decimal,
            "text" | "varchar" | "char" | "bpchar" | "character" | "character varying"
            | "tinytext" | "mediumtext" | "longtext" | "name" | "citext" | "enum" | "set"
            | "clob" | "string" | "nvarchar" | "nchar" => ColumnType::Text,
            "bool" | "boolean" => ColumnType::Boolean,
            "date" => ColumnType::Date,
            "time" | "timetz" | "time with time zone" | "time without time zone" => {
                ColumnType::Time
            }
            "timestamp" | "timestamptz" | "datetime" | "timestamp with time zone"
            | "timestamp without time zone" => ColumnType::Timestamp,
            "blob" | "bytea" | "binary" | "varbinary" | "tinyblob" | "mediumblob" | "longblob"
            | "bit" => ColumnType::Binary,
            "json" | "jsonb" => ColumnType::Json,
            "uuid" => ColumnType::Uuid,
            _ => {
                // SQLite accepts arbitrary declared types; fall back to
                // affinity-style substring rules before giving up.
                if base.contains("int") {
                    ColumnType::Integer
                } else if base.contains("char") || base.contains("text") {
                    ColumnType::Text
                } else if base.contains("real") || base.contains("floa") || base.contains("doub") {
                    ColumnType::Float
                } else {
                    ColumnType::Other(base)
                }
            }
        }
    }

    /// Whether values of this type are plotted on a value axis.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnType::Integer | ColumnType::Float | ColumnType::Decimal
        )
    }

    /// Whether values of this type order a time axis.
    pub fn is_time_like(&self) -> bool {
        matches!(
            self,
            ColumnType::Date | ColumnType::Time | ColumnType::Timestamp
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_common_declared_types() {
        assert_eq!(ColumnType::from_declared("VARCHAR(255)"), ColumnType::Text);
        assert_eq!(ColumnType::from_declared("int8"), ColumnType::Integer);
        assert_eq!(
            ColumnType::from_declared("timestamp with time zone"),
            ColumnType::Timestamp
        );
        assert_eq!(ColumnType::from_declared("NUMERIC(10,2)"), ColumnType::Decimal);
        assert_eq!(ColumnType::from_declared("bytea"), ColumnType::Binary);
    }

    #[test]
    fn sqlite_affinity_fallback() {
        assert_eq!(
            ColumnType::from_declared("UNSIGNED BIG INT"),
            ColumnType::Integer
        );
        assert_eq!(
            ColumnType::from_declared("NATIVE CHARACTER(70)"),
            ColumnType::Text
        );
        assert_eq!(
            ColumnType::from_declared("geometry"),
            ColumnType::Other("geometry".to_string())
        );
    }

    #[test]
    fn total_rows_sums_tables() {
        let schema = SchemaDescription {
            dialect: Dialect::Sqlite,
            database: None,
            tables: vec![
                TableDescription {
                    name: "a".into(),
                    columns: vec![],
                    primary_key: vec![],
                    foreign_keys: vec![],
                    row_count: 3,
                    sample_rows: vec![],
                },
                TableDescription {
                    name: "b".into(),
                    columns: vec![],
                    primary_key: vec![],
                    foreign_keys: vec![],
                    row_count: 7,
                    sample_rows: vec![],
                },
            ],
        };
        assert_eq!(schema.total_rows(), 10);
    }
}
