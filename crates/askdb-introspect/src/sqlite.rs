use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Column, Executor, Row, Statement, TypeInfo};

use askdb_core::{
    ColumnDescription, ColumnType, Dialect, Error, ForeignKeyRef, QueryResult, Result,
    ScalarValue, SchemaDescription, TableDescription,
};

use crate::adapter::Adapter;
use crate::options::IntrospectOptions;

/// Adapter for SQLite databases.
#[derive(Debug, Clone)]
pub struct SqliteAdapter {
    pool: SqlitePool,
}

impl SqliteAdapter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Adapter for SqliteAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn introspect(&self, opts: &IntrospectOptions) -> Result<SchemaDescription> {
        introspect(&self.pool, opts).await
    }

    async fn execute(&self, sql: &str, max_rows: usize) -> Result<QueryResult> {
        let statement = self.pool.prepare(sql).await.map_err(exec_err)?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();

        let mut rows = Vec::new();
        let mut truncated = false;
        let mut stream = statement.query().fetch(&self.pool);
        while let Some(row) = stream.try_next().await.map_err(exec_err)? {
            if rows.len() == max_rows {
                truncated = true;
                break;
            }
            rows.push(decode_row(&row));
        }

        Ok(QueryResult {
            columns,
            rows,
            truncated,
        })
    }
}

async fn introspect(pool: &SqlitePool, opts: &IntrospectOptions) -> Result<SchemaDescription> {
    let names: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .map_err(conn_err)?;

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        tables.push(introspect_table(pool, &name, opts).await?);
    }

    Ok(SchemaDescription {
        dialect: Dialect::Sqlite,
        database: None,
        tables,
    })
}

async fn introspect_table(
    pool: &SqlitePool,
    name: &str,
    opts: &IntrospectOptions,
) -> Result<TableDescription> {
    // pragma table-valued functions are bindable, so column and key
    // metadata never interpolates the table name.
    let raw_columns: Vec<(String, String, i64, i64)> = sqlx::query_as(
        "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?)",
    )
    .bind(name)
    .fetch_all(pool)
    .await
    .map_err(conn_err)?;

    let mut primary_key: Vec<(i64, String)> = Vec::new();
    let columns = raw_columns
        .into_iter()
        .map(|(col_name, declared, notnull, pk)| {
            if pk > 0 {
                primary_key.push((pk, col_name.clone()));
            }
            ColumnDescription {
                column_type: ColumnType::from_declared(&declared),
                name: col_name,
                declared_type: declared,
                is_nullable: notnull == 0,
            }
        })
        .collect();
    primary_key.sort_by_key(|(pos, _)| *pos);

    let raw_fks: Vec<(String, String, Option<String>)> = sqlx::query_as(
        "SELECT \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?)",
    )
    .bind(name)
    .fetch_all(pool)
    .await
    .map_err(conn_err)?;
    let foreign_keys = raw_fks
        .into_iter()
        .map(|(referenced_table, column, to)| ForeignKeyRef {
            column,
            referenced_table,
            // NULL means the FK references the target's primary key.
            referenced_column: to.unwrap_or_else(|| "id".to_string()),
        })
        .collect();

    let quoted = Dialect::Sqlite.quote_ident(name);

    let row_count = if opts.count_rows {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {quoted}"))
            .fetch_one(pool)
            .await
            .map_err(conn_err)?
    } else {
        0
    };

    let sample_rows = if opts.sample_rows > 0 {
        sqlx::query(&format!(
            "SELECT * FROM {quoted} LIMIT {}",
            opts.sample_rows
        ))
        .fetch_all(pool)
        .await
        .map_err(conn_err)?
        .iter()
        .map(decode_row)
        .collect()
    } else {
        Vec::new()
    };

    Ok(TableDescription {
        name: name.to_string(),
        columns,
        primary_key: primary_key.into_iter().map(|(_, col)| col).collect(),
        foreign_keys,
        row_count,
        sample_rows,
    })
}

fn decode_row(row: &SqliteRow) -> Vec<ScalarValue> {
    (0..row.len()).map(|idx| decode_value(row, idx)).collect()
}

fn decode_value(row: &SqliteRow, idx: usize) -> ScalarValue {
    let decoded = match row.columns()[idx].type_info().name() {
        "BOOLEAN" => cell(row, idx, ScalarValue::Bool),
        "INTEGER" => cell(row, idx, ScalarValue::Int),
        "REAL" => cell(row, idx, ScalarValue::Float),
        "BLOB" => cell(row, idx, |bytes: Vec<u8>| {
            ScalarValue::Text(String::from_utf8_lossy(&bytes).into_owned())
        }),
        _ => None,
    };

    // Declared types are advisory in SQLite; fall through the storage
    // classes until one decodes.
    decoded
        .or_else(|| cell(row, idx, ScalarValue::Text))
        .or_else(|| cell(row, idx, ScalarValue::Int))
        .or_else(|| cell(row, idx, ScalarValue::Float))
        .unwrap_or(ScalarValue::Null)
}

fn cell<T>(
    row: &SqliteRow,
    idx: usize,
    map: impl FnOnce(T) -> ScalarValue,
) -> Option<ScalarValue>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    match row.try_get::<Option<T>, _>(idx) {
        Ok(Some(value)) => Some(map(value)),
        Ok(None) => Some(ScalarValue::Null),
        Err(_) => None,
    }
}

fn conn_err(err: sqlx::Error) -> Error {
    Error::Connection(err.to_string())
}

fn exec_err(err: sqlx::Error) -> Error {
    Error::Execution(err.to_string())
}
