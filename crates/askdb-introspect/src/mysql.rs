use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures::TryStreamExt;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::{Column, Executor, Row, Statement, TypeInfo};

use askdb_core::{
    ColumnDescription, ColumnType, Dialect, Error, ForeignKeyRef, QueryResult, Result,
    ScalarValue, SchemaDescription, TableDescription,
};

use crate::adapter::Adapter;
use crate::options::IntrospectOptions;

/// Adapter for MySQL/MariaDB databases. Introspection covers base tables
/// in the connected database (`DATABASE()`).
#[derive(Debug, Clone)]
pub struct MysqlAdapter {
    pool: MySqlPool,
}

impl MysqlAdapter {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Adapter for MysqlAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
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

async fn introspect(pool: &MySqlPool, opts: &IntrospectOptions) -> Result<SchemaDescription> {
    // NULL when the connection URI names no default schema.
    let database: Option<String> = sqlx::query_scalar("SELECT DATABASE()")
        .fetch_one(pool)
        .await
        .map_err(conn_err)?;

    let names: Vec<String> = sqlx::query_scalar(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' \
         ORDER BY table_name",
    )
    .fetch_all(pool)
    .await
    .map_err(conn_err)?;

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        tables.push(introspect_table(pool, &name, opts).await?);
    }

    Ok(SchemaDescription {
        dialect: Dialect::Mysql,
        database,
        tables,
    })
}

async fn introspect_table(
    pool: &MySqlPool,
    name: &str,
    opts: &IntrospectOptions,
) -> Result<TableDescription> {
    let raw_columns: Vec<(String, String, String, String)> = sqlx::query_as(
        "SELECT column_name, column_type, is_nullable, column_key \
         FROM information_schema.columns \
         WHERE table_schema = DATABASE() AND table_name = ? \
         ORDER BY ordinal_position",
    )
    .bind(name)
    .fetch_all(pool)
    .await
    .map_err(conn_err)?;

    let mut primary_key = Vec::new();
    let columns = raw_columns
        .into_iter()
        .map(|(col_name, declared, nullable, key)| {
            if key == "PRI" {
                primary_key.push(col_name.clone());
            }
            ColumnDescription {
                column_type: ColumnType::from_declared(&declared),
                name: col_name,
                declared_type: declared,
                is_nullable: nullable == "YES",
            }
        })
        .collect();

    let raw_fks: Vec<(String, String, String)> = sqlx::query_as(
        "SELECT column_name, referenced_table_name, referenced_column_name \
         FROM information_schema.key_column_usage \
         WHERE table_schema = DATABASE() AND table_name = ? \
           AND referenced_table_name IS NOT NULL",
    )
    .bind(name)
    .fetch_all(pool)
    .await
    .map_err(conn_err)?;
    let foreign_keys = raw_fks
        .into_iter()
        .map(|(column, referenced_table, referenced_column)| ForeignKeyRef {
            column,
            referenced_table,
            referenced_column,
        })
        .collect();

    let quoted = Dialect::Mysql.quote_ident(name);

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
        primary_key,
        foreign_keys,
        row_count,
        sample_rows,
    })
}

fn decode_row(row: &MySqlRow) -> Vec<ScalarValue> {
    (0..row.len()).map(|idx| decode_value(row, idx)).collect()
}

fn decode_value(row: &MySqlRow, idx: usize) -> ScalarValue {
    let decoded = match row.columns()[idx].type_info().name() {
        "BOOLEAN" => cell(row, idx, ScalarValue::Bool),
        "DECIMAL" => cell(row, idx, |v: Decimal| {
            v.to_f64().map(ScalarValue::Float).unwrap_or(ScalarValue::Null)
        }),
        "DATE" => cell(row, idx, |v: NaiveDate| ScalarValue::Text(v.to_string())),
        "TIME" => cell(row, idx, |v: NaiveTime| ScalarValue::Text(v.to_string())),
        "DATETIME" => cell(row, idx, |v: NaiveDateTime| {
            ScalarValue::Text(v.to_string())
        }),
        "TIMESTAMP" => cell(row, idx, |v: DateTime<Utc>| {
            ScalarValue::Text(v.to_rfc3339())
        }),
        "JSON" => cell(row, idx, |v: serde_json::Value| {
            ScalarValue::Text(v.to_string())
        }),
        _ => None,
    };

    // MySQL integer decoding is width-tolerant, so one i64 attempt
    // covers the signed int family; unsigned BIGINT needs u64.
    decoded
        .or_else(|| cell(row, idx, ScalarValue::Int))
        .or_else(|| cell(row, idx, |v: u64| ScalarValue::Int(v as i64)))
        .or_else(|| cell(row, idx, ScalarValue::Float))
        .or_else(|| cell(row, idx, ScalarValue::Text))
        .or_else(|| {
            cell(row, idx, |bytes: Vec<u8>| {
                ScalarValue::Text(String::from_utf8_lossy(&bytes).into_owned())
            })
        })
        .unwrap_or(ScalarValue::Null)
}

fn cell<T>(row: &MySqlRow, idx: usize, map: impl FnOnce(T) -> ScalarValue) -> Option<ScalarValue>
where
    T: for<'r> sqlx::Decode<'r, sqlx::MySql> + sqlx::Type<sqlx::MySql>,
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
