use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures::TryStreamExt;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Column, Executor, Row, Statement, TypeInfo};

use askdb_core::{
    ColumnDescription, ColumnType, Dialect, Error, ForeignKeyRef, QueryResult, Result,
    ScalarValue, SchemaDescription, TableDescription,
};

use crate::adapter::Adapter;
use crate::options::IntrospectOptions;

/// Adapter for PostgreSQL databases. Introspection covers base tables in
/// the `public` schema; execution runs inside a `READ ONLY` transaction.
#[derive(Debug, Clone)]
pub struct PostgresAdapter {
    pool: PgPool,
}

impl PostgresAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Adapter for PostgresAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
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

        let mut tx = self.pool.begin().await.map_err(exec_err)?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(exec_err)?;

        let mut rows = Vec::new();
        let mut truncated = false;
        {
            let mut stream = sqlx::query(sql).fetch(&mut *tx);
            while let Some(row) = stream.try_next().await.map_err(exec_err)? {
                if rows.len() == max_rows {
                    truncated = true;
                    break;
                }
                rows.push(decode_row(&row));
            }
        }
        tx.rollback().await.map_err(exec_err)?;

        Ok(QueryResult {
            columns,
            rows,
            truncated,
        })
    }
}

async fn introspect(pool: &PgPool, opts: &IntrospectOptions) -> Result<SchemaDescription> {
    let database: String = sqlx::query_scalar("SELECT current_database()")
        .fetch_one(pool)
        .await
        .map_err(conn_err)?;

    let names: Vec<String> = sqlx::query_scalar(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
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
        dialect: Dialect::Postgres,
        database: Some(database),
        tables,
    })
}

async fn introspect_table(
    pool: &PgPool,
    name: &str,
    opts: &IntrospectOptions,
) -> Result<TableDescription> {
    let raw_columns: Vec<(String, String, String)> = sqlx::query_as(
        "SELECT column_name, data_type, is_nullable \
         FROM information_schema.columns \
         WHERE table_schema = 'public' AND table_name = $1 \
         ORDER BY ordinal_position",
    )
    .bind(name)
    .fetch_all(pool)
    .await
    .map_err(conn_err)?;
    let columns = raw_columns
        .into_iter()
        .map(|(col_name, declared, nullable)| ColumnDescription {
            column_type: ColumnType::from_declared(&declared),
            name: col_name,
            declared_type: declared,
            is_nullable: nullable == "YES",
        })
        .collect();

    let primary_key: Vec<String> = sqlx::query_scalar(
        "SELECT kcu.column_name \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON tc.constraint_name = kcu.constraint_name \
          AND tc.table_schema = kcu.table_schema \
         WHERE tc.constraint_type = 'PRIMARY KEY' \
           AND tc.table_schema = 'public' AND tc.table_name = $1 \
         ORDER BY kcu.ordinal_position",
    )
    .bind(name)
    .fetch_all(pool)
    .await
    .map_err(conn_err)?;

    let raw_fks: Vec<(String, String, String)> = sqlx::query_as(
        "SELECT kcu.column_name, ccu.table_name, ccu.column_name \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON tc.constraint_name = kcu.constraint_name \
         JOIN information_schema.constraint_column_usage ccu \
           ON ccu.constraint_name = tc.constraint_name \
         WHERE tc.constraint_type = 'FOREIGN KEY' \
           AND tc.table_schema = 'public' AND tc.table_name = $1",
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

    let quoted = Dialect::Postgres.quote_ident(name);

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

fn decode_row(row: &PgRow) -> Vec<ScalarValue> {
    (0..row.len()).map(|idx| decode_value(row, idx)).collect()
}

fn decode_value(row: &PgRow, idx: usize) -> ScalarValue {
    let decoded = match row.columns()[idx].type_info().name() {
        "BOOL" => cell(row, idx, ScalarValue::Bool),
        "INT2" => cell(row, idx, |v: i16| ScalarValue::Int(v.into())),
        "INT4" => cell(row, idx, |v: i32| ScalarValue::Int(v.into())),
        "INT8" | "OID" => cell(row, idx, ScalarValue::Int),
        "FLOAT4" => cell(row, idx, |v: f32| ScalarValue::Float(v.into())),
        "FLOAT8" => cell(row, idx, ScalarValue::Float),
        "NUMERIC" => cell(row, idx, |v: Decimal| {
            v.to_f64().map(ScalarValue::Float).unwrap_or(ScalarValue::Null)
        }),
        "DATE" => cell(row, idx, |v: NaiveDate| ScalarValue::Text(v.to_string())),
        "TIME" => cell(row, idx, |v: NaiveTime| ScalarValue::Text(v.to_string())),
        "TIMESTAMP" => cell(row, idx, |v: NaiveDateTime| {
            ScalarValue::Text(v.to_string())
        }),
        "TIMESTAMPTZ" => cell(row, idx, |v: DateTime<Utc>| {
            ScalarValue::Text(v.to_rfc3339())
        }),
        "UUID" => cell(row, idx, |v: uuid::Uuid| ScalarValue::Text(v.to_string())),
        "JSON" | "JSONB" => cell(row, idx, |v: serde_json::Value| {
            ScalarValue::Text(v.to_string())
        }),
        "BYTEA" => cell(row, idx, |bytes: Vec<u8>| {
            ScalarValue::Text(String::from_utf8_lossy(&bytes).into_owned())
        }),
        _ => None,
    };

    decoded
        .or_else(|| cell(row, idx, ScalarValue::Text))
        .unwrap_or(ScalarValue::Null)
}

fn cell<T>(row: &PgRow, idx: usize, map: impl FnOnce(T) -> ScalarValue) -> Option<ScalarValue>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
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
