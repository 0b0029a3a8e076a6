use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use askdb_core::{validate_schema, ColumnType, Dialect, ScalarValue};
use askdb_introspect::{Adapter, IntrospectOptions, SqliteAdapter};

const FIXTURE: &str = "
CREATE TABLE customers (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE orders (
    id INTEGER PRIMARY KEY,
    customer_id INTEGER NOT NULL REFERENCES customers(id),
    amount REAL
);
INSERT INTO customers (id, name) VALUES (1, 'alice'), (2, 'bob'), (3, 'carol');
INSERT INTO orders (id, customer_id, amount) VALUES
    (1, 1, 10.0), (2, 1, 12.5), (3, 2, 7.25),
    (4, 1, 3.0), (5, 3, 99.99), (6, 2, 1.5),
    (7, 3, 42.0), (8, 1, 8.0);
";

async fn fixture_pool() -> Result<SqlitePool> {
    // One connection: every pool connection would otherwise get its own
    // empty in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    for statement in FIXTURE.split(';') {
        let sql = statement.trim();
        if sql.is_empty() {
            continue;
        }
        sqlx::query(sql).execute(&pool).await?;
    }

    Ok(pool)
}

#[tokio::test]
async fn introspects_tables_columns_and_keys() -> Result<()> {
    let adapter = SqliteAdapter::new(fixture_pool().await?);
    let schema = adapter.introspect(&IntrospectOptions::default()).await?;

    assert_eq!(schema.dialect, Dialect::Sqlite);
    let names: Vec<&str> = schema.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["customers", "orders"]);
    validate_schema(&schema)?;

    let customers = &schema.tables[0];
    assert_eq!(customers.columns.len(), 2);
    assert_eq!(customers.primary_key, ["id"]);
    assert_eq!(customers.row_count, 3);
    assert_eq!(customers.columns[0].column_type, ColumnType::Integer);
    assert_eq!(customers.columns[1].column_type, ColumnType::Text);
    assert!(!customers.columns[1].is_nullable);

    let orders = &schema.tables[1];
    assert_eq!(orders.row_count, 8);
    assert_eq!(orders.foreign_keys.len(), 1);
    let fk = &orders.foreign_keys[0];
    assert_eq!(fk.column, "customer_id");
    assert_eq!(fk.referenced_table, "customers");
    assert_eq!(fk.referenced_column, "id");

    Ok(())
}

#[tokio::test]
async fn sample_rows_are_bounded() -> Result<()> {
    let adapter = SqliteAdapter::new(fixture_pool().await?);

    let opts = IntrospectOptions {
        sample_rows: 2,
        count_rows: true,
    };
    let schema = adapter.introspect(&opts).await?;
    let orders = schema.tables.iter().find(|t| t.name == "orders").unwrap();
    assert_eq!(orders.sample_rows.len(), 2);
    assert_eq!(orders.sample_rows[0].len(), orders.columns.len());

    let opts = IntrospectOptions {
        sample_rows: 0,
        count_rows: false,
    };
    let schema = adapter.introspect(&opts).await?;
    let orders = schema.tables.iter().find(|t| t.name == "orders").unwrap();
    assert!(orders.sample_rows.is_empty());
    assert_eq!(orders.row_count, 0);

    Ok(())
}

#[tokio::test]
async fn introspect_is_idempotent() -> Result<()> {
    let adapter = SqliteAdapter::new(fixture_pool().await?);
    let opts = IntrospectOptions::default();

    let first = adapter.introspect(&opts).await?;
    let second = adapter.introspect(&opts).await?;
    assert_eq!(
        serde_json::to_value(&first)?,
        serde_json::to_value(&second)?
    );

    Ok(())
}

#[tokio::test]
async fn execute_caps_rows_and_flags_truncation() -> Result<()> {
    let adapter = SqliteAdapter::new(fixture_pool().await?);

    let result = adapter.execute("SELECT id FROM orders ORDER BY id", 5).await?;
    assert_eq!(result.rows.len(), 5);
    assert!(result.truncated);

    let result = adapter.execute("SELECT id FROM orders ORDER BY id", 100).await?;
    assert_eq!(result.rows.len(), 8);
    assert!(!result.truncated);

    Ok(())
}

#[tokio::test]
async fn execute_decodes_aggregates_and_nulls() -> Result<()> {
    let adapter = SqliteAdapter::new(fixture_pool().await?);

    let result = adapter
        .execute(
            "SELECT c.name, COUNT(o.id) AS order_count \
             FROM customers c JOIN orders o ON o.customer_id = c.id \
             GROUP BY c.name ORDER BY c.name",
            100,
        )
        .await?;

    assert_eq!(result.columns, ["name", "order_count"]);
    assert_eq!(result.rows.len(), 3);
    assert_eq!(
        result.rows[0],
        vec![ScalarValue::Text("alice".into()), ScalarValue::Int(4)]
    );

    let result = adapter.execute("SELECT NULL AS empty_value", 10).await?;
    assert_eq!(result.rows[0][0], ScalarValue::Null);

    Ok(())
}

#[tokio::test]
async fn execute_surfaces_backend_errors() -> Result<()> {
    let adapter = SqliteAdapter::new(fixture_pool().await?);

    let err = adapter
        .execute("SELECT no_such_column FROM customers", 10)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "execution");

    Ok(())
}
