//! End-to-end pipeline: canned model output through the extractor and
//! guard, then real execution against a SQLite fixture.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use askdb_chart::{chartjs_config, infer_chart, ChartKind};
use askdb_core::ScalarValue;
use askdb_introspect::{Adapter, SqliteAdapter};
use askdb_nl::extract_and_guard;

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

async fn fixture_adapter() -> Result<SqliteAdapter> {
    // One connection: every pool connection would otherwise get its own
    // empty in-memory database.
    let pool: SqlitePool = SqlitePoolOptions::new()
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
    Ok(SqliteAdapter::new(pool))
}

#[tokio::test]
async fn fenced_model_output_runs_and_charts() -> Result<()> {
    let adapter = fixture_adapter().await?;

    // The shape a chat model typically returns for "orders per customer".
    let response = "Here is the query you asked for:\n\n```sql\nSELECT c.name, \
                    COUNT(o.id) AS order_count\nFROM customers c\nLEFT JOIN orders o \
                    ON o.customer_id = c.id\nGROUP BY c.name\nORDER BY c.name\n```\n\n\
                    This counts each customer's orders.";
    let sql = extract_and_guard(response)?;
    let result = adapter.execute(&sql, 1000).await?;

    assert_eq!(result.columns, ["name", "order_count"]);
    assert_eq!(result.row_count(), 3);
    assert_eq!(result.rows[0][0], ScalarValue::Text("alice".into()));
    assert_eq!(result.rows[0][1], ScalarValue::Int(4));
    assert!(!result.truncated);

    let chart = infer_chart(&result, None, "orders per customer")?;
    assert_eq!(chart.kind, ChartKind::Pie);
    let config = chartjs_config(&result, &chart);
    assert_eq!(config["data"]["labels"][0], "alice");
    Ok(())
}

#[tokio::test]
async fn destructive_model_output_is_rejected_before_execution() -> Result<()> {
    let adapter = fixture_adapter().await?;

    let response = "```sql\nDROP TABLE customers\n```";
    let err = extract_and_guard(response).expect_err("guard must reject DROP");
    assert_eq!(err.kind(), "unsafe_statement");

    // Nothing reached the database: the table is intact.
    let result = adapter.execute("SELECT COUNT(*) AS n FROM customers", 10).await?;
    assert_eq!(result.rows[0][0], ScalarValue::Int(3));
    Ok(())
}

#[tokio::test]
async fn smuggled_second_statement_is_rejected() -> Result<()> {
    let adapter = fixture_adapter().await?;

    let response = "SELECT name FROM customers; DELETE FROM orders";
    assert!(extract_and_guard(response).is_err());

    let result = adapter.execute("SELECT COUNT(*) AS n FROM orders", 10).await?;
    assert_eq!(result.rows[0][0], ScalarValue::Int(8));
    Ok(())
}

#[tokio::test]
async fn execution_respects_the_row_cap() -> Result<()> {
    let adapter = fixture_adapter().await?;

    let sql = extract_and_guard("SELECT id, amount FROM orders ORDER BY id")?;
    let result = adapter.execute(&sql, 5).await?;
    assert_eq!(result.row_count(), 5);
    assert!(result.truncated);
    Ok(())
}
