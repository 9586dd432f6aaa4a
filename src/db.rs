//! # Database Test Utilities
//!
//! Row-level helpers consumed by integration tests: a shared pool, table
//! resets for between-test isolation, and the count queries assertions are
//! built on.
//!
//! Row resets and full stack teardown (`TestStack::down()`) are independent
//! cleanup strategies; callers choose one per test.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;

use crate::config::StackConfig;
use crate::error::{Result, TestkitError};
use crate::probe::{DatabaseProbe, ReadinessProbe};

/// Open a small connection pool against the configured test database
pub async fn connect_pool(config: &StackConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .map_err(|e| database_error("connect", e))
}

/// One-shot health check: can a connection be opened and a row fetched?
pub async fn can_connect(config: &StackConfig) -> bool {
    DatabaseProbe::new(config).attempt().await
}

/// Delete all rows from the given tables, in order
pub async fn delete_from_tables(pool: &PgPool, tables: &[&str]) -> Result<()> {
    for &table in tables {
        let query = format!("DELETE FROM {table}");
        sqlx::query(&query)
            .execute(pool)
            .await
            .map_err(|e| database_error(&query, e))?;
        debug!(table, "Cleared table");
    }

    Ok(())
}

/// Insert one JSON payload row into a collector table.
///
/// Collector tables share the `(payload JSONB, created_at)` shape; tests use
/// this to seed fixture rows without going through the broker.
pub async fn insert_payload(pool: &PgPool, table: &str, payload: &serde_json::Value) -> Result<()> {
    let query = format!("INSERT INTO {table} (payload) VALUES ($1)");
    sqlx::query(&query)
        .bind(payload)
        .execute(pool)
        .await
        .map_err(|e| database_error(&query, e))?;

    Ok(())
}

/// Row count for one table
pub async fn table_count(pool: &PgPool, table: &str) -> Result<i64> {
    let query = format!("SELECT COUNT(*) FROM {table}");
    sqlx::query_scalar(&query)
        .fetch_one(pool)
        .await
        .map_err(|e| database_error(&query, e))
}

fn database_error(operation: &str, source: sqlx::Error) -> TestkitError {
    TestkitError::Database {
        operation: operation.to_string(),
        message: source.to_string(),
    }
}
