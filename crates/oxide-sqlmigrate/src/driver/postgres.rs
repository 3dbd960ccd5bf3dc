//! PostgreSQL driver backed by `sqlx`.
//!
//! Migration bodies are sent through [`sqlx::raw_sql`], so a single file
//! may contain several statements.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::Postgres;
use tracing::debug;

use super::{ChangelogRow, Connection, DriverResult, Transaction};

/// A PostgreSQL connection.
#[derive(Debug, Clone)]
pub struct PostgresConnection {
    pool: PgPool,
}

impl PostgresConnection {
    /// Opens a lazily connected pool.
    ///
    /// No network traffic happens until the first statement, so a database
    /// that is still starting up can be waited for with
    /// [`crate::executor::wait_for_start`].
    #[must_use]
    pub fn open(options: PgConnectOptions) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy_with(options);
        Self { pool }
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    type Transaction = PostgresTransaction;

    async fn execute(&self, sql: &str) -> DriverResult<()> {
        debug!(sql = %sql, "Executing SQL");
        sqlx::raw_sql(sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn query_changelog(&self, sql: &str) -> DriverResult<Vec<ChangelogRow>> {
        let rows: Vec<(String, String, DateTime<Utc>)> =
            sqlx::query_as(sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn query_exists(&self, sql: &str) -> DriverResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(sql).fetch_one(&self.pool).await?;
        Ok(exists)
    }

    async fn begin(&self) -> DriverResult<PostgresTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// A PostgreSQL transaction.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn execute(&mut self, sql: &str) -> DriverResult<()> {
        debug!(sql = %sql, "Executing SQL in transaction");
        sqlx::Executor::execute(&mut *self.tx, sqlx::raw_sql(sql)).await?;
        Ok(())
    }

    async fn commit(self) -> DriverResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> DriverResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
