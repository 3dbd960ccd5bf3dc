//! Database driver capability.
//!
//! The migration engine only needs to execute SQL, read changelog rows,
//! probe for a boolean and run statements inside a transaction. Each
//! backend implements [`Connection`] and [`Transaction`] for that.

mod postgres;

pub use postgres::{PostgresConnection, PostgresTransaction};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Error reported by a driver.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Error raised by `sqlx`.
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    /// Error raised by any other backend.
    #[error("{0}")]
    Other(String),
}

impl DriverError {
    /// Creates a free-form driver error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Result type for driver calls.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// One row of the changelog table: `(id, name, applied_at)`.
pub type ChangelogRow = (String, String, DateTime<Utc>);

/// A connection to the database migrations run against.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Transaction type opened by [`Connection::begin`].
    type Transaction: Transaction;

    /// Executes one or more statements outside of a transaction.
    async fn execute(&self, sql: &str) -> DriverResult<()>;

    /// Runs a query returning `(id, name, applied_at)` rows.
    async fn query_changelog(&self, sql: &str) -> DriverResult<Vec<ChangelogRow>>;

    /// Runs a query returning a single boolean.
    async fn query_exists(&self, sql: &str) -> DriverResult<bool>;

    /// Opens a transaction.
    async fn begin(&self) -> DriverResult<Self::Transaction>;

    /// Closes the connection.
    async fn close(&self);
}

/// An open transaction.
#[async_trait]
pub trait Transaction: Send + Sized {
    /// Executes one or more statements inside the transaction.
    async fn execute(&mut self, sql: &str) -> DriverResult<()>;

    /// Commits the transaction.
    async fn commit(self) -> DriverResult<()>;

    /// Rolls the transaction back.
    async fn rollback(self) -> DriverResult<()>;
}
