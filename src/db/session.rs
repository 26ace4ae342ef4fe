//! The borrowed-connection seam.

use super::{DbError, Dialect};
use async_trait::async_trait;

/// A single database connection, serialized by the caller.
///
/// One session owns exactly one connection and one migration run owns the
/// session for its whole lifecycle; nothing here is safe for concurrent
/// writers beyond what the database's own transaction layer provides
/// (single-writer assumption).
///
/// Transactions are demarcated with plain `BEGIN`/`COMMIT`/`ROLLBACK`
/// statements, which is what the wrapped migration runner does underneath.
#[async_trait]
pub trait SqlSession: Send + Sync {
    /// The SQL dialect this session speaks.
    fn dialect(&self) -> Dialect;

    /// Execute a DDL or DML statement, returning the affected row count.
    async fn execute(&self, sql: &str) -> Result<u64, DbError>;

    /// Run a query whose first row/column is a single integer (COUNT-style).
    async fn query_count(&self, sql: &str) -> Result<i64, DbError>;

    /// Run a query yielding one text column, collected in row order.
    async fn query_names(&self, sql: &str) -> Result<Vec<String>, DbError>;

    /// Open a transaction on this connection.
    async fn begin(&self) -> Result<(), DbError>;

    /// Commit the open transaction.
    async fn commit(&self) -> Result<(), DbError>;

    /// Roll back the open transaction.
    async fn rollback(&self) -> Result<(), DbError>;
}
