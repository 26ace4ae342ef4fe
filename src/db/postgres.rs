//! Postgres-backed session over a sqlx pool capped at one connection.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::debug;

use super::dialect::Dialect;
use super::session::SqlSession;
use super::DbError;

/// A session over one pooled Postgres connection.
///
/// The pool holds a single connection that is never reaped, so every
/// statement lands on the same backend session and plain
/// `BEGIN`/`COMMIT`/`ROLLBACK` statements keep their effect across calls.
/// Statements go over the simple query protocol so multi-statement scripts
/// work as plain SQL.
pub struct PostgresSession {
    pool: PgPool,
}

impl PostgresSession {
    /// Open a connection to the given `postgres://` URL.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(url)
            .await?;
        debug!("postgres session established");
        Ok(Self { pool })
    }
}

#[async_trait]
impl SqlSession for PostgresSession {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, sql: &str) -> Result<u64, DbError> {
        let result = sqlx::raw_sql(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn query_count(&self, sql: &str) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar(sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn query_names(&self, sql: &str) -> Result<Vec<String>, DbError> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(DbError::from))
            .collect()
    }

    async fn begin(&self) -> Result<(), DbError> {
        self.execute("BEGIN").await?;
        Ok(())
    }

    async fn commit(&self) -> Result<(), DbError> {
        self.execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DbError> {
        self.execute("ROLLBACK").await?;
        Ok(())
    }
}
