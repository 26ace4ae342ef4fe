//! Database access layer.
//!
//! Everything in this crate talks to the database through the [`SqlSession`]
//! trait: a single borrowed connection that executes statements, answers
//! count/name queries, and demarcates transactions. Two drivers implement it:
//! [`PostgresSession`] for live deployments and [`SqliteSession`] for embedded
//! use and hermetic tests. All SQL text is produced by [`Dialect`].

mod dialect;
mod postgres;
mod session;
mod sqlite;

pub use dialect::{quote_ident, quote_literal, Dialect};
pub use postgres::PostgresSession;
pub use session::SqlSession;
pub use sqlite::SqliteSession;

use thiserror::Error;

/// Error types for database access.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("unsupported database url: {0}")]
    UnsupportedUrl(String),
}

/// Open a session for the given database URL.
///
/// `postgres://` and `postgresql://` URLs connect through sqlx; `sqlite://`
/// URLs (including `sqlite://:memory:`) and bare filesystem paths open an
/// embedded SQLite database.
pub async fn connect(url: &str) -> Result<Box<dyn SqlSession>, DbError> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        return Ok(Box::new(PostgresSession::connect(url).await?));
    }

    if let Some(path) = url.strip_prefix("sqlite://") {
        if path == ":memory:" {
            return Ok(Box::new(SqliteSession::in_memory()?));
        }
        return Ok(Box::new(SqliteSession::open(path)?));
    }

    // A bare path is treated as a SQLite database file.
    if !url.contains("://") {
        return Ok(Box::new(SqliteSession::open(url)?));
    }

    Err(DbError::UnsupportedUrl(url.to_string()))
}
