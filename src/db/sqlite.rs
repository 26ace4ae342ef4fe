//! SQLite-backed session over a single `rusqlite` connection.
//!
//! Besides being a deployment target, the in-memory form gives the test
//! suite a real SQL engine without any external service.

use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::debug;

use super::dialect::Dialect;
use super::session::SqlSession;
use super::DbError;

/// A session over one SQLite connection.
///
/// `rusqlite` is synchronous; calls run inline while holding the session
/// lock, which is fine for a tool that issues statements one at a time.
pub struct SqliteSession {
    conn: Mutex<Connection>,
}

impl SqliteSession {
    /// Open (or create) a database file at `path`.
    pub fn open(path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        debug!(path = %path, "sqlite session established");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl SqlSession for SqliteSession {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, sql: &str) -> Result<u64, DbError> {
        let conn = self.conn.lock().await;
        conn.execute_batch(sql)?;
        Ok(conn.changes())
    }

    async fn query_count(&self, sql: &str) -> Result<i64, DbError> {
        let conn = self.conn.lock().await;
        let count = conn.query_row(sql, [], |row| row.get::<_, i64>(0))?;
        Ok(count)
    }

    async fn query_names(&self, sql: &str) -> Result<Vec<String>, DbError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut names = Vec::new();
        for name in rows {
            names.push(name?);
        }
        Ok(names)
    }

    async fn begin(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().await;
        conn.execute_batch("BEGIN")?;
        Ok(())
    }

    async fn commit(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().await;
        conn.execute_batch("COMMIT")?;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().await;
        conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}
