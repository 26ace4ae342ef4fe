//! Read-only catalog queries.

use crate::db::{DbError, SqlSession};

/// Answers existence and shape questions about the live schema.
///
/// Absence of a table or column is an `Ok(false)` answer, never an error;
/// only connectivity or query failures propagate.
pub struct SchemaInspector<'a> {
    session: &'a dyn SqlSession,
}

impl<'a> SchemaInspector<'a> {
    pub fn new(session: &'a dyn SqlSession) -> Self {
        Self { session }
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        let sql = self.session.dialect().table_exists_query(table);
        Ok(self.session.query_count(&sql).await? > 0)
    }

    pub async fn column_exists(&self, table: &str, column: &str) -> Result<bool, DbError> {
        let sql = self.session.dialect().column_exists_query(table, column);
        Ok(self.session.query_count(&sql).await? > 0)
    }

    pub async fn count_rows(&self, table: &str) -> Result<i64, DbError> {
        let sql = self.session.dialect().count_rows_query(table);
        self.session.query_count(&sql).await
    }

    /// Count of rows where `column` is non-null.
    pub async fn count_non_null(&self, table: &str, column: &str) -> Result<i64, DbError> {
        let sql = self.session.dialect().count_non_null_query(table, column);
        self.session.query_count(&sql).await
    }

    /// Foreign-key constraints involving `table` (owned, plus referencing
    /// where the catalog exposes them).
    pub async fn foreign_key_count(&self, table: &str) -> Result<i64, DbError> {
        let sql = self.session.dialect().foreign_key_count_query(table);
        self.session.query_count(&sql).await
    }

    /// All table names visible in the current schema.
    pub async fn list_tables(&self) -> Result<Vec<String>, DbError> {
        let sql = self.session.dialect().list_tables_query();
        self.session.query_names(&sql).await
    }
}
