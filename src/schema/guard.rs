//! Existence-checked DDL helpers.
//!
//! The guards make add/drop operations idempotent: a repeat invocation warns
//! and no-ops instead of failing the whole run on "already exists" or
//! "does not exist".

use tracing::{info, warn};

use crate::db::{quote_literal, DbError, Dialect, SqlSession};

use super::inspector::SchemaInspector;

/// A raw SQL fragment the caller vouches for.
///
/// Type expressions and raw defaults pass through to the statement builder
/// unvalidated; wrapping them in this type keeps that path visible at the
/// call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFragment(String);

impl SqlFragment {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Default value for a new column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    /// Current timestamp at insert time.
    Now,
    /// Arbitrary SQL expression, unvalidated.
    Raw(SqlFragment),
}

impl ColumnDefault {
    fn render(&self, dialect: Dialect) -> String {
        match self {
            ColumnDefault::Null => "NULL".to_string(),
            ColumnDefault::Bool(value) => match dialect {
                Dialect::Postgres => {
                    if *value {
                        "TRUE".to_string()
                    } else {
                        "FALSE".to_string()
                    }
                }
                Dialect::Sqlite => {
                    if *value {
                        "1".to_string()
                    } else {
                        "0".to_string()
                    }
                }
            },
            ColumnDefault::Integer(value) => value.to_string(),
            ColumnDefault::Real(value) => value.to_string(),
            ColumnDefault::Text(value) => quote_literal(value),
            ColumnDefault::Now => match dialect {
                Dialect::Postgres => "now()".to_string(),
                Dialect::Sqlite => "CURRENT_TIMESTAMP".to_string(),
            },
            ColumnDefault::Raw(fragment) => fragment.as_str().to_string(),
        }
    }
}

/// Shape of a column to add: type, nullability, default.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    column_type: SqlFragment,
    nullable: bool,
    default: Option<ColumnDefault>,
}

impl ColumnSpec {
    /// A nullable column of the given type, with no default.
    pub fn new(column_type: SqlFragment) -> Self {
        Self {
            column_type,
            nullable: true,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }
}

/// Guarded DDL operations over a borrowed session.
pub struct DdlGuard<'a> {
    session: &'a dyn SqlSession,
}

impl<'a> DdlGuard<'a> {
    pub fn new(session: &'a dyn SqlSession) -> Self {
        Self { session }
    }

    /// Add `column` to `table` unless it already exists.
    ///
    /// Returns `Ok(true)` when the column was added, `Ok(false)` when the
    /// guard skipped the operation.
    pub async fn add_column_if_absent(
        &self,
        table: &str,
        column: &str,
        spec: &ColumnSpec,
    ) -> Result<bool, DbError> {
        let inspector = SchemaInspector::new(self.session);
        if inspector.column_exists(table, column).await? {
            warn!(table = %table, column = %column, "Column already exists, skipping add");
            return Ok(false);
        }
        let dialect = self.session.dialect();
        let default_sql = spec.default.as_ref().map(|d| d.render(dialect));
        let sql = dialect.add_column(
            table,
            column,
            spec.column_type.as_str(),
            !spec.nullable,
            default_sql.as_deref(),
        );
        self.session.execute(&sql).await?;
        info!(table = %table, column = %column, "Added column");
        Ok(true)
    }

    /// Drop `column` from `table` if it exists, warning first when the
    /// column still holds data. The data warning is advisory and never
    /// blocks the drop.
    pub async fn drop_column_guarded(&self, table: &str, column: &str) -> Result<bool, DbError> {
        let inspector = SchemaInspector::new(self.session);
        if !inspector.column_exists(table, column).await? {
            warn!(table = %table, column = %column, "Column does not exist, skipping drop");
            return Ok(false);
        }
        let populated = inspector.count_non_null(table, column).await?;
        if populated > 0 {
            warn!(
                table = %table,
                column = %column,
                rows = populated,
                "Dropping column that still holds data"
            );
        }
        let sql = self.session.dialect().drop_column(table, column);
        self.session.execute(&sql).await?;
        info!(table = %table, column = %column, "Dropped column");
        Ok(true)
    }

    /// Advisory pre-drop check for a whole table: warns with the current row
    /// count and returns whether the table exists. The actual DROP stays with
    /// the caller.
    pub async fn drop_table_guarded(&self, table: &str) -> Result<bool, DbError> {
        let inspector = SchemaInspector::new(self.session);
        if !inspector.table_exists(table).await? {
            warn!(table = %table, "Table does not exist, skipping drop");
            return Ok(false);
        }
        let rows = inspector.count_rows(table).await?;
        warn!(table = %table, rows = rows, "Table is about to be dropped");
        Ok(true)
    }
}
