//! SQL text generation.
//!
//! Every statement and catalog query the crate issues is built here, so the
//! dialect differences (and the quoting rules) live in one place.

/// The SQL dialects a session can speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

/// Quote an identifier (table or column name) with double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string value as a SQL literal with single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl Dialect {
    /// Catalog query: does `table` exist? Yields a count of 0 or 1.
    /// Base tables only; views do not count on either dialect.
    pub fn table_exists_query(&self, table: &str) -> String {
        match self {
            Dialect::Postgres => format!(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = current_schema() \
                 AND table_type = 'BASE TABLE' AND table_name = {}",
                quote_literal(table)
            ),
            Dialect::Sqlite => format!(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = {}",
                quote_literal(table)
            ),
        }
    }

    /// Catalog query: does `table`.`column` exist? Yields a count of 0 or 1.
    pub fn column_exists_query(&self, table: &str, column: &str) -> String {
        match self {
            Dialect::Postgres => format!(
                "SELECT COUNT(*) FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = {} AND column_name = {}",
                quote_literal(table),
                quote_literal(column)
            ),
            Dialect::Sqlite => format!(
                "SELECT COUNT(*) FROM pragma_table_info({}) WHERE name = {}",
                quote_literal(table),
                quote_literal(column)
            ),
        }
    }

    /// Catalog query: count foreign-key constraints involving `table`.
    ///
    /// Postgres counts constraints owned by the table plus constraints
    /// referencing it; SQLite's catalog only exposes owned constraints
    /// cheaply, so only those are counted there.
    pub fn foreign_key_count_query(&self, table: &str) -> String {
        match self {
            Dialect::Postgres => format!(
                "SELECT COUNT(*) FROM information_schema.table_constraints tc \
                 WHERE tc.constraint_type = 'FOREIGN KEY' \
                 AND (tc.table_name = {lit} \
                 OR tc.constraint_name IN (\
                 SELECT ccu.constraint_name FROM information_schema.constraint_column_usage ccu \
                 WHERE ccu.table_name = {lit}))",
                lit = quote_literal(table)
            ),
            Dialect::Sqlite => format!(
                "SELECT COUNT(*) FROM pragma_foreign_key_list({})",
                quote_literal(table)
            ),
        }
    }

    /// Catalog query: all base-table names in the current schema, one text
    /// column. Views are excluded on both dialects.
    pub fn list_tables_query(&self) -> String {
        match self {
            Dialect::Postgres => "SELECT table_name FROM information_schema.tables \
                                  WHERE table_schema = current_schema() \
                                  AND table_type = 'BASE TABLE' ORDER BY table_name"
                .to_string(),
            Dialect::Sqlite => {
                "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name".to_string()
            }
        }
    }

    /// `SELECT COUNT(*)` over a whole table.
    pub fn count_rows_query(&self, table: &str) -> String {
        format!("SELECT COUNT(*) FROM {}", quote_ident(table))
    }

    /// `SELECT COUNT(col)`, which counts only non-null values of `column`.
    pub fn count_non_null_query(&self, table: &str, column: &str) -> String {
        format!(
            "SELECT COUNT({}) FROM {}",
            quote_ident(column),
            quote_ident(table)
        )
    }

    /// `ALTER TABLE ... ADD COLUMN` with optional NOT NULL and DEFAULT clauses.
    ///
    /// `type_sql` and `default_sql` are raw fragments; the caller is
    /// responsible for having routed them through the tagged fragment type.
    pub fn add_column(
        &self,
        table: &str,
        column: &str,
        type_sql: &str,
        not_null: bool,
        default_sql: Option<&str>,
    ) -> String {
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_ident(table),
            quote_ident(column),
            type_sql
        );
        if let Some(default) = default_sql {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        if not_null {
            sql.push_str(" NOT NULL");
        }
        sql
    }

    /// `ALTER TABLE ... DROP COLUMN`, with `IF EXISTS` where supported.
    pub fn drop_column(&self, table: &str, column: &str) -> String {
        match self {
            Dialect::Postgres => format!(
                "ALTER TABLE {} DROP COLUMN IF EXISTS {}",
                quote_ident(table),
                quote_ident(column)
            ),
            // SQLite has no IF EXISTS form; callers guard with the catalog first.
            Dialect::Sqlite => format!(
                "ALTER TABLE {} DROP COLUMN {}",
                quote_ident(table),
                quote_ident(column)
            ),
        }
    }

    /// `DROP TABLE IF EXISTS`.
    pub fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", quote_ident(table))
    }

    /// Full row-copy of `source` into a new table `target`.
    pub fn create_table_as_copy(&self, target: &str, source: &str) -> String {
        format!(
            "CREATE TABLE {} AS SELECT * FROM {}",
            quote_ident(target),
            quote_ident(source)
        )
    }

    /// Empty a table destructively, cascading to dependents where supported.
    pub fn clear_table(&self, table: &str) -> String {
        match self {
            Dialect::Postgres => format!("TRUNCATE TABLE {} CASCADE", quote_ident(table)),
            Dialect::Sqlite => format!("DELETE FROM {}", quote_ident(table)),
        }
    }

    /// Repopulate `target` from a full copy held in `source`.
    pub fn insert_from(&self, target: &str, source: &str) -> String {
        format!(
            "INSERT INTO {} SELECT * FROM {}",
            quote_ident(target),
            quote_ident(source)
        )
    }

    /// Create the durable migration-log table if it does not exist.
    ///
    /// The column set and names are an external interface; tools reading the
    /// table rely on them.
    pub fn create_log_table(&self, table: &str) -> String {
        match self {
            Dialect::Postgres => format!(
                "CREATE TABLE IF NOT EXISTS {} (\
                 migration_name TEXT NOT NULL, \
                 status TEXT NOT NULL, \
                 start_time TIMESTAMPTZ NOT NULL, \
                 end_time TIMESTAMPTZ, \
                 duration BIGINT, \
                 error_message TEXT, \
                 metadata TEXT NOT NULL, \
                 created_at TIMESTAMPTZ NOT NULL DEFAULT now())",
                quote_ident(table)
            ),
            Dialect::Sqlite => format!(
                "CREATE TABLE IF NOT EXISTS {} (\
                 migration_name TEXT NOT NULL, \
                 status TEXT NOT NULL, \
                 start_time TEXT NOT NULL, \
                 end_time TEXT, \
                 duration INTEGER, \
                 error_message TEXT, \
                 metadata TEXT NOT NULL, \
                 created_at TEXT NOT NULL DEFAULT (datetime('now')))",
                quote_ident(table)
            ),
        }
    }
}
