//! Table backups: full-copy snapshots taken before destructive changes.
//!
//! A backup is an ordinary table named after its source plus a UTC
//! timestamp, so it survives the process and is visible to any SQL client.

use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::db::{DbError, SqlSession};

/// Backup table names: `{table}_backup_{timestamp}` with the RFC 3339
/// millisecond instant flattened to identifier-safe characters.
static BACKUP_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^.+_backup_\d{4}-\d{2}-\d{2}T\d{2}-\d{2}-\d{2}-\d{3}Z$").unwrap()
});

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("database error: {0}")]
    Db(#[from] DbError),
    #[error("not a backup table identifier: {0}")]
    NotABackup(String),
}

/// Record of one completed backup. Created when the copy succeeds and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupDescriptor {
    pub source_table: String,
    pub backup_identifier: String,
    pub row_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Build the backup table name for `table` at instant `at`.
///
/// `:` and `.` are replaced with `-` so the timestamp survives as a plain
/// identifier. Uniqueness rests on the millisecond component; a
/// same-millisecond collision surfaces as a create failure.
pub fn backup_identifier(table: &str, at: DateTime<Utc>) -> String {
    let ts = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(':', "-")
        .replace('.', "-");
    format!("{}_backup_{}", table, ts)
}

/// Whether `name` follows the backup naming convention.
pub fn is_backup_identifier(name: &str) -> bool {
    BACKUP_NAME.is_match(name)
}

/// Creates, restores, lists and removes table backups over a borrowed
/// session.
pub struct BackupManager<'a> {
    session: &'a dyn SqlSession,
}

impl<'a> BackupManager<'a> {
    pub fn new(session: &'a dyn SqlSession) -> Self {
        Self { session }
    }

    /// Snapshot `table` into a new backup table.
    ///
    /// No existence pre-check here: a missing source fails the copy and the
    /// error propagates. Callers that want to skip instead must check first.
    pub async fn backup_table(&self, table: &str) -> Result<BackupDescriptor, BackupError> {
        let created_at = Utc::now();
        let identifier = backup_identifier(table, created_at);
        let dialect = self.session.dialect();
        self.session
            .execute(&dialect.create_table_as_copy(&identifier, table))
            .await?;
        let row_count = self
            .session
            .query_count(&dialect.count_rows_query(&identifier))
            .await?;
        info!(
            table = %table,
            backup = %identifier,
            rows = row_count,
            "Created table backup"
        );
        Ok(BackupDescriptor {
            source_table: table.to_string(),
            backup_identifier: identifier,
            row_count,
            created_at,
        })
    }

    /// Replace the contents of `target_table` with the rows held in
    /// `backup_identifier`.
    ///
    /// Empty-then-repopulate runs inside one transaction, so a failed
    /// restore leaves the target untouched. Returns the number of rows
    /// restored.
    pub async fn restore(
        &self,
        backup_identifier: &str,
        target_table: &str,
    ) -> Result<u64, BackupError> {
        if !is_backup_identifier(backup_identifier) {
            return Err(BackupError::NotABackup(backup_identifier.to_string()));
        }
        let dialect = self.session.dialect();
        self.session.begin().await?;
        let restored = async {
            self.session.execute(&dialect.clear_table(target_table)).await?;
            self.session
                .execute(&dialect.insert_from(target_table, backup_identifier))
                .await
        }
        .await;
        match restored {
            Ok(rows) => {
                self.session.commit().await?;
                info!(
                    backup = %backup_identifier,
                    table = %target_table,
                    rows = rows,
                    "Restored table from backup"
                );
                Ok(rows)
            }
            Err(err) => {
                if let Err(rollback_err) = self.session.rollback().await {
                    error!(error = %rollback_err, "Rollback after failed restore also failed");
                }
                Err(err.into())
            }
        }
    }

    /// Drop a backup table. Idempotent: removing an already-removed backup
    /// succeeds.
    pub async fn cleanup(&self, backup_identifier: &str) -> Result<(), BackupError> {
        if !is_backup_identifier(backup_identifier) {
            return Err(BackupError::NotABackup(backup_identifier.to_string()));
        }
        let sql = self.session.dialect().drop_table(backup_identifier);
        self.session.execute(&sql).await?;
        info!(backup = %backup_identifier, "Removed backup table");
        Ok(())
    }

    /// All tables in the current schema that follow the backup naming
    /// convention.
    pub async fn list_backups(&self) -> Result<Vec<String>, BackupError> {
        let sql = self.session.dialect().list_tables_query();
        let tables = self.session.query_names(&sql).await?;
        Ok(tables
            .into_iter()
            .filter(|name| is_backup_identifier(name))
            .collect())
    }
}
