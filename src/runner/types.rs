//! Types for the migration runner.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::backup::{BackupDescriptor, BackupError};
use crate::db::{DbError, SqlSession};
use crate::validate::ValidationOutcome;

/// Error types for migration change functions.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("backup error: {0}")]
    Backup(#[from] BackupError),

    #[error("{0}")]
    Failed(String),
}

impl MigrationError {
    /// A failure with a plain message. The message is reported verbatim in
    /// results and the execution log.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// The table (and optionally a column) a migration changes.
///
/// Drives pre-flight validation and the backup step; a migration without a
/// target gets neither.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationTarget {
    pub table: String,
    pub column: Option<String>,
}

impl MigrationTarget {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: None,
        }
    }

    pub fn column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: Some(column.into()),
        }
    }
}

/// Trait for a single migration.
///
/// A migration is a named pair of forward/backward change functions over a
/// SQL session. The backward function doubles as the compensation step when
/// the forward function fails after a backup was taken.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Name of this migration. Keys the execution log.
    fn name(&self) -> &str;

    /// What this migration changes, if known.
    fn target(&self) -> Option<MigrationTarget> {
        None
    }

    /// Apply the change.
    async fn forward(&self, session: &dyn SqlSession) -> Result<(), MigrationError>;

    /// Revert the change.
    async fn backward(&self, session: &dyn SqlSession) -> Result<(), MigrationError>;
}

/// Direction of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDirection {
    Forward,
    Backward,
}

/// Per-run configuration.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Bypass the backup step.
    pub skip_backup: bool,
    /// Bypass pre-flight validation.
    pub skip_validation: bool,
    /// Short-circuit before any side effect; still recorded as success.
    pub dry_run: bool,
    /// Abort the run when validation reports errors. Off by default; the
    /// default flow treats validation as advisory.
    pub fail_on_validation_errors: bool,
}

/// Terminal state of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Dry run; nothing was executed.
    DryRun,
    /// Forward change committed.
    Committed,
    /// Validation reported errors and the run was configured to fail on them,
    /// or a validation check itself failed.
    ValidationFailed,
    /// Backup creation failed before the transaction opened.
    BackupFailed,
    /// The change failed and the transaction was rolled back. `compensated`
    /// is `None` when no backup existed (compensation was not attempted),
    /// otherwise whether the backward function succeeded.
    RolledBack { compensated: Option<bool> },
}

/// Result of one migration run. Always produced, success or failure.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Whether the run succeeded.
    pub success: bool,
    /// Name of the migration that ran.
    pub migration_name: String,
    /// Wall-clock duration of the run in milliseconds, clamped to 0.
    pub duration_ms: i64,
    /// Error message if the run failed. On a forward failure this is always
    /// the original error, even when compensation also failed.
    pub error: Option<String>,
    /// Descriptor of the backup taken for this run, if any.
    pub backup: Option<BackupDescriptor>,
    /// Pre-flight validation outcome, if validation ran.
    pub validation: Option<ValidationOutcome>,
    /// Terminal state of the run.
    pub outcome: RunOutcome,
}
