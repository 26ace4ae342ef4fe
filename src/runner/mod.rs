//! Migration runner: sequences validation, backup, transactional execution,
//! logging and compensating rollback around one migration.

pub mod script;
pub mod types;

pub use script::SqlScriptMigration;
pub use types::{
    ExecutionOptions, ExecutionResult, Migration, MigrationError, MigrationTarget, RunDirection,
    RunOutcome,
};

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{error, info, warn};

use crate::backup::{BackupDescriptor, BackupManager};
use crate::db::SqlSession;
use crate::ledger::ExecutionLog;
use crate::validate::{pre_destructive_check, ValidationOutcome};

/// Runner for executing migrations against one session.
///
/// The runner drives a strictly sequential pipeline per run and assumes it
/// is the only writer on the session. Concurrent runs need separate
/// sessions and separate logs, serialized by the caller.
pub struct MigrationRunner<'a> {
    session: &'a dyn SqlSession,
}

impl<'a> MigrationRunner<'a> {
    /// Create a runner over the given session.
    pub fn new(session: &'a dyn SqlSession) -> Self {
        Self { session }
    }

    /// Execute one migration forward.
    ///
    /// This method:
    /// 1. Records the start in the execution log unconditionally
    /// 2. On dry run, reports success with zero side effects
    /// 3. Validates the target table (advisory unless configured otherwise)
    /// 4. Backs up the target table; a backup failure aborts the run
    /// 5. Runs the forward function inside a transaction
    /// 6. On failure rolls back and, if a backup exists, attempts the
    ///    backward function as compensation
    ///
    /// Always returns a result; the transaction is never left open.
    pub async fn run(
        &self,
        log: &mut ExecutionLog,
        migration: &dyn Migration,
        options: &ExecutionOptions,
    ) -> ExecutionResult {
        let name = migration.name().to_string();
        let started = Utc::now();
        log.record_start(&name);
        info!(migration = %name, "Starting migration run");

        if options.dry_run {
            info!(migration = %name, "Dry run, skipping execution");
            let mut metadata = HashMap::new();
            metadata.insert("dry_run".to_string(), json!(true));
            log.record_success(&name, metadata);
            return ExecutionResult {
                success: true,
                migration_name: name,
                duration_ms: elapsed_ms(started),
                error: None,
                backup: None,
                validation: None,
                outcome: RunOutcome::DryRun,
            };
        }

        let target = migration.target();

        let mut validation: Option<ValidationOutcome> = None;
        if !options.skip_validation {
            match &target {
                Some(target) => {
                    let checked =
                        pre_destructive_check(self.session, &target.table, target.column.as_deref())
                            .await;
                    match checked {
                        Ok(outcome) => {
                            if !outcome.valid && options.fail_on_validation_errors {
                                let message =
                                    format!("validation failed: {}", outcome.errors.join("; "));
                                error!(migration = %name, error = %message, "Aborting run");
                                log.record_failure(&name, &message);
                                return ExecutionResult {
                                    success: false,
                                    migration_name: name,
                                    duration_ms: elapsed_ms(started),
                                    error: Some(message),
                                    backup: None,
                                    validation: Some(outcome),
                                    outcome: RunOutcome::ValidationFailed,
                                };
                            }
                            validation = Some(outcome);
                        }
                        Err(err) => {
                            // Read-only check failures are fatal, not advisory.
                            let message = err.to_string();
                            error!(migration = %name, error = %message, "Validation check failed");
                            log.record_failure(&name, &message);
                            return ExecutionResult {
                                success: false,
                                migration_name: name,
                                duration_ms: elapsed_ms(started),
                                error: Some(message),
                                backup: None,
                                validation: None,
                                outcome: RunOutcome::ValidationFailed,
                            };
                        }
                    }
                }
                None => {
                    warn!(migration = %name, "Migration declares no target, skipping validation")
                }
            }
        }

        let mut backup: Option<BackupDescriptor> = None;
        if !options.skip_backup {
            match &target {
                Some(target) => {
                    let manager = BackupManager::new(self.session);
                    match manager.backup_table(&target.table).await {
                        Ok(descriptor) => backup = Some(descriptor),
                        Err(err) => {
                            let message = format!("backup failed: {}", err);
                            error!(migration = %name, error = %err, "Backup failed, aborting run");
                            log.record_failure(&name, &message);
                            return ExecutionResult {
                                success: false,
                                migration_name: name,
                                duration_ms: elapsed_ms(started),
                                error: Some(message),
                                backup: None,
                                validation,
                                outcome: RunOutcome::BackupFailed,
                            };
                        }
                    }
                }
                None => warn!(migration = %name, "Migration declares no target, skipping backup"),
            }
        }

        match self.execute(migration, RunDirection::Forward).await {
            Ok(()) => {
                let mut metadata = HashMap::new();
                metadata.insert("backup_created".to_string(), json!(backup.is_some()));
                if let Some(descriptor) = &backup {
                    metadata.insert(
                        "backup_identifier".to_string(),
                        json!(descriptor.backup_identifier),
                    );
                }
                log.record_success(&name, metadata);
                info!(migration = %name, "Migration committed");
                ExecutionResult {
                    success: true,
                    migration_name: name,
                    duration_ms: elapsed_ms(started),
                    error: None,
                    backup,
                    validation,
                    outcome: RunOutcome::Committed,
                }
            }
            Err(err) => {
                let message = err.to_string();
                error!(migration = %name, error = %message, "Migration failed");
                log.record_failure(&name, &message);

                let compensated = match &backup {
                    Some(descriptor) => Some(self.compensate(log, migration, descriptor).await),
                    None => None,
                };

                ExecutionResult {
                    success: false,
                    migration_name: name,
                    duration_ms: elapsed_ms(started),
                    error: Some(message),
                    backup,
                    validation,
                    outcome: RunOutcome::RolledBack { compensated },
                }
            }
        }
    }

    /// Execute one migration's backward function standalone, for an explicit
    /// rollback request. Validation and backup do not apply here; the dry-run
    /// option is honored.
    pub async fn run_backward(
        &self,
        log: &mut ExecutionLog,
        migration: &dyn Migration,
        options: &ExecutionOptions,
    ) -> ExecutionResult {
        let name = migration.name().to_string();
        let started = Utc::now();
        log.record_start(&name);
        info!(migration = %name, "Starting rollback run");

        if options.dry_run {
            info!(migration = %name, "Dry run, skipping execution");
            let mut metadata = HashMap::new();
            metadata.insert("operation".to_string(), json!("rollback"));
            metadata.insert("dry_run".to_string(), json!(true));
            log.record_success(&name, metadata);
            return ExecutionResult {
                success: true,
                migration_name: name,
                duration_ms: elapsed_ms(started),
                error: None,
                backup: None,
                validation: None,
                outcome: RunOutcome::DryRun,
            };
        }

        match self.execute(migration, RunDirection::Backward).await {
            Ok(()) => {
                let mut metadata = HashMap::new();
                metadata.insert("operation".to_string(), json!("rollback"));
                log.record_success(&name, metadata);
                info!(migration = %name, "Rollback committed");
                ExecutionResult {
                    success: true,
                    migration_name: name,
                    duration_ms: elapsed_ms(started),
                    error: None,
                    backup: None,
                    validation: None,
                    outcome: RunOutcome::Committed,
                }
            }
            Err(err) => {
                let message = err.to_string();
                error!(migration = %name, error = %message, "Rollback failed");
                log.record_failure(&name, &message);
                ExecutionResult {
                    success: false,
                    migration_name: name,
                    duration_ms: elapsed_ms(started),
                    error: Some(message),
                    backup: None,
                    validation: None,
                    outcome: RunOutcome::RolledBack { compensated: None },
                }
            }
        }
    }

    /// Run one change function inside a transaction. Every failure path,
    /// including a failed commit, issues a best-effort rollback so the
    /// transaction is never left open.
    async fn execute(
        &self,
        migration: &dyn Migration,
        direction: RunDirection,
    ) -> Result<(), MigrationError> {
        self.session.begin().await?;

        let result = match direction {
            RunDirection::Forward => migration.forward(self.session).await,
            RunDirection::Backward => migration.backward(self.session).await,
        };

        match result {
            Ok(()) => {
                if let Err(commit_err) = self.session.commit().await {
                    self.abort_transaction().await;
                    return Err(commit_err.into());
                }
                Ok(())
            }
            Err(err) => {
                self.abort_transaction().await;
                Err(err)
            }
        }
    }

    async fn abort_transaction(&self) {
        if let Err(err) = self.session.rollback().await {
            error!(error = %err, "Transaction rollback failed");
        }
    }

    /// Invoke the backward function after a forward failure. The outcome is
    /// logged either way; a compensation failure never masks the original
    /// error.
    async fn compensate(
        &self,
        log: &mut ExecutionLog,
        migration: &dyn Migration,
        descriptor: &BackupDescriptor,
    ) -> bool {
        info!(
            migration = %migration.name(),
            backup = %descriptor.backup_identifier,
            "Attempting compensation"
        );
        match migration.backward(self.session).await {
            Ok(()) => {
                log.record_rollback(migration.name());
                info!(migration = %migration.name(), "Compensation succeeded");
                true
            }
            Err(err) => {
                error!(
                    migration = %migration.name(),
                    error = %err,
                    "Compensation failed"
                );
                false
            }
        }
    }
}

fn elapsed_ms(started: DateTime<Utc>) -> i64 {
    (Utc::now() - started).num_milliseconds().max(0)
}
