mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::{seed_users, test_session};
use sqlward::{
    BackupManager, ExecutionLog, ExecutionOptions, Migration, MigrationError, MigrationRunner,
    MigrationStatus, MigrationTarget, RunOutcome, SchemaInspector, SqlScriptMigration, SqlSession,
};

/// Migration that counts invocations and can be told to fail either
/// direction.
struct RecordingMigration {
    name: String,
    target: Option<MigrationTarget>,
    fail_forward: bool,
    fail_backward: bool,
    forward_calls: AtomicUsize,
    backward_calls: AtomicUsize,
}

impl RecordingMigration {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            target: None,
            fail_forward: false,
            fail_backward: false,
            forward_calls: AtomicUsize::new(0),
            backward_calls: AtomicUsize::new(0),
        }
    }

    fn targeting(mut self, target: MigrationTarget) -> Self {
        self.target = Some(target);
        self
    }

    fn failing_forward(mut self) -> Self {
        self.fail_forward = true;
        self
    }

    fn failing_backward(mut self) -> Self {
        self.fail_backward = true;
        self
    }

    fn forward_count(&self) -> usize {
        self.forward_calls.load(Ordering::SeqCst)
    }

    fn backward_count(&self) -> usize {
        self.backward_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Migration for RecordingMigration {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> Option<MigrationTarget> {
        self.target.clone()
    }

    async fn forward(&self, session: &dyn SqlSession) -> Result<(), MigrationError> {
        self.forward_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_forward {
            return Err(MigrationError::failed("column type invalid"));
        }
        session
            .execute("INSERT INTO users (email, plan) VALUES ('new@example.com', 'pro')")
            .await?;
        Ok(())
    }

    async fn backward(&self, session: &dyn SqlSession) -> Result<(), MigrationError> {
        self.backward_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_backward {
            return Err(MigrationError::failed("backward also broken"));
        }
        session
            .execute("DELETE FROM users WHERE email = 'new@example.com'")
            .await?;
        Ok(())
    }
}

#[tokio::test]
async fn test_dry_run_never_invokes_change_functions() {
    let session = test_session();
    seed_users(&session).await;
    let migration = RecordingMigration::new("add_row").targeting(MigrationTarget::table("users"));
    let runner = MigrationRunner::new(&session);
    let mut log = ExecutionLog::new();
    let options = ExecutionOptions {
        dry_run: true,
        ..Default::default()
    };

    let result = runner.run(&mut log, &migration, &options).await;

    assert!(result.success);
    assert_eq!(result.outcome, RunOutcome::DryRun);
    assert_eq!(migration.forward_count(), 0);
    assert_eq!(migration.backward_count(), 0);
    assert!(result.backup.is_none());
    assert!(result.validation.is_none());

    // Still recorded as a success.
    assert_eq!(log.get("add_row").unwrap().status, MigrationStatus::Success);

    // Zero side effects: no new row, no backup table.
    let inspector = SchemaInspector::new(&session);
    assert_eq!(inspector.count_rows("users").await.unwrap(), 3);
    let backups = BackupManager::new(&session).list_backups().await.unwrap();
    assert!(backups.is_empty());
}

#[tokio::test]
async fn test_successful_run_commits_with_backup_and_validation() {
    let session = test_session();
    seed_users(&session).await;
    let migration = RecordingMigration::new("add_row").targeting(MigrationTarget::table("users"));
    let runner = MigrationRunner::new(&session);
    let mut log = ExecutionLog::new();

    let result = runner
        .run(&mut log, &migration, &ExecutionOptions::default())
        .await;

    assert!(result.success);
    assert_eq!(result.outcome, RunOutcome::Committed);
    assert!(result.error.is_none());
    assert!(result.duration_ms >= 0);
    assert_eq!(migration.forward_count(), 1);
    assert_eq!(migration.backward_count(), 0);

    let validation = result.validation.expect("validation should have run");
    assert!(validation.valid);

    let backup = result.backup.expect("backup should have been taken");
    assert_eq!(backup.source_table, "users");
    assert_eq!(backup.row_count, 3);

    let inspector = SchemaInspector::new(&session);
    assert_eq!(inspector.count_rows("users").await.unwrap(), 4);

    let record = log.get("add_row").unwrap();
    assert_eq!(record.status, MigrationStatus::Success);
    assert_eq!(record.metadata["backup_created"], serde_json::json!(true));
    assert_eq!(
        record.metadata["backup_identifier"],
        serde_json::json!(backup.backup_identifier)
    );
}

#[tokio::test]
async fn test_forward_failure_with_backup_compensates_once() {
    let session = test_session();
    seed_users(&session).await;
    let migration = RecordingMigration::new("bad_change")
        .targeting(MigrationTarget::table("users"))
        .failing_forward();
    let runner = MigrationRunner::new(&session);
    let mut log = ExecutionLog::new();

    let result = runner
        .run(&mut log, &migration, &ExecutionOptions::default())
        .await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("column type invalid"));
    assert_eq!(
        result.outcome,
        RunOutcome::RolledBack {
            compensated: Some(true)
        }
    );
    assert_eq!(migration.forward_count(), 1);
    assert_eq!(migration.backward_count(), 1);

    let record = log.get("bad_change").unwrap();
    assert_eq!(record.status, MigrationStatus::RolledBack);
    assert_eq!(record.error_message.as_deref(), Some("column type invalid"));

    // The transaction is closed; the session stays usable.
    let inspector = SchemaInspector::new(&session);
    assert_eq!(inspector.count_rows("users").await.unwrap(), 3);
}

#[tokio::test]
async fn test_compensation_failure_keeps_original_error() {
    let session = test_session();
    seed_users(&session).await;
    let migration = RecordingMigration::new("bad_change")
        .targeting(MigrationTarget::table("users"))
        .failing_forward()
        .failing_backward();
    let runner = MigrationRunner::new(&session);
    let mut log = ExecutionLog::new();

    let result = runner
        .run(&mut log, &migration, &ExecutionOptions::default())
        .await;

    assert!(!result.success);
    // The compensation error is logged, never returned.
    assert_eq!(result.error.as_deref(), Some("column type invalid"));
    assert_eq!(
        result.outcome,
        RunOutcome::RolledBack {
            compensated: Some(false)
        }
    );
    assert_eq!(migration.backward_count(), 1);

    // Compensation failed, so the record stays Failed.
    let record = log.get("bad_change").unwrap();
    assert_eq!(record.status, MigrationStatus::Failed);
    assert_eq!(record.error_message.as_deref(), Some("column type invalid"));
}

#[tokio::test]
async fn test_forward_failure_without_backup_skips_compensation() {
    let session = test_session();
    seed_users(&session).await;
    let migration = RecordingMigration::new("bad_change")
        .targeting(MigrationTarget::table("users"))
        .failing_forward();
    let runner = MigrationRunner::new(&session);
    let mut log = ExecutionLog::new();
    let options = ExecutionOptions {
        skip_backup: true,
        ..Default::default()
    };

    let result = runner.run(&mut log, &migration, &options).await;

    assert!(!result.success);
    assert_eq!(
        result.outcome,
        RunOutcome::RolledBack { compensated: None }
    );
    assert_eq!(migration.backward_count(), 0);
    assert_eq!(log.get("bad_change").unwrap().status, MigrationStatus::Failed);
}

#[tokio::test]
async fn test_validation_errors_abort_when_configured() {
    let session = test_session();
    let migration = RecordingMigration::new("bad_target")
        .targeting(MigrationTarget::table("missing"));
    let runner = MigrationRunner::new(&session);
    let mut log = ExecutionLog::new();
    let options = ExecutionOptions {
        fail_on_validation_errors: true,
        ..Default::default()
    };

    let result = runner.run(&mut log, &migration, &options).await;

    assert!(!result.success);
    assert_eq!(result.outcome, RunOutcome::ValidationFailed);
    assert_eq!(migration.forward_count(), 0);
    let error = result.error.unwrap();
    assert!(error.contains("table does not exist"));
    let validation = result.validation.unwrap();
    assert!(!validation.valid);
    assert_eq!(log.get("bad_target").unwrap().status, MigrationStatus::Failed);
}

#[tokio::test]
async fn test_invalid_validation_is_advisory_by_default() {
    let session = test_session();
    let migration = RecordingMigration::new("bad_target")
        .targeting(MigrationTarget::table("missing"));
    let runner = MigrationRunner::new(&session);
    let mut log = ExecutionLog::new();

    // Validation finds the missing table but only advises; the run then
    // dies on the backup step instead, which is fatal by design.
    let result = runner
        .run(&mut log, &migration, &ExecutionOptions::default())
        .await;

    assert!(!result.success);
    assert_eq!(result.outcome, RunOutcome::BackupFailed);
    assert_eq!(migration.forward_count(), 0);
    assert!(result.error.unwrap().starts_with("backup failed:"));
    assert_eq!(log.get("bad_target").unwrap().status, MigrationStatus::Failed);
}

#[tokio::test]
async fn test_no_target_skips_validation_and_backup() {
    let session = test_session();
    seed_users(&session).await;
    let migration = RecordingMigration::new("untargeted");
    let runner = MigrationRunner::new(&session);
    let mut log = ExecutionLog::new();

    let result = runner
        .run(&mut log, &migration, &ExecutionOptions::default())
        .await;

    assert!(result.success);
    assert_eq!(result.outcome, RunOutcome::Committed);
    assert!(result.validation.is_none());
    assert!(result.backup.is_none());
    let record = log.get("untargeted").unwrap();
    assert_eq!(record.metadata["backup_created"], serde_json::json!(false));
}

#[tokio::test]
async fn test_run_backward_standalone() {
    let session = test_session();
    seed_users(&session).await;
    session
        .execute("INSERT INTO users (email, plan) VALUES ('new@example.com', 'pro')")
        .await
        .unwrap();
    let migration = RecordingMigration::new("add_row").targeting(MigrationTarget::table("users"));
    let runner = MigrationRunner::new(&session);
    let mut log = ExecutionLog::new();

    let result = runner
        .run_backward(&mut log, &migration, &ExecutionOptions::default())
        .await;

    assert!(result.success);
    assert_eq!(result.outcome, RunOutcome::Committed);
    assert_eq!(migration.forward_count(), 0);
    assert_eq!(migration.backward_count(), 1);

    let record = log.get("add_row").unwrap();
    assert_eq!(record.status, MigrationStatus::Success);
    assert_eq!(record.metadata["operation"], serde_json::json!("rollback"));

    let inspector = SchemaInspector::new(&session);
    assert_eq!(inspector.count_rows("users").await.unwrap(), 3);
}

#[tokio::test]
async fn test_run_backward_failure_rolls_back() {
    let session = test_session();
    seed_users(&session).await;
    let migration = RecordingMigration::new("add_row").failing_backward();
    let runner = MigrationRunner::new(&session);
    let mut log = ExecutionLog::new();

    let result = runner
        .run_backward(&mut log, &migration, &ExecutionOptions::default())
        .await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("backward also broken"));
    assert_eq!(
        result.outcome,
        RunOutcome::RolledBack { compensated: None }
    );
    assert_eq!(log.get("add_row").unwrap().status, MigrationStatus::Failed);
}

#[tokio::test]
async fn test_failed_run_with_skips_reports_original_error() {
    let session = test_session();
    seed_users(&session).await;
    let migration = RecordingMigration::new("AddPrefs").failing_forward();
    let runner = MigrationRunner::new(&session);
    let mut log = ExecutionLog::new();
    let options = ExecutionOptions {
        skip_backup: true,
        skip_validation: true,
        ..Default::default()
    };

    let result = runner.run(&mut log, &migration, &options).await;

    assert!(!result.success);
    assert_eq!(result.migration_name, "AddPrefs");
    assert_eq!(result.error.as_deref(), Some("column type invalid"));
    assert!(result.duration_ms >= 0);

    let record = log.get("AddPrefs").unwrap();
    assert_eq!(record.status, MigrationStatus::Failed);
    assert_eq!(record.error_message.as_deref(), Some("column type invalid"));
}

#[tokio::test]
async fn test_script_migration_round_trip() {
    let session = test_session();
    seed_users(&session).await;
    let migration = SqlScriptMigration::new(
        "add_prefs_column",
        "-- add the prefs column\nALTER TABLE users ADD COLUMN prefs TEXT;",
        "ALTER TABLE users DROP COLUMN prefs;",
    )
    .with_target(MigrationTarget::table("users"));
    let runner = MigrationRunner::new(&session);
    let inspector = SchemaInspector::new(&session);

    let mut log = ExecutionLog::new();
    let result = runner
        .run(&mut log, &migration, &ExecutionOptions::default())
        .await;
    assert!(result.success);
    assert!(inspector.column_exists("users", "prefs").await.unwrap());

    let mut log = ExecutionLog::new();
    let result = runner
        .run_backward(&mut log, &migration, &ExecutionOptions::default())
        .await;
    assert!(result.success);
    assert!(!inspector.column_exists("users", "prefs").await.unwrap());
}
