use std::collections::HashMap;

use sqlward::{ExecutionLog, SqlSession, SqliteSession, DEFAULT_LOG_TABLE};

fn fresh_session() -> SqliteSession {
    SqliteSession::in_memory().expect("in-memory database should open")
}

#[tokio::test]
async fn test_flush_creates_table_and_appends_rows() {
    let session = fresh_session();
    let mut log = ExecutionLog::new();

    log.record_start("add_prefs");
    log.record_success("add_prefs", HashMap::new());
    log.record_start("drop_legacy");
    log.record_failure("drop_legacy", "column type invalid");

    let written = log
        .flush(&session, DEFAULT_LOG_TABLE)
        .await
        .expect("Should flush");
    assert_eq!(written, 2);

    let rows = session
        .query_count("SELECT COUNT(*) FROM migration_log")
        .await
        .unwrap();
    assert_eq!(rows, 2);

    let failed = session
        .query_names(
            "SELECT error_message FROM migration_log WHERE migration_name = 'drop_legacy'",
        )
        .await
        .unwrap();
    assert_eq!(failed, vec!["column type invalid".to_string()]);
}

#[tokio::test]
async fn test_double_flush_duplicates_rows() {
    let session = fresh_session();
    let mut log = ExecutionLog::new();
    log.record_start("add_prefs");
    log.record_success("add_prefs", HashMap::new());

    log.flush(&session, DEFAULT_LOG_TABLE).await.unwrap();
    log.flush(&session, DEFAULT_LOG_TABLE).await.unwrap();

    // Flushing never deduplicates; two flushes mean two rows per record.
    let rows = session
        .query_count("SELECT COUNT(*) FROM migration_log WHERE migration_name = 'add_prefs'")
        .await
        .unwrap();
    assert_eq!(rows, 2);
}

#[tokio::test]
async fn test_unfinished_record_flushes_with_nulls() {
    let session = fresh_session();
    let mut log = ExecutionLog::new();
    log.record_start("in_flight");

    log.flush(&session, DEFAULT_LOG_TABLE).await.unwrap();

    let rows = session
        .query_count(
            "SELECT COUNT(*) FROM migration_log \
             WHERE migration_name = 'in_flight' AND status = 'started' \
             AND end_time IS NULL AND duration IS NULL",
        )
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_flush_to_custom_table() {
    let session = fresh_session();
    let mut log = ExecutionLog::new();
    log.record_start("add_prefs");
    log.record_success("add_prefs", HashMap::new());

    log.flush(&session, "audit_migrations").await.unwrap();

    let rows = session
        .query_count("SELECT COUNT(*) FROM audit_migrations")
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_metadata_stored_as_json() {
    let session = fresh_session();
    let mut log = ExecutionLog::new();
    log.record_start("add_prefs");
    let mut metadata = HashMap::new();
    metadata.insert("backup_created".to_string(), serde_json::json!(true));
    metadata.insert(
        "backup_identifier".to_string(),
        serde_json::json!("users_backup_2026-08-25T10-30-45-123Z"),
    );
    log.record_success("add_prefs", metadata);

    log.flush(&session, DEFAULT_LOG_TABLE).await.unwrap();

    let stored = session
        .query_names("SELECT metadata FROM migration_log")
        .await
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stored[0]).unwrap();
    assert_eq!(parsed["backup_created"], serde_json::json!(true));
    assert_eq!(
        parsed["backup_identifier"],
        serde_json::json!("users_backup_2026-08-25T10-30-45-123Z")
    );
}

#[tokio::test]
async fn test_durable_columns_match_contract() {
    let session = fresh_session();
    let log = ExecutionLog::new();
    log.flush(&session, DEFAULT_LOG_TABLE).await.unwrap();

    // External tools read this table; the column set is part of the
    // interface.
    let columns = session
        .query_names("SELECT name FROM pragma_table_info('migration_log')")
        .await
        .unwrap();
    assert_eq!(
        columns,
        vec![
            "migration_name".to_string(),
            "status".to_string(),
            "start_time".to_string(),
            "end_time".to_string(),
            "duration".to_string(),
            "error_message".to_string(),
            "metadata".to_string(),
            "created_at".to_string(),
        ]
    );
}
