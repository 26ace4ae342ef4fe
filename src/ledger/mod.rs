//! In-memory ledger of migration attempts.
//!
//! The log lives for one run (or one process, the caller decides) and is
//! passed into the orchestrator explicitly. Flushing appends every record to
//! a durable table readable by external tools.

pub mod record;

pub use record::{MigrationRecord, MigrationStatus};

use std::collections::HashMap;

use chrono::SecondsFormat;
use thiserror::Error;
use tracing::{debug, info};

use crate::db::{quote_ident, quote_literal, DbError, SqlSession};

/// Default name of the durable log table.
pub const DEFAULT_LOG_TABLE: &str = "migration_log";

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Db(#[from] DbError),
    #[error("metadata serialization failed: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Ordered collection of migration records, keyed by name.
///
/// Recording a start under an existing name overwrites that record in place
/// (last write wins, insertion position kept). Completion calls for names
/// that are not in the expected state are silently ignored.
#[derive(Debug, Default)]
pub struct ExecutionLog {
    records: Vec<MigrationRecord>,
    index: HashMap<String, usize>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or overwrite) a `Started` record for `name`.
    pub fn record_start(&mut self, name: &str) {
        let record = MigrationRecord::started(name);
        match self.index.get(name) {
            Some(&position) => {
                debug!(migration = %name, "Overwriting prior record with same name");
                self.records[position] = record;
            }
            None => {
                self.index.insert(name.to_string(), self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Transition `Started` to `Success`, stamping end time and duration and
    /// attaching `metadata`.
    pub fn record_success(&mut self, name: &str, metadata: HashMap<String, serde_json::Value>) {
        if let Some(record) = self.in_status(name, MigrationStatus::Started) {
            record.finish(MigrationStatus::Success);
            record.metadata.extend(metadata);
        }
    }

    /// Transition `Started` to `Failed`, stamping end time, duration and the
    /// error message.
    pub fn record_failure(&mut self, name: &str, error_message: impl Into<String>) {
        if let Some(record) = self.in_status(name, MigrationStatus::Started) {
            record.error_message = Some(error_message.into());
            record.finish(MigrationStatus::Failed);
        }
    }

    /// Transition `Failed` to `RolledBack`. Status only; timing stays as the
    /// failure stamped it.
    pub fn record_rollback(&mut self, name: &str) {
        if let Some(record) = self.in_status(name, MigrationStatus::Failed) {
            record.status = MigrationStatus::RolledBack;
        }
    }

    pub fn get(&self, name: &str) -> Option<&MigrationRecord> {
        let position = *self.index.get(name)?;
        self.records.get(position)
    }

    /// All records in insertion order.
    pub fn all(&self) -> &[MigrationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn in_status(&mut self, name: &str, status: MigrationStatus) -> Option<&mut MigrationRecord> {
        let position = *self.index.get(name)?;
        let record = &mut self.records[position];
        if record.status == status {
            Some(record)
        } else {
            None
        }
    }

    /// Append every in-memory record to the durable log table, creating the
    /// table first if needed.
    ///
    /// No deduplication happens here: flushing twice writes every record
    /// twice. Callers flush once per run. Returns the number of rows written.
    pub async fn flush(&self, session: &dyn SqlSession, table: &str) -> Result<usize, LedgerError> {
        session
            .execute(&session.dialect().create_log_table(table))
            .await?;
        for record in &self.records {
            let sql = insert_row_sql(table, record)?;
            session.execute(&sql).await?;
        }
        info!(table = %table, rows = self.records.len(), "Flushed execution log");
        Ok(self.records.len())
    }
}

fn insert_row_sql(table: &str, record: &MigrationRecord) -> Result<String, serde_json::Error> {
    let metadata = serde_json::to_string(&record.metadata)?;
    let end_time = match &record.end_time {
        Some(end) => quote_literal(&end.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => "NULL".to_string(),
    };
    // An unfinished record has no meaningful duration; store NULL, not 0.
    let duration = match record.end_time {
        Some(_) => record.duration_ms.to_string(),
        None => "NULL".to_string(),
    };
    let error_message = match &record.error_message {
        Some(message) => quote_literal(message),
        None => "NULL".to_string(),
    };
    Ok(format!(
        "INSERT INTO {} (migration_name, status, start_time, end_time, duration, error_message, metadata) \
         VALUES ({}, {}, {}, {}, {}, {}, {})",
        quote_ident(table),
        quote_literal(&record.name),
        quote_literal(&record.status.to_string()),
        quote_literal(
            &record
                .start_time
                .to_rfc3339_opts(SecondsFormat::Millis, true)
        ),
        end_time,
        duration,
        error_message,
        quote_literal(&metadata),
    ))
}
