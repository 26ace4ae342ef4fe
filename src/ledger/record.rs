//! Record types for the execution ledger.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of one migration attempt. Transitions only move forward:
/// `Started` to `Success` or `Failed`, and `Failed` to `RolledBack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Started,
    Success,
    Failed,
    RolledBack,
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MigrationStatus::Started => "started",
            MigrationStatus::Success => "success",
            MigrationStatus::Failed => "failed",
            MigrationStatus::RolledBack => "rolled_back",
        };
        f.write_str(label)
    }
}

/// One named migration attempt.
///
/// `duration_ms` is wall-clock milliseconds between start and completion,
/// clamped to 0 under clock skew; it stays 0 while the attempt is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub name: String,
    pub status: MigrationStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: i64,
    pub error_message: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl MigrationRecord {
    /// A fresh record in `Started` state, stamped now.
    pub fn started(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: MigrationStatus::Started,
            start_time: Utc::now(),
            end_time: None,
            duration_ms: 0,
            error_message: None,
            metadata: HashMap::new(),
        }
    }

    /// Stamp completion: status, end time, clamped duration.
    pub(crate) fn finish(&mut self, status: MigrationStatus) {
        let end = Utc::now();
        self.duration_ms = (end - self.start_time).num_milliseconds().max(0);
        self.end_time = Some(end);
        self.status = status;
    }
}
