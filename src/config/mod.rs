use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Default name of the durable migration-log table.
fn default_log_table() -> String {
    crate::ledger::DEFAULT_LOG_TABLE.to_string()
}

/// Default path of the append-only audit log file.
fn default_audit_log() -> PathBuf {
    PathBuf::from("sqlward.log")
}

/// Tool configuration, read from a JSON file.
///
/// Command-line flags override these values; `DATABASE_URL` fills in a
/// missing database URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlwardConfig {
    /// Database to operate on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Name of the durable migration-log table.
    #[serde(default = "default_log_table")]
    pub log_table: String,
    /// Append-only audit log file.
    #[serde(default = "default_audit_log")]
    pub audit_log: PathBuf,
    /// Abort runs whose pre-flight validation reports errors.
    #[serde(default)]
    pub fail_on_validation_errors: bool,
}

impl Default for SqlwardConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            log_table: default_log_table(),
            audit_log: default_audit_log(),
            fail_on_validation_errors: false,
        }
    }
}

/// Read the configuration file. A missing file is `Ok(None)`, not an error.
pub async fn load_config(path: &Path) -> Result<Option<SqlwardConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).await?;
    let config: SqlwardConfig = serde_json::from_str(&content)?;
    Ok(Some(config))
}
