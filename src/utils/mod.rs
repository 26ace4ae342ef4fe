//! Utility functions.

use std::io;
use std::path::Path;

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Get the current time as an ISO 8601 string.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Append one timestamped line to the append-only audit log, creating the
/// file if it does not exist.
pub async fn append_audit_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(format!("{} {}\n", now_iso(), line).as_bytes())
        .await?;
    Ok(())
}
