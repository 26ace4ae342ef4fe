//! Migrations expressed as plain SQL scripts.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::db::SqlSession;

use super::types::{Migration, MigrationError, MigrationTarget};

/// A migration whose forward and backward steps are SQL scripts.
///
/// Scripts are split on `;` boundaries and executed one statement at a
/// time, in order, inside the transaction the runner opens. Splitting is
/// textual; semicolons inside string literals are not supported.
pub struct SqlScriptMigration {
    name: String,
    target: Option<MigrationTarget>,
    forward_sql: String,
    backward_sql: String,
}

impl SqlScriptMigration {
    pub fn new(
        name: impl Into<String>,
        forward_sql: impl Into<String>,
        backward_sql: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: None,
            forward_sql: forward_sql.into(),
            backward_sql: backward_sql.into(),
        }
    }

    /// Declare the table (and optionally column) the scripts change, which
    /// enables validation and backup for this migration.
    pub fn with_target(mut self, target: MigrationTarget) -> Self {
        self.target = Some(target);
        self
    }

    /// Load forward and backward scripts from files.
    pub async fn from_files(
        name: impl Into<String>,
        forward_path: &Path,
        backward_path: &Path,
    ) -> Result<Self, MigrationError> {
        let forward_sql = fs::read_to_string(forward_path).await?;
        let backward_sql = fs::read_to_string(backward_path).await?;
        Ok(Self::new(name, forward_sql, backward_sql))
    }
}

#[async_trait]
impl Migration for SqlScriptMigration {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> Option<MigrationTarget> {
        self.target.clone()
    }

    async fn forward(&self, session: &dyn SqlSession) -> Result<(), MigrationError> {
        run_script(session, &self.forward_sql).await
    }

    async fn backward(&self, session: &dyn SqlSession) -> Result<(), MigrationError> {
        run_script(session, &self.backward_sql).await
    }
}

async fn run_script(session: &dyn SqlSession, script: &str) -> Result<(), MigrationError> {
    for statement in statements(script) {
        debug!(statement = %statement, "Executing statement");
        session.execute(&statement).await?;
    }
    Ok(())
}

/// Split a script into executable statements, dropping `--` comment lines
/// and blank chunks.
fn statements(script: &str) -> Vec<String> {
    script
        .split(';')
        .map(|chunk| {
            chunk
                .lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|statement| !statement.is_empty())
        .collect()
}
