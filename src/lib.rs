pub mod backup;
pub mod config;
pub mod db;
pub mod ledger;
pub mod runner;
pub mod schema;
pub mod utils;
pub mod validate;

// Re-export commonly used types
pub use backup::{BackupDescriptor, BackupError, BackupManager};
pub use config::{load_config, ConfigError, SqlwardConfig};
pub use db::{
    connect, quote_ident, quote_literal, DbError, Dialect, PostgresSession, SqlSession,
    SqliteSession,
};
pub use ledger::{ExecutionLog, LedgerError, MigrationRecord, MigrationStatus, DEFAULT_LOG_TABLE};
pub use runner::{
    ExecutionOptions, ExecutionResult, Migration, MigrationError, MigrationRunner,
    MigrationTarget, RunOutcome, SqlScriptMigration,
};
pub use schema::{ColumnDefault, ColumnSpec, DdlGuard, SchemaInspector, SqlFragment};
pub use validate::{pre_destructive_check, ValidationOutcome};
