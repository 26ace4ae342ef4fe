use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sqlward::utils::append_audit_line;
use sqlward::{
    connect, load_config, pre_destructive_check, BackupManager, ExecutionLog, ExecutionOptions,
    ExecutionResult, MigrationRunner, MigrationTarget, SqlScriptMigration, SqlSession,
    SqlwardConfig,
};

/// sqlward - guarded schema migrations with table backups and an execution ledger
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Database URL (postgres://... or sqlite://path; sqlite://:memory: works)
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Path to the JSON configuration file
    #[arg(long, env = "SQLWARD_CONFIG", default_value = "sqlward.json", global = true)]
    config: PathBuf,

    /// Durable migration-log table (overrides the config file)
    #[arg(long, global = true)]
    log_table: Option<String>,

    /// Append-only audit log file (overrides the config file)
    #[arg(long, global = true)]
    audit_log: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a migration from SQL scripts
    Run(RunArgs),
    /// Report what a run would do without executing anything
    DryRun(RunArgs),
    /// Execute a migration's backward script standalone
    Rollback(RunArgs),
    /// Run the pre-destructive check for a table
    Validate {
        /// Table to validate
        #[arg(long)]
        table: String,
        /// Column to validate inside the table
        #[arg(long)]
        column: Option<String>,
    },
    /// Manage table backups
    Backups {
        #[command(subcommand)]
        command: BackupCommand,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Migration name; keys the execution log
    #[arg(long)]
    name: String,

    /// Path to the forward SQL script
    #[arg(long)]
    forward: PathBuf,

    /// Path to the backward SQL script
    #[arg(long)]
    backward: PathBuf,

    /// Table the migration changes (enables validation and backup)
    #[arg(long)]
    table: Option<String>,

    /// Column the migration changes
    #[arg(long, requires = "table")]
    column: Option<String>,

    /// Bypass the backup step
    #[arg(long)]
    skip_backup: bool,

    /// Bypass pre-flight validation
    #[arg(long)]
    skip_validation: bool,

    /// Abort the run when validation reports errors
    #[arg(long)]
    fail_on_validation_errors: bool,
}

#[derive(Subcommand, Debug)]
enum BackupCommand {
    /// List backup tables in the current schema
    List,
    /// Drop a backup table (idempotent)
    Cleanup {
        /// Backup identifier, e.g. orders_backup_2026-08-25T10-30-45-123Z
        identifier: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("could not install tracing subscriber");
        return ExitCode::FAILURE;
    }

    let args = Args::parse();

    match execute(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!(error = %err, "Command failed");
            ExitCode::FAILURE
        }
    }
}

/// Resolve settings, run the requested command, and append one line to the
/// audit log whatever the outcome. `Ok(false)` means the command ran and
/// reported failure (non-zero exit without an error trace).
async fn execute(args: Args) -> anyhow::Result<bool> {
    // The audit path is resolved before any fallible step so that a failed
    // config load, URL resolution, or connect still gets its line.
    let loaded = load_config(&args.config).await;
    let config = match &loaded {
        Ok(found) => found.clone().unwrap_or_default(),
        Err(_) => SqlwardConfig::default(),
    };
    let audit_log = args
        .audit_log
        .clone()
        .unwrap_or_else(|| config.audit_log.clone());

    let outcome = match loaded {
        Ok(_) => connect_and_run(&args, &config).await,
        Err(err) => Err(err.into()),
    };

    let (line, success) = match &outcome {
        Ok((line, success)) => (line.clone(), *success),
        Err(err) => (
            format!("{} failed: {}", command_label(&args.command), err),
            false,
        ),
    };
    if let Err(audit_err) = append_audit_line(&audit_log, &line).await {
        warn!(error = %audit_err, "Could not write audit log line");
    }

    outcome.map(|_| success)
}

async fn connect_and_run(args: &Args, config: &SqlwardConfig) -> anyhow::Result<(String, bool)> {
    let database_url = args
        .database_url
        .clone()
        .or_else(|| config.database_url.clone())
        .context("no database URL given (use --database-url, DATABASE_URL, or the config file)")?;
    let log_table = args
        .log_table
        .clone()
        .unwrap_or_else(|| config.log_table.clone());

    let session = connect(&database_url).await?;
    run_command(args, config, session.as_ref(), &log_table).await
}

async fn run_command(
    args: &Args,
    config: &SqlwardConfig,
    session: &dyn SqlSession,
    log_table: &str,
) -> anyhow::Result<(String, bool)> {
    match &args.command {
        Command::Run(run) | Command::DryRun(run) | Command::Rollback(run) => {
            let dry_run = matches!(args.command, Command::DryRun(_));
            let rollback = matches!(args.command, Command::Rollback(_));

            let migration =
                SqlScriptMigration::from_files(&run.name, &run.forward, &run.backward).await?;
            let migration = match &run.table {
                Some(table) => {
                    let target = match &run.column {
                        Some(column) => MigrationTarget::column(table.as_str(), column.as_str()),
                        None => MigrationTarget::table(table.as_str()),
                    };
                    migration.with_target(target)
                }
                None => migration,
            };

            let options = ExecutionOptions {
                skip_backup: run.skip_backup,
                skip_validation: run.skip_validation,
                dry_run,
                fail_on_validation_errors: run.fail_on_validation_errors
                    || config.fail_on_validation_errors,
            };

            let mut log = ExecutionLog::new();
            let runner = MigrationRunner::new(session);
            let result = if rollback {
                runner.run_backward(&mut log, &migration, &options).await
            } else {
                runner.run(&mut log, &migration, &options).await
            };

            // A dry run must leave the database untouched, so the ledger is
            // not flushed for it.
            if !dry_run {
                log.flush(session, log_table).await?;
            }

            print_result(&result, args.json)?;

            let verb = if rollback {
                "rollback"
            } else if dry_run {
                "dry-run"
            } else {
                "run"
            };
            let line = format!(
                "{} {}: {}",
                verb,
                result.migration_name,
                if result.success { "success" } else { "failure" }
            );
            Ok((line, result.success))
        }
        Command::Validate { table, column } => {
            let outcome = pre_destructive_check(session, table, column.as_deref()).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                for error in &outcome.errors {
                    println!("error: {}", error);
                }
                for warning in &outcome.warnings {
                    println!("warning: {}", warning);
                }
                println!("{}", if outcome.valid { "valid" } else { "invalid" });
            }
            let line = format!(
                "validate {}: {}",
                table,
                if outcome.valid { "valid" } else { "invalid" }
            );
            Ok((line, outcome.valid))
        }
        Command::Backups { command } => match command {
            BackupCommand::List => {
                let backups = BackupManager::new(session).list_backups().await?;
                if args.json {
                    println!("{}", serde_json::to_string_pretty(&backups)?);
                } else if backups.is_empty() {
                    println!("no backups found");
                } else {
                    for name in &backups {
                        println!("{}", name);
                    }
                }
                Ok((format!("backups list: {} found", backups.len()), true))
            }
            BackupCommand::Cleanup { identifier } => {
                BackupManager::new(session).cleanup(identifier).await?;
                if args.json {
                    println!("{}", serde_json::json!({ "removed": identifier }));
                } else {
                    println!("removed {}", identifier);
                }
                Ok((format!("backups cleanup {}: success", identifier), true))
            }
        },
    }
}

fn print_result(result: &ExecutionResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    match &result.error {
        None => println!(
            "migration {} succeeded in {} ms",
            result.migration_name, result.duration_ms
        ),
        Some(error) => println!(
            "migration {} failed in {} ms: {}",
            result.migration_name, result.duration_ms, error
        ),
    }
    if let Some(validation) = &result.validation {
        for error in &validation.errors {
            println!("validation error: {}", error);
        }
        for warning in &validation.warnings {
            println!("validation warning: {}", warning);
        }
    }
    if let Some(backup) = &result.backup {
        println!(
            "backup: {} ({} rows)",
            backup.backup_identifier, backup.row_count
        );
    }
    Ok(())
}

fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Run(_) => "run",
        Command::DryRun(_) => "dry-run",
        Command::Rollback(_) => "rollback",
        Command::Validate { .. } => "validate",
        Command::Backups {
            command: BackupCommand::List,
        } => "backups list",
        Command::Backups {
            command: BackupCommand::Cleanup { .. },
        } => "backups cleanup",
    }
}
