//! Pre-destructive validation: the checks run before a migration touches
//! existing data or schema.

use serde::Serialize;
use tracing::{info, warn};

use crate::db::{DbError, SqlSession};
use crate::schema::SchemaInspector;

/// Aggregated result of one validation pass. Any error makes the outcome
/// invalid; warnings never do.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Validate `table` (and optionally one of its columns) ahead of a
/// destructive change.
///
/// A missing table or column short-circuits with a single error. Foreign
/// keys and an empty table only produce warnings; a populated table is
/// merely logged. Catalog query failures propagate unchanged.
pub async fn pre_destructive_check(
    session: &dyn SqlSession,
    table: &str,
    column: Option<&str>,
) -> Result<ValidationOutcome, DbError> {
    let inspector = SchemaInspector::new(session);
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if !inspector.table_exists(table).await? {
        warn!(table = %table, "Validation failed, table does not exist");
        errors.push("table does not exist".to_string());
        return Ok(ValidationOutcome {
            valid: false,
            errors,
            warnings,
        });
    }

    if let Some(column) = column {
        if !inspector.column_exists(table, column).await? {
            warn!(table = %table, column = %column, "Validation failed, column does not exist");
            errors.push("column does not exist".to_string());
            return Ok(ValidationOutcome {
                valid: false,
                errors,
                warnings,
            });
        }
    }

    let foreign_keys = inspector.foreign_key_count(table).await?;
    if foreign_keys > 0 {
        let message = format!("table has {} foreign key constraint(s)", foreign_keys);
        warn!(table = %table, count = foreign_keys, "Foreign key constraints present");
        warnings.push(message);
    }

    let rows = inspector.count_rows(table).await?;
    if rows == 0 {
        warn!(table = %table, "Table is empty");
        warnings.push("table is empty".to_string());
    } else {
        info!(table = %table, rows = rows, "Table holds data");
    }

    Ok(ValidationOutcome {
        valid: errors.is_empty(),
        errors,
        warnings,
    })
}
