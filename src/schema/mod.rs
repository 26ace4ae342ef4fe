//! Schema inspection and guarded DDL.

pub mod guard;
pub mod inspector;

pub use guard::{ColumnDefault, ColumnSpec, DdlGuard, SqlFragment};
pub use inspector::SchemaInspector;
