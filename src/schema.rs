//! Live catalog introspection.

use std::collections::BTreeSet;

use rusqlite::Connection;

use crate::error::{ExportError, Result};

/// Column names of `table`, read from the catalog.
///
/// The table name is bound as a parameter. A table that does not exist has no
/// columns, which is reported as an introspection failure for that table.
pub fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let introspection = |reason: String| ExportError::Introspection {
        table: table.to_string(),
        reason,
    };

    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info(?1)")
        .map_err(|e| introspection(e.to_string()))?;
    let columns = stmt
        .query_map([table], |row| row.get::<_, String>(0))
        .map_err(|e| introspection(e.to_string()))?
        .collect::<std::result::Result<BTreeSet<_>, rusqlite::Error>>()
        .map_err(|e| introspection(e.to_string()))?;

    if columns.is_empty() {
        return Err(introspection("table does not exist".to_string()));
    }

    log::debug!("Table {} has {} columns", table, columns.len());
    Ok(columns)
}

/// Whether `table` exists in the catalog.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let mut stmt = conn.prepare(
        "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
    )?;
    Ok(stmt.exists([table])?)
}
