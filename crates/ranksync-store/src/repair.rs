//! One-shot repair of legacy rank tables that were created without a key.
//!
//! Older deployments let the same player accumulate several rows. Before the
//! synchronizer can upsert by `steam`, duplicates are collapsed to one row per
//! player and `steam` becomes the primary key. Survivor per player: the row
//! with the greatest `lastconnect`; among exact ties, the earliest inserted.

use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, error, info};

use crate::db::{has_primary_key, open_connection, table_columns, ColumnInfo, TableRef};
use crate::error::{Result, StoreError};

/// Temporary insertion-order column used for the tie-break.
const SURROGATE_COLUMN: &str = "repair_seq";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    /// A primary key was already present; nothing changed.
    AlreadyKeyed,
    /// Duplicates were removed and the key installed.
    Repaired { removed: usize },
    /// The table was left as it was.
    Failed(String),
}

impl RepairOutcome {
    pub fn is_keyed(&self) -> bool {
        !matches!(self, RepairOutcome::Failed(_))
    }
}

/// Run the repair against the database at `path`. Never fails: errors are
/// logged and reported as [`RepairOutcome::Failed`].
pub fn repair_schema(path: &Path, table: &TableRef) -> RepairOutcome {
    debug!(table = %table, "ensuring primary key exists");
    let result = open_connection(path).and_then(|mut conn| ensure_primary_key(&mut conn, table));
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(table = %table, "schema repair failed: {e}");
            RepairOutcome::Failed(e.to_string())
        }
    }
}

/// Deduplicate `table` and key it by `steam`, unless it already has a
/// primary key. All steps share one transaction.
pub fn ensure_primary_key(conn: &mut Connection, table: &TableRef) -> Result<RepairOutcome> {
    if has_primary_key(conn, table)? {
        info!(table = %table, "primary key already exists");
        return Ok(RepairOutcome::AlreadyKeyed);
    }

    let columns = table_columns(conn, table)?;
    for required in ["steam", "lastconnect"] {
        if !columns.iter().any(|c| c.name.eq_ignore_ascii_case(required)) {
            return Err(StoreError::SchemaRepairFailed(format!(
                "{table} has no `{required}` column"
            )));
        }
    }
    if columns.iter().any(|c| c.name.eq_ignore_ascii_case(SURROGATE_COLUMN)) {
        return Err(StoreError::SchemaRepairFailed(format!(
            "{table} already has a `{SURROGATE_COLUMN}` column"
        )));
    }

    debug!(table = %table, "no primary key found, starting cleanup");
    let qualified = table.qualified();
    let tx = conn.transaction()?;

    // 1. Surrogate column holding insertion order.
    tx.execute_batch(&format!(
        "ALTER TABLE {qualified} ADD COLUMN {SURROGATE_COLUMN} INTEGER;
         UPDATE {qualified} SET {SURROGATE_COLUMN} = rowid;"
    ))?;

    // 2. Keep one representative per player.
    let removed = tx.execute(
        &format!(
            "DELETE FROM {qualified}
             WHERE {SURROGATE_COLUMN} NOT IN (
                 SELECT MIN(t1.{SURROGATE_COLUMN})
                 FROM {qualified} AS t1
                 JOIN (
                     SELECT steam, MAX(COALESCE(lastconnect, 0)) AS max_lastconnect
                     FROM {qualified}
                     GROUP BY steam
                 ) AS t2
                   ON t1.steam = t2.steam
                  AND COALESCE(t1.lastconnect, 0) = t2.max_lastconnect
                 GROUP BY t1.steam
             )"
        ),
        [],
    )?;
    debug!(table = %table, removed, "duplicate records cleaned");

    // 3. Drop the surrogate again.
    tx.execute_batch(&format!(
        "ALTER TABLE {qualified} DROP COLUMN {SURROGATE_COLUMN};"
    ))?;

    // 4. SQLite cannot add a primary key in place: rebuild under the same name.
    debug!(table = %table, "creating primary key");
    let rebuilt = format!("{}__keyed", table.table());
    let rebuilt_ref = TableRef::new(table.schema(), rebuilt.as_str())?;
    let names = columns
        .iter()
        .map(|c| quote(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    tx.execute_batch(&format!(
        "CREATE TABLE {} ({}, PRIMARY KEY (steam));
         INSERT INTO {} ({names}) SELECT {names} FROM {qualified};
         DROP TABLE {qualified};
         ALTER TABLE {} RENAME TO {};",
        rebuilt_ref.qualified(),
        column_definitions(&columns),
        rebuilt_ref.qualified(),
        rebuilt_ref.qualified(),
        quote(table.table()),
    ))?;

    tx.commit()?;
    info!(table = %table, removed, "primary key added");
    Ok(RepairOutcome::Repaired { removed })
}

fn column_definitions(columns: &[ColumnInfo]) -> String {
    columns
        .iter()
        .map(|c| {
            let mut def = quote(&c.name);
            if !c.decl_type.is_empty() {
                def.push(' ');
                def.push_str(&c.decl_type);
            }
            if c.not_null {
                def.push_str(" NOT NULL");
            }
            if let Some(default) = &c.default {
                def.push_str(" DEFAULT ");
                def.push_str(default);
            }
            def
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_definitions_keep_type_constraints_and_defaults() {
        let columns = vec![
            ColumnInfo {
                name: "steam".into(),
                decl_type: "TEXT".into(),
                not_null: true,
                default: None,
                pk: 0,
            },
            ColumnInfo {
                name: "name".into(),
                decl_type: "VARCHAR(64)".into(),
                not_null: false,
                default: Some("'Unknown'".into()),
                pk: 0,
            },
            ColumnInfo {
                name: "note".into(),
                decl_type: String::new(),
                not_null: false,
                default: None,
                pk: 0,
            },
        ];
        assert_eq!(
            column_definitions(&columns),
            "\"steam\" TEXT NOT NULL, \"name\" VARCHAR(64) DEFAULT 'Unknown', \"note\""
        );
    }

    #[test]
    fn quote_escapes_embedded_quotes() {
        assert_eq!(quote("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn failed_outcome_is_not_keyed() {
        assert!(!RepairOutcome::Failed("x".into()).is_keyed());
        assert!(RepairOutcome::AlreadyKeyed.is_keyed());
        assert!(RepairOutcome::Repaired { removed: 0 }.is_keyed());
    }
}
