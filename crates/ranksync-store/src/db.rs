use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Lock wait before a statement gives up with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Columns of the rank table, in storage order.
pub const RANK_COLUMNS: &str = "steam, name, value, rank, kills, deaths, shoots, hits, \
     headshots, assists, round_win, round_lose, playtime, lastconnect";

/// Open a fresh connection for one logical operation.
pub fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).map_err(|source| StoreError::Unavailable {
        path: path.display().to_string(),
        source,
    })?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

/// A validated `schema.table` pair, safe to splice into SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    schema: String,
    table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Result<Self> {
        let schema = schema.into();
        let table = table.into();
        validate_identifier(&schema)?;
        validate_identifier(&table)?;
        Ok(Self { schema, table })
    }

    /// Table in the `main` schema.
    pub fn main(table: impl Into<String>) -> Result<Self> {
        Self::new("main", table)
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// `"schema"."table"`
    pub fn qualified(&self) -> String {
        format!("\"{}\".\"{}\"", self.schema, self.table)
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

fn validate_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidTableName(name.to_string()))
    }
}

/// Create the rank table in its legacy, unkeyed layout if it does not exist.
///
/// The ranking system owns this table; the layout here mirrors what it
/// creates so a fresh database behaves like a production one. Schema repair
/// installs the primary key afterwards.
pub fn ensure_rank_table(conn: &Connection, table: &TableRef) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            steam       TEXT    NOT NULL,
            name        TEXT    NOT NULL DEFAULT '',
            value       INTEGER NOT NULL DEFAULT 0,
            rank        INTEGER NOT NULL DEFAULT 0,
            kills       INTEGER NOT NULL DEFAULT 0,
            deaths      INTEGER NOT NULL DEFAULT 0,
            shoots      INTEGER NOT NULL DEFAULT 0,
            hits        INTEGER NOT NULL DEFAULT 0,
            headshots   INTEGER NOT NULL DEFAULT 0,
            assists     INTEGER NOT NULL DEFAULT 0,
            round_win   INTEGER NOT NULL DEFAULT 0,
            round_lose  INTEGER NOT NULL DEFAULT 0,
            playtime    INTEGER NOT NULL DEFAULT 0,
            lastconnect INTEGER NOT NULL DEFAULT 0
        );",
        table.qualified()
    ))?;
    Ok(())
}

/// One row of `pragma_table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    /// Default expression as SQL text.
    pub default: Option<String>,
    /// 1-based position in the primary key, 0 if not part of it.
    pub pk: i64,
}

pub fn table_columns(conn: &Connection, table: &TableRef) -> Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", dflt_value, pk
         FROM pragma_table_info(?1, ?2) ORDER BY cid",
    )?;
    let columns = stmt
        .query_map([table.table(), table.schema()], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                decl_type: row.get(1)?,
                not_null: row.get::<_, i64>(2)? != 0,
                default: row.get(3)?,
                pk: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

/// Whether the table has any primary-key constraint.
pub fn has_primary_key(conn: &Connection, table: &TableRef) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1, ?2) WHERE pk > 0",
        [table.table(), table.schema()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Whether `ON CONFLICT(steam)` can be used: `steam` alone is the primary key.
pub fn is_keyed_by_steam(conn: &Connection, table: &TableRef) -> Result<bool> {
    let pk: Vec<String> = table_columns(conn, table)?
        .into_iter()
        .filter(|c| c.pk > 0)
        .map(|c| c.name)
        .collect();
    Ok(pk.len() == 1 && pk[0].eq_ignore_ascii_case("steam"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsafe_identifiers() {
        for bad in ["", "lvl base", "t;DROP TABLE x", "1abc", "a\"b", "dots.in.name"] {
            assert!(TableRef::main(bad).is_err(), "{bad:?} accepted");
        }
        assert!(TableRef::new("main", "lvl_base").is_ok());
        assert!(TableRef::new("bad schema", "lvl_base").is_err());
    }

    #[test]
    fn legacy_table_has_no_primary_key() {
        let conn = Connection::open_in_memory().unwrap();
        let table = TableRef::main("lvl_base").unwrap();
        ensure_rank_table(&conn, &table).unwrap();

        assert!(!has_primary_key(&conn, &table).unwrap());
        assert!(!is_keyed_by_steam(&conn, &table).unwrap());
        let names: Vec<_> = table_columns(&conn, &table)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names.len(), 14);
        assert_eq!(names[0], "steam");
        assert_eq!(names[13], "lastconnect");
    }

    #[test]
    fn detects_steam_primary_key() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE keyed (steam TEXT PRIMARY KEY, value INTEGER);")
            .unwrap();
        let table = TableRef::main("keyed").unwrap();
        assert!(has_primary_key(&conn, &table).unwrap());
        assert!(is_keyed_by_steam(&conn, &table).unwrap());
    }

    #[test]
    fn other_primary_key_is_not_steam_key() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE other (id INTEGER PRIMARY KEY, steam TEXT);")
            .unwrap();
        let table = TableRef::main("other").unwrap();
        assert!(has_primary_key(&conn, &table).unwrap());
        assert!(!is_keyed_by_steam(&conn, &table).unwrap());
    }
}
