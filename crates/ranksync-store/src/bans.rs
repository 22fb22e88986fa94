use std::path::PathBuf;

use rusqlite::types::Value;
use tracing::debug;

use crate::db::{open_connection, TableRef};
use crate::error::Result;

/// Read-only view of the admin system's ban list.
pub trait BanSource: Send + Sync {
    /// Distinct numeric 64-bit ids of every banned player.
    fn banned_ids(&self) -> Result<Vec<String>>;
}

/// Ban list stored in an SQLite table with a `steam_id` column.
#[derive(Debug, Clone)]
pub struct SqliteBanList {
    path: PathBuf,
    table: TableRef,
}

impl SqliteBanList {
    pub fn new(path: impl Into<PathBuf>, table: TableRef) -> Self {
        Self {
            path: path.into(),
            table,
        }
    }
}

impl BanSource for SqliteBanList {
    fn banned_ids(&self) -> Result<Vec<String>> {
        let conn = open_connection(&self.path)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT steam_id FROM {}",
            self.table.qualified()
        ))?;
        // The admin system stores ids as text or as integers depending on version.
        let ids: Vec<String> = stmt
            .query_map([], |row| row.get::<_, Value>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .filter_map(|v| match v {
                Value::Integer(i) => Some(i.to_string()),
                Value::Text(s) => Some(s),
                _ => None,
            })
            .collect();
        debug!(table = %self.table, count = ids.len(), "ban list loaded");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use tempfile::TempDir;

    #[test]
    fn returns_distinct_ids_of_either_type() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("admin.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE iks_bans (id INTEGER PRIMARY KEY, steam_id, reason TEXT);
             INSERT INTO iks_bans (steam_id, reason) VALUES ('76561198000000001', 'a');
             INSERT INTO iks_bans (steam_id, reason) VALUES ('76561198000000001', 'b');
             INSERT INTO iks_bans (steam_id, reason) VALUES (76561198000000002, 'c');
             INSERT INTO iks_bans (steam_id, reason) VALUES (NULL, 'd');",
        )
        .unwrap();

        let list = SqliteBanList::new(&path, TableRef::main("iks_bans").unwrap());
        let mut ids = list.banned_ids().unwrap();
        ids.sort();
        assert_eq!(ids, vec!["76561198000000001", "76561198000000002"]);
    }

    #[test]
    fn missing_table_is_an_error() {
        let dir = TempDir::new().unwrap();
        let list = SqliteBanList::new(
            dir.path().join("empty.db"),
            TableRef::main("iks_bans").unwrap(),
        );
        assert!(list.banned_ids().is_err());
    }
}
