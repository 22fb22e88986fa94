use std::path::{Path, PathBuf};

use chrono::Utc;
use ranksync_core::StatsRecord;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{debug, info, instrument, warn};

use crate::db::{is_keyed_by_steam, open_connection, TableRef, RANK_COLUMNS};
use crate::error::Result;

/// How an upsert was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertMode {
    /// `INSERT … ON CONFLICT(steam) DO UPDATE`.
    Keyed,
    /// The table has no key on `steam`: a plain `INSERT`, which may leave a
    /// duplicate row behind.
    Degraded,
}

/// Reads and writes the rank table. Holds no connection between calls.
#[derive(Debug, Clone)]
pub struct RankRepository {
    path: PathBuf,
    table: TableRef,
}

impl RankRepository {
    pub fn new(path: impl Into<PathBuf>, table: TableRef) -> Self {
        Self {
            path: path.into(),
            table,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn connect(&self) -> Result<Connection> {
        open_connection(&self.path)
    }

    /// Current row for `steam`. With duplicates present, the most recently
    /// connected (then earliest inserted) row wins.
    #[instrument(skip(self), fields(table = %self.table))]
    pub fn fetch(&self, steam: &str) -> Result<Option<StatsRecord>> {
        let conn = self.connect()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {RANK_COLUMNS} FROM {} WHERE steam = ?1
                     ORDER BY lastconnect DESC, rowid ASC LIMIT 1",
                    self.table.qualified()
                ),
                [steam],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Set `value` and `rank` to zero, inserting a placeholder row if the
    /// player has none.
    #[instrument(skip(self), fields(table = %self.table))]
    pub fn zero_experience(&self, steam: &str) -> Result<UpsertMode> {
        let conn = self.connect()?;
        let mode = self.upsert_mode(&conn)?;
        let insert = format!(
            "INSERT INTO {} ({RANK_COLUMNS})
             VALUES (?1, 'Unknown', 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0)",
            self.table.qualified()
        );
        let sql = match mode {
            UpsertMode::Keyed => {
                format!("{insert} ON CONFLICT(steam) DO UPDATE SET value = 0, rank = 0")
            }
            UpsertMode::Degraded => insert,
        };
        conn.execute(&sql, [steam])?;
        debug!(steam, ?mode, "experience zeroed");
        Ok(mode)
    }

    /// Write every column of `record` back, inserting or overwriting.
    #[instrument(skip(self, record), fields(table = %self.table, steam = %record.steam))]
    pub fn restore(&self, record: &StatsRecord) -> Result<UpsertMode> {
        let conn = self.connect()?;
        let mode = self.upsert_mode(&conn)?;
        let insert = format!(
            "INSERT INTO {} ({RANK_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            self.table.qualified()
        );
        let sql = match mode {
            UpsertMode::Keyed => format!(
                "{insert} ON CONFLICT(steam) DO UPDATE SET
                    name = excluded.name,
                    value = excluded.value,
                    rank = excluded.rank,
                    kills = excluded.kills,
                    deaths = excluded.deaths,
                    shoots = excluded.shoots,
                    hits = excluded.hits,
                    headshots = excluded.headshots,
                    assists = excluded.assists,
                    round_win = excluded.round_win,
                    round_lose = excluded.round_lose,
                    playtime = excluded.playtime,
                    lastconnect = excluded.lastconnect"
            ),
            UpsertMode::Degraded => insert,
        };
        conn.execute(
            &sql,
            rusqlite::params![
                record.steam,
                record.name,
                record.value,
                record.rank,
                record.kills,
                record.deaths,
                record.shoots,
                record.hits,
                record.headshots,
                record.assists,
                record.round_win,
                record.round_lose,
                record.playtime,
                record.lastconnect,
            ],
        )?;
        Ok(mode)
    }

    /// Zero experience, rank, all counters and playtime for every row.
    pub fn reset_all(&self) -> Result<usize> {
        self.reset_columns(&[
            "value",
            "rank",
            "kills",
            "deaths",
            "shoots",
            "hits",
            "headshots",
            "assists",
            "round_win",
            "round_lose",
            "playtime",
        ])
    }

    /// Zero combat counters for every row.
    pub fn reset_stats(&self) -> Result<usize> {
        self.reset_columns(&[
            "kills",
            "deaths",
            "shoots",
            "hits",
            "headshots",
            "assists",
            "round_win",
            "round_lose",
        ])
    }

    pub fn reset_playtime(&self) -> Result<usize> {
        self.reset_columns(&["playtime"])
    }

    /// Zero `value` and `rank`.
    ///
    /// Rows whose `steam` is in `exclude` are left alone. With
    /// `older_than_days > 0`, only rows whose `lastconnect` is further in the
    /// past than that are reset.
    #[instrument(skip(self, exclude), fields(table = %self.table, excluded = exclude.len()))]
    pub fn reset_experience(&self, exclude: &[String], older_than_days: u32) -> Result<usize> {
        let mut clauses = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if older_than_days > 0 {
            let cutoff = Utc::now().timestamp() - i64::from(older_than_days) * 86_400;
            clauses.push("lastconnect < ?".to_string());
            params.push(Value::Integer(cutoff));
        }
        if !exclude.is_empty() {
            let marks = vec!["?"; exclude.len()].join(", ");
            clauses.push(format!("steam NOT IN ({marks})"));
            params.extend(exclude.iter().cloned().map(Value::Text));
        }

        let mut sql = format!("UPDATE {} SET value = 0, rank = 0", self.table.qualified());
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let conn = self.connect()?;
        let affected = conn.execute(&sql, rusqlite::params_from_iter(params))?;
        info!(affected, "experience reset");
        Ok(affected)
    }

    /// Top `limit` rows by experience, ignoring players with none.
    pub fn top_by_experience(&self, limit: usize) -> Result<Vec<StatsRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RANK_COLUMNS} FROM {} WHERE value > 0 ORDER BY value DESC LIMIT ?1",
            self.table.qualified()
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map([limit], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // --- private helpers ---------------------------------------------------

    fn reset_columns(&self, columns: &[&str]) -> Result<usize> {
        let assignments = columns
            .iter()
            .map(|c| format!("{c} = 0"))
            .collect::<Vec<_>>()
            .join(", ");
        let conn = self.connect()?;
        let affected = conn.execute(
            &format!("UPDATE {} SET {assignments}", self.table.qualified()),
            [],
        )?;
        info!(table = %self.table, affected, columns = columns.len(), "columns reset");
        Ok(affected)
    }

    fn upsert_mode(&self, conn: &Connection) -> Result<UpsertMode> {
        if is_keyed_by_steam(conn, &self.table)? {
            Ok(UpsertMode::Keyed)
        } else {
            warn!(table = %self.table, "no key on steam, upsert degrades to plain insert");
            Ok(UpsertMode::Degraded)
        }
    }
}

/// Legacy tables may hold NULL counters; they read as zero.
fn row_to_record(row: &Row<'_>) -> rusqlite::Result<StatsRecord> {
    let int = |idx: usize| -> rusqlite::Result<i64> {
        Ok(row.get::<_, Option<i64>>(idx)?.unwrap_or(0))
    };
    Ok(StatsRecord {
        steam: row.get(0)?,
        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        value: int(2)?,
        rank: int(3)?,
        kills: int(4)?,
        deaths: int(5)?,
        shoots: int(6)?,
        hits: int(7)?,
        headshots: int(8)?,
        assists: int(9)?,
        round_win: int(10)?,
        round_lose: int(11)?,
        playtime: int(12)?,
        lastconnect: int(13)?,
    })
}
