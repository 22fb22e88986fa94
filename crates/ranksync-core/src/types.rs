use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One row of the rank table. Field names match the column names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRecord {
    /// Canonical `STEAM_1:y:z` id — the table's natural key.
    pub steam: String,
    pub name: String,
    /// Experience points.
    pub value: i64,
    /// Rank level derived from `value`.
    pub rank: i64,
    pub kills: i64,
    pub deaths: i64,
    pub shoots: i64,
    pub hits: i64,
    pub headshots: i64,
    pub assists: i64,
    pub round_win: i64,
    pub round_lose: i64,
    pub playtime: i64,
    /// Unix seconds of the player's last connection.
    pub lastconnect: i64,
}

/// A ban-time snapshot of a [`StatsRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(flatten)]
    pub record: StatsRecord,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

impl CacheEntry {
    /// Snapshot `record` as of now.
    pub fn capture(record: StatsRecord) -> Self {
        Self::captured_at(record, Utc::now())
    }

    pub fn captured_at(record: StatsRecord, timestamp: DateTime<Utc>) -> Self {
        Self { record, timestamp }
    }

    pub fn steam(&self) -> &str {
        &self.record.steam
    }
}

/// Emitted by the admin system after a ban has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanEvent {
    /// Numeric 64-bit player id, as text.
    pub player_id: String,
    #[serde(default)]
    pub admin: String,
    #[serde(default)]
    pub reason: String,
    /// Ban length in seconds; `0` means permanent.
    #[serde(default)]
    pub duration_secs: i64,
}

/// Emitted by the admin system after a ban has been lifted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbanEvent {
    pub player_id: String,
    #[serde(default)]
    pub admin: String,
}

/// Notifications delivered by the host, one JSON object per line on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    BanPost(BanEvent),
    UnbanPost(UnbanEvent),
}

impl HostEvent {
    pub fn player_id(&self) -> &str {
        match self {
            HostEvent::BanPost(ban) => &ban.player_id,
            HostEvent::UnbanPost(unban) => &unban.player_id,
        }
    }
}

/// Which columns a bulk reset clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetKind {
    /// Experience, rank, every counter and playtime.
    All,
    /// `value` and `rank` only.
    Exp,
    /// Combat counters (kills .. round_lose).
    Stats,
    PlayTime,
}

impl ResetKind {
    /// Label used for the pre-reset top-10 export file.
    pub fn export_label(&self) -> &'static str {
        match self {
            ResetKind::All => "reset_all",
            ResetKind::Exp => "reset_exp",
            ResetKind::Stats => "reset_stats",
            ResetKind::PlayTime => "reset_playtime",
        }
    }
}

impl std::fmt::Display for ResetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResetKind::All => "all",
            ResetKind::Exp => "exp",
            ResetKind::Stats => "stats",
            ResetKind::PlayTime => "play_time",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ResetKind {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all" => Ok(ResetKind::All),
            "exp" => Ok(ResetKind::Exp),
            "stats" => Ok(ResetKind::Stats),
            "play_time" => Ok(ResetKind::PlayTime),
            other => Err(CoreError::UnknownCommand(format!(
                "reset-ranks {other} (expected all|exp|stats|play_time)"
            ))),
        }
    }
}

/// Operator commands, as typed on the console or stored in a cron job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    ResetRanks(ResetKind),
    /// Reset experience of players not seen for this many days.
    ResetOldExp { days: u32 },
    ClearRankIfBanned,
    CronList,
}

impl std::fmt::Display for ConsoleCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsoleCommand::ResetRanks(kind) => write!(f, "reset-ranks {kind}"),
            ConsoleCommand::ResetOldExp { days } => write!(f, "reset-old-exp {days}"),
            ConsoleCommand::ClearRankIfBanned => write!(f, "clear-rank-if-banned"),
            ConsoleCommand::CronList => write!(f, "cron-list"),
        }
    }
}

impl std::str::FromStr for ConsoleCommand {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();
        if parts.next().is_some() {
            return Err(CoreError::UnknownCommand(s.to_string()));
        }

        match (name, arg) {
            ("reset-ranks", Some(kind)) => Ok(ConsoleCommand::ResetRanks(kind.parse()?)),
            ("reset-old-exp", Some(days)) => days
                .parse()
                .map(|days| ConsoleCommand::ResetOldExp { days })
                .map_err(|_| CoreError::UnknownCommand(s.to_string())),
            ("clear-rank-if-banned", None) => Ok(ConsoleCommand::ClearRankIfBanned),
            ("cron-list", None) => Ok(ConsoleCommand::CronList),
            _ => Err(CoreError::UnknownCommand(s.to_string())),
        }
    }
}
