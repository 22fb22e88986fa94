use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "ranksync.toml";
pub const DEFAULT_RANK_TABLE: &str = "lvl_base";
pub const DEFAULT_BAN_TABLE: &str = "iks_bans";
pub const DEFAULT_RETENTION_DAYS: u32 = 3;
pub const DEFAULT_MAX_RETENTION_DAYS: u32 = 30;
/// Once every three months, on the 1st at midnight.
pub const DEFAULT_CRON_EXPRESSION: &str = "0 0 1 */3 *";
pub const DEFAULT_CRON_COMMAND: &str = "reset-ranks exp";

/// Top-level config (ranksync.toml + RANKSYNC_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankSyncConfig {
    /// Enables debug-level log output.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub bans: BanListConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_cron")]
    pub cron: Vec<CronSetting>,
}

impl Default for RankSyncConfig {
    fn default() -> Self {
        Self {
            debug: false,
            database: DatabaseConfig::default(),
            bans: BanListConfig::default(),
            cache: CacheConfig::default(),
            cron: default_cron(),
        }
    }
}

/// The rank table the synchronizer reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    /// SQLite schema holding the table (`main` unless the file is attached).
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_rank_table")]
    pub table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            schema: default_schema(),
            table: default_rank_table(),
        }
    }
}

/// The admin system's ban table, read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanListConfig {
    /// Falls back to `database.path` when unset.
    pub path: Option<String>,
    #[serde(default = "default_ban_table")]
    pub table: String,
}

impl Default for BanListConfig {
    fn default() -> Self {
        Self {
            path: None,
            table: default_ban_table(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: String,
    /// Directory for the pre-reset top-10 exports.
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,
    /// How long a ban snapshot stays restorable. `0` disables caching.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_max_retention_days")]
    pub max_retention_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            snapshot_dir: default_snapshot_dir(),
            retention_days: default_retention_days(),
            max_retention_days: default_max_retention_days(),
        }
    }
}

impl CacheConfig {
    /// `retention_days` clamped to `max_retention_days`.
    pub fn effective_retention_days(&self) -> u32 {
        self.retention_days.min(self.max_retention_days)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.effective_retention_days()))
    }
}

/// A recurring console command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronSetting {
    pub expression: String,
    pub command: String,
}

fn default_cron() -> Vec<CronSetting> {
    vec![CronSetting {
        expression: DEFAULT_CRON_EXPRESSION.to_string(),
        command: DEFAULT_CRON_COMMAND.to_string(),
    }]
}
fn default_db_path() -> String {
    "ranks.db".to_string()
}
fn default_schema() -> String {
    "main".to_string()
}
fn default_rank_table() -> String {
    DEFAULT_RANK_TABLE.to_string()
}
fn default_ban_table() -> String {
    DEFAULT_BAN_TABLE.to_string()
}
fn default_cache_path() -> String {
    "rank_cache.json".to_string()
}
fn default_snapshot_dir() -> String {
    "snapshots".to_string()
}
fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}
fn default_max_retention_days() -> u32 {
    DEFAULT_MAX_RETENTION_DAYS
}

impl RankSyncConfig {
    /// Load config from a TOML file with RANKSYNC_* env var overrides.
    ///
    /// Nested keys use a double underscore: `RANKSYNC_CACHE__RETENTION_DAYS=7`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_PATH);

        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("RANKSYNC_").split("__"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))
    }

    /// Ban table location; shares the rank database unless configured.
    pub fn ban_db_path(&self) -> &str {
        self.bans.path.as_deref().unwrap_or(&self.database.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = RankSyncConfig::default();
        assert!(!cfg.debug);
        assert_eq!(cfg.database.table, "lvl_base");
        assert_eq!(cfg.database.schema, "main");
        assert_eq!(cfg.bans.table, "iks_bans");
        assert_eq!(cfg.cache.effective_retention_days(), 3);
        assert_eq!(cfg.cron.len(), 1);
        assert_eq!(cfg.cron[0].expression, "0 0 1 */3 *");
        assert_eq!(cfg.cron[0].command, "reset-ranks exp");
        assert_eq!(cfg.ban_db_path(), cfg.database.path);
    }

    #[test]
    fn retention_is_clamped_to_maximum() {
        let cache = CacheConfig {
            retention_days: 365,
            max_retention_days: 14,
            ..Default::default()
        };
        assert_eq!(cache.effective_retention_days(), 14);
        assert_eq!(cache.retention(), chrono::Duration::days(14));
    }

    #[test]
    fn parses_toml_sections() {
        let toml = r#"
            debug = true

            [database]
            path = "/srv/ranks.db"
            table = "lr_web"

            [bans]
            path = "/srv/admin.db"

            [cache]
            retention_days = 0

            [[cron]]
            expression = "0 4 * * 1"
            command = "clear-rank-if-banned"

            [[cron]]
            expression = "30 3 1 * *"
            command = "reset-old-exp 60"
        "#;
        let cfg: RankSyncConfig = Figment::new()
            .merge(Toml::string(toml))
            .extract()
            .unwrap();
        assert!(cfg.debug);
        assert_eq!(cfg.database.table, "lr_web");
        assert_eq!(cfg.database.schema, "main");
        assert_eq!(cfg.ban_db_path(), "/srv/admin.db");
        assert_eq!(cfg.cache.retention(), chrono::Duration::zero());
        assert_eq!(cfg.cron.len(), 2);
        assert_eq!(cfg.cron[1].command, "reset-old-exp 60");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = RankSyncConfig::load(Some("/nonexistent/ranksync.toml")).unwrap();
        assert_eq!(cfg.cache.retention_days, DEFAULT_RETENTION_DAYS);
    }
}
