//! `ranksync-core` — shared types, configuration and the player id codec.

pub mod config;
pub mod error;
pub mod identity;
pub mod types;

pub use config::{CacheConfig, CronSetting, DatabaseConfig, RankSyncConfig};
pub use error::{CoreError, Result};
pub use identity::to_steam_id;
pub use types::{
    BanEvent, CacheEntry, ConsoleCommand, HostEvent, ResetKind, StatsRecord, UnbanEvent,
};
