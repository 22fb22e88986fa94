//! `ranksync-store` — SQLite access to the rank table and the admin ban list.
//!
//! Every operation opens its own connection and closes it when done; callers
//! in async code run these functions on the blocking pool.

pub mod bans;
pub mod db;
pub mod error;
pub mod repair;
pub mod repo;

pub use bans::{BanSource, SqliteBanList};
pub use error::{Result, StoreError};
pub use repair::{repair_schema, RepairOutcome};
pub use db::TableRef;
pub use repo::{RankRepository, UpsertMode};
