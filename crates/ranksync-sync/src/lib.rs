//! Ban-driven rank synchronisation.
//!
//! A ban zeroes the player's experience (snapshotting the row first for long
//! bans); an unban restores the snapshot. [`SyncService`] is the boundary the
//! host talks to: it never surfaces errors, only logs them.

pub mod error;
pub mod host;
pub mod locks;
pub mod sequence;
pub mod service;
pub mod synchronizer;

pub use error::{Result, SyncError};
pub use host::RanksApi;
pub use locks::PlayerLocks;
pub use sequence::{EventSequencer, Ticket};
pub use service::SyncService;
pub use synchronizer::{BanOutcome, ClearReport, RankSynchronizer};
