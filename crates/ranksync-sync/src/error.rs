use ranksync_cache::CacheError;
use ranksync_core::CoreError;
use ranksync_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed player id; the event is skipped.
    #[error(transparent)]
    Identity(#[from] CoreError),

    /// Unban for a player with no live snapshot. Expected after short bans.
    #[error("No cached snapshot for {steam}, cannot restore")]
    NoSnapshotAvailable { steam: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The ranking capability is missing; nothing can be synchronised.
    #[error("Rank synchronizer not ready: {0}")]
    NotReady(String),

    /// A blocking store task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
