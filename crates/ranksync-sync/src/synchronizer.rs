use std::path::PathBuf;
use std::sync::Arc;

use ranksync_cache::CacheStore;
use ranksync_core::{to_steam_id, CacheEntry, ResetKind, StatsRecord};
use ranksync_store::{BanSource, RankRepository, UpsertMode};
use tracing::{debug, info, warn, Instrument, Span};

use crate::error::{Result, SyncError};
use crate::host::RanksApi;
use crate::locks::PlayerLocks;
use crate::sequence::{EventSequencer, Ticket};

/// Rows kept by the pre-reset export.
const EXPORT_LIMIT: usize = 10;

/// What a ban did to the player's row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanOutcome {
    /// The player was connected; only the in-memory experience was zeroed.
    LiveReset { cached: bool },
    /// The stored row was zeroed (or a placeholder inserted).
    StoreReset { cached: bool, mode: UpsertMode },
}

impl BanOutcome {
    pub fn cached(&self) -> bool {
        match self {
            BanOutcome::LiveReset { cached } | BanOutcome::StoreReset { cached, .. } => *cached,
        }
    }
}

/// Tally of a `clear_if_banned` sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub total: usize,
    pub cleared: usize,
    pub failed: usize,
}

/// Keeps rank rows consistent with ban state.
///
/// Banning zeroes a player's experience, optionally snapshotting the row
/// first; unbanning restores the snapshot. Store work runs on the blocking
/// pool with a fresh connection per operation.
pub struct RankSynchronizer {
    ranks: Arc<dyn RanksApi>,
    bans: Arc<dyn BanSource>,
    repo: RankRepository,
    cache: Arc<CacheStore>,
    locks: PlayerLocks,
    events: EventSequencer,
    span: Span,
}

impl RankSynchronizer {
    pub fn new(
        ranks: Arc<dyn RanksApi>,
        bans: Arc<dyn BanSource>,
        repo: RankRepository,
        cache: Arc<CacheStore>,
        span: Span,
    ) -> Self {
        Self {
            ranks,
            bans,
            repo,
            cache,
            locks: PlayerLocks::new(),
            events: EventSequencer::new(),
            span,
        }
    }

    pub fn repository(&self) -> &RankRepository {
        &self.repo
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Reserve the next arrival-order slot for `id64`. Malformed ids queue
    /// under their raw text.
    pub fn event_ticket(&self, id64: &str) -> Ticket {
        let key = to_steam_id(id64).unwrap_or_else(|_| id64.trim().to_string());
        self.events.ticket(&key)
    }

    /// Whether a ban of `duration_secs` is long enough to keep a snapshot.
    /// Zero or negative durations are permanent bans.
    pub fn caches_ban(&self, duration_secs: i64) -> bool {
        if !self.cache.is_enabled() {
            return false;
        }
        duration_secs <= 0 || duration_secs > self.cache.retention().num_seconds()
    }

    /// Zero the experience of a freshly banned player.
    pub async fn ban(&self, id64: &str, duration_secs: i64) -> Result<BanOutcome> {
        let cache = self.caches_ban(duration_secs);
        debug!(id64, duration_secs, cache, "handling ban");
        self.zero(id64, cache).instrument(self.span.clone()).await
    }

    /// Put back the row captured when the player was banned.
    pub async fn unban(&self, id64: &str) -> Result<StatsRecord> {
        async {
            let steam = to_steam_id(id64)?;
            let _guard = self.locks.acquire(&steam).await;

            let repo = self.repo.clone();
            let cache = Arc::clone(&self.cache);
            let key = steam.clone();
            let record = blocking(move || {
                let entry = cache
                    .get(&key)
                    .ok_or_else(|| SyncError::NoSnapshotAvailable { steam: key.clone() })?;
                repo.restore(&entry.record)?;
                cache.remove(&key)?;
                Ok(entry.record)
            })
            .await?;

            if self.ranks.set_live_experience(id64, record.value) {
                debug!(steam = %steam, value = record.value, "live experience restored");
            }
            info!(steam = %steam, value = record.value, "rank restored from cache");
            Ok(record)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Zero every player on the ban list. Never snapshots.
    pub async fn clear_if_banned(&self) -> Result<ClearReport> {
        async {
            let bans = Arc::clone(&self.bans);
            let ids = blocking(move || Ok(bans.banned_ids()?)).await?;
            info!(count = ids.len(), "clearing ranks of banned players");

            let mut report = ClearReport {
                total: ids.len(),
                ..Default::default()
            };
            for id in &ids {
                match self.zero(id, false).await {
                    Ok(_) => report.cleared += 1,
                    Err(e) => {
                        report.failed += 1;
                        warn!(id64 = %id, "skipping banned player: {e}");
                    }
                }
            }
            info!(cleared = report.cleared, failed = report.failed, "clearing old bans done");
            Ok(report)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Bulk reset. `Exp` spares connected players.
    pub async fn reset(&self, kind: ResetKind) -> Result<usize> {
        let op: fn(&RankRepository) -> ranksync_store::Result<usize> = match kind {
            ResetKind::All => RankRepository::reset_all,
            ResetKind::Stats => RankRepository::reset_stats,
            ResetKind::PlayTime => RankRepository::reset_playtime,
            ResetKind::Exp => {
                return self.reset_experience(self.connected_steam_ids(), 0).await;
            }
        };
        async {
            self.export_top(kind.export_label()).await;
            let repo = self.repo.clone();
            let affected = blocking(move || Ok(op(&repo)?)).await?;
            info!(%kind, affected, "ranks reset");
            Ok(affected)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Zero `value` and `rank` for every row not in `exclude` (canonical ids),
    /// optionally only for players idle longer than `older_than_days`.
    pub async fn reset_experience(&self, exclude: Vec<String>, older_than_days: u32) -> Result<usize> {
        async {
            self.export_top(ResetKind::Exp.export_label()).await;
            let repo = self.repo.clone();
            blocking(move || Ok(repo.reset_experience(&exclude, older_than_days)?)).await
        }
        .instrument(self.span.clone())
        .await
    }

    /// Archive the current top rows by experience. Best-effort.
    pub async fn export_top(&self, label: &str) -> Option<PathBuf> {
        let repo = self.repo.clone();
        let cache = Arc::clone(&self.cache);
        let label = label.to_string();
        let result = blocking(move || {
            let top = repo.top_by_experience(EXPORT_LIMIT)?;
            if top.is_empty() {
                warn!(label = %label, "no players with experience, nothing to export");
                return Ok(None);
            }
            Ok(cache.save_snapshot(&top, &label))
        })
        .await;

        match result {
            Ok(path) => path,
            Err(e) => {
                warn!("top export failed: {e}");
                None
            }
        }
    }

    /// Canonical ids of connected players. Malformed ids are skipped.
    pub fn connected_steam_ids(&self) -> Vec<String> {
        self.ranks
            .connected_players()
            .iter()
            .filter_map(|id64| match to_steam_id(id64) {
                Ok(steam) => Some(steam),
                Err(e) => {
                    warn!("ignoring connected player: {e}");
                    None
                }
            })
            .collect()
    }

    // --- private helpers ---------------------------------------------------

    async fn zero(&self, id64: &str, cache: bool) -> Result<BanOutcome> {
        let steam = to_steam_id(id64)?;
        let _guard = self.locks.acquire(&steam).await;

        // Snapshot first: once zeroed, the old values are gone.
        let cached = if cache {
            let repo = self.repo.clone();
            let store = Arc::clone(&self.cache);
            let key = steam.clone();
            let cached = blocking(move || match repo.fetch(&key)? {
                Some(record) => {
                    store.put(CacheEntry::capture(record))?;
                    Ok(true)
                }
                None => Ok(false),
            })
            .await?;
            if cached {
                debug!(steam = %steam, "rank cached before reset");
            } else {
                warn!(steam = %steam, "no existing rank row to cache");
            }
            cached
        } else {
            false
        };

        if self.ranks.set_live_experience(id64, 0) {
            info!(steam = %steam, cached, "live experience zeroed");
            return Ok(BanOutcome::LiveReset { cached });
        }

        let repo = self.repo.clone();
        let key = steam.clone();
        let mode = blocking(move || Ok(repo.zero_experience(&key)?)).await?;
        info!(steam = %steam, cached, ?mode, "stored experience zeroed");
        Ok(BanOutcome::StoreReset { cached, mode })
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let span = Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(f))
        .await
        .map_err(|e| SyncError::Task(e.to_string()))?
}
