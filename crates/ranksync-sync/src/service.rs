//! Component boundary between the host and the synchronizer.
//!
//! Everything here is fire-and-forget: failures are logged and swallowed so a
//! broken database or a malformed id never reaches the host.

use std::path::PathBuf;
use std::sync::Arc;

use ranksync_cache::CacheStore;
use ranksync_core::{BanEvent, ConsoleCommand, HostEvent, RankSyncConfig, UnbanEvent};
use ranksync_store::{repair_schema, BanSource, RankRepository, TableRef};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Span};

use crate::error::{Result, SyncError};
use crate::host::RanksApi;
use crate::synchronizer::RankSynchronizer;

pub enum SyncService {
    /// The ranking capability was unavailable at startup.
    NotReady { reason: String },
    Ready(Arc<RankSynchronizer>),
}

impl SyncService {
    pub fn not_ready(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        error!(reason = %reason, "rank synchronizer not ready");
        SyncService::NotReady { reason }
    }

    /// Build the synchronizer: open the cache, repair the rank table schema,
    /// then wire the ranking capability in. Any failure yields `NotReady`.
    pub async fn start(
        ranks: Option<Arc<dyn RanksApi>>,
        bans: Arc<dyn BanSource>,
        config: &RankSyncConfig,
        span: Span,
    ) -> Self {
        let Some(ranks) = ranks else {
            return Self::not_ready("ranking capability not found");
        };

        let table = match TableRef::new(config.database.schema.as_str(), ranks.table_name()) {
            Ok(t) => t,
            Err(e) => return Self::not_ready(e.to_string()),
        };

        let cache = match CacheStore::open(
            &config.cache.path,
            &config.cache.snapshot_dir,
            config.cache.retention(),
        ) {
            Ok(c) => Arc::new(c),
            Err(e) => return Self::not_ready(format!("cache unavailable: {e}")),
        };

        let path = PathBuf::from(ranks.database_path());
        let outcome = {
            let (path, table, span) = (path.clone(), table.clone(), span.clone());
            tokio::task::spawn_blocking(move || span.in_scope(|| repair_schema(&path, &table)))
        };
        match outcome.await {
            Ok(outcome) if outcome.is_keyed() => debug!(?outcome, "rank table keyed"),
            Ok(outcome) => warn!(?outcome, "continuing without a primary key, upserts degrade to inserts"),
            Err(e) => warn!("schema repair task failed: {e}"),
        }

        let repo = RankRepository::new(path, table);
        info!(
            table = %repo.table(),
            retention_days = config.cache.effective_retention_days(),
            "rank synchronizer ready"
        );
        SyncService::Ready(Arc::new(RankSynchronizer::new(ranks, bans, repo, cache, span)))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SyncService::Ready(_))
    }

    pub fn synchronizer(&self) -> Result<&Arc<RankSynchronizer>> {
        match self {
            SyncService::Ready(sync) => Ok(sync),
            SyncService::NotReady { reason } => Err(SyncError::NotReady(reason.clone())),
        }
    }

    pub async fn on_ban_post(&self, event: &BanEvent) {
        let sync = match self.synchronizer() {
            Ok(s) => s,
            Err(e) => {
                warn!(player = %event.player_id, "ban ignored: {e}");
                return;
            }
        };
        debug!(
            player = %event.player_id,
            admin = %event.admin,
            reason = %event.reason,
            duration_secs = event.duration_secs,
            "ban received"
        );
        if let Err(e) = sync.ban(&event.player_id, event.duration_secs).await {
            error!(player = %event.player_id, "ban sync failed: {e}");
        }
    }

    pub async fn on_unban_post(&self, event: &UnbanEvent) {
        let sync = match self.synchronizer() {
            Ok(s) => s,
            Err(e) => {
                warn!(player = %event.player_id, "unban ignored: {e}");
                return;
            }
        };
        debug!(player = %event.player_id, admin = %event.admin, "unban received");
        match sync.unban(&event.player_id).await {
            Ok(_) => {}
            Err(e @ SyncError::NoSnapshotAvailable { .. }) => {
                warn!(player = %event.player_id, "{e}")
            }
            Err(e) => error!(player = %event.player_id, "unban sync failed: {e}"),
        }
    }

    pub async fn handle_event(&self, event: HostEvent) {
        match event {
            HostEvent::BanPost(ban) => self.on_ban_post(&ban).await,
            HostEvent::UnbanPost(unban) => self.on_unban_post(&unban).await,
        }
    }

    /// Handle `event` on its own task; the caller never waits for the store.
    ///
    /// Events for the same player still run in the order this is called: the
    /// ticket is taken here, before the task exists.
    pub fn spawn_event(self: &Arc<Self>, event: HostEvent) -> JoinHandle<()> {
        let mut ticket = self
            .synchronizer()
            .ok()
            .map(|sync| sync.event_ticket(event.player_id()));
        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Some(ticket) = ticket.as_mut() {
                ticket.wait_turn().await;
            }
            service.handle_event(event).await;
            drop(ticket);
        })
    }

    /// Run an operator command. `cron-list` belongs to the scheduler and is
    /// rejected here. Returns whether the command completed.
    pub async fn execute(&self, command: &ConsoleCommand) -> bool {
        let sync = match self.synchronizer() {
            Ok(s) => s,
            Err(e) => {
                warn!(%command, "command refused: {e}");
                return false;
            }
        };

        let result = match command {
            ConsoleCommand::ResetRanks(kind) => sync.reset(*kind).await.map(|_| ()),
            ConsoleCommand::ResetOldExp { days } => sync
                .reset_experience(sync.connected_steam_ids(), *days)
                .await
                .map(|_| ()),
            ConsoleCommand::ClearRankIfBanned => sync.clear_if_banned().await.map(|_| ()),
            ConsoleCommand::CronList => {
                warn!(%command, "not handled by the rank synchronizer");
                return false;
            }
        };

        match result {
            Ok(()) => {
                info!(%command, "command completed");
                true
            }
            Err(e) => {
                error!(%command, "command failed: {e}");
                false
            }
        }
    }
}
