use std::path::Path;
use std::sync::Arc;

use ranksync_core::RankSyncConfig;
use ranksync_scheduler::{CronJob, CronService, FiredCommand};
use ranksync_store::db::{ensure_rank_table, open_connection};
use ranksync_store::{SqliteBanList, TableRef};
use ranksync_sync::{RanksApi, SyncService};
use tokio::sync::mpsc;
use tracing::{info, info_span};

use crate::host::StandaloneRanks;

/// Fired cron commands waiting for the dispatcher.
const DISPATCH_QUEUE: usize = 256;

pub struct App {
    pub config: RankSyncConfig,
    pub service: Arc<SyncService>,
    pub cron: Arc<CronService>,
}

impl App {
    /// Prepare the database, build the synchronizer and the cron service.
    ///
    /// Returns the receiving end of the fired-command channel for the
    /// dispatcher.
    pub async fn bootstrap(
        config: RankSyncConfig,
    ) -> anyhow::Result<(Self, mpsc::Receiver<FiredCommand>)> {
        ensure_parent_dir(&config.database.path);
        ensure_parent_dir(&config.cache.path);

        let table = TableRef::new(config.database.schema.as_str(), config.database.table.as_str())?;
        info!(path = %config.database.path, table = %table, "opening rank database");
        ensure_rank_table(&open_connection(Path::new(&config.database.path))?, &table)?;

        let bans = SqliteBanList::new(
            config.ban_db_path(),
            TableRef::main(config.bans.table.as_str())?,
        );
        let ranks: Arc<dyn RanksApi> = Arc::new(StandaloneRanks::new(
            config.database.path.as_str(),
            config.database.table.as_str(),
        ));

        let span = info_span!("ranksync");
        let service = SyncService::start(Some(ranks), Arc::new(bans), &config, span.clone()).await;

        let (fired_tx, fired_rx) = mpsc::channel(DISPATCH_QUEUE);
        let cron = CronService::new(
            CronJob::from_settings(&config.cron),
            fired_tx,
            info_span!(parent: &span, "cron"),
        );

        Ok((
            Self {
                config,
                service: Arc::new(service),
                cron: Arc::new(cron),
            },
            fired_rx,
        ))
    }
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
