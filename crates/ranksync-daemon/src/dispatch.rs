use std::sync::Arc;

use ranksync_core::ConsoleCommand;
use ranksync_scheduler::{CronService, FiredCommand};
use ranksync_sync::SyncService;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Parse and run one console command line. Returns whether it completed.
pub async fn execute_line(service: &SyncService, cron: &CronService, line: &str) -> bool {
    let command: ConsoleCommand = match line.parse() {
        Ok(c) => c,
        Err(e) => {
            warn!("skipping command: {e}");
            return false;
        }
    };

    match command {
        ConsoleCommand::CronList => {
            for status in cron.list() {
                info!("{status}");
            }
            true
        }
        other => service.execute(&other).await,
    }
}

/// Run fired cron commands one at a time until `shutdown` fires or every
/// sender is gone. On shutdown the channel is closed and whatever is already
/// queued still runs. The task yields the number of commands run.
pub fn spawn_dispatcher(
    service: Arc<SyncService>,
    cron: Arc<CronService>,
    mut fired_rx: mpsc::Receiver<FiredCommand>,
    shutdown: CancellationToken,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut ran = 0;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                fired = fired_rx.recv() => {
                    let Some(fired) = fired else { break };
                    run_fired(&service, &cron, fired).await;
                    ran += 1;
                }
            }
        }

        fired_rx.close();
        while let Some(fired) = fired_rx.recv().await {
            run_fired(&service, &cron, fired).await;
            ran += 1;
        }
        info!(commands = ran, "command dispatcher stopped");
        ran
    })
}

async fn run_fired(service: &SyncService, cron: &CronService, fired: FiredCommand) {
    info!(job = fired.job, command = %fired.command, fired_at = %fired.fired_at, "running scheduled command");
    execute_line(service, cron, &fired.command).await;
}
