//! `ranksync` — keeps rank rows in step with the ban list.
//!
//! With no subcommand (or `run`) the binary repairs the rank table, starts
//! the configured cron jobs and consumes ban/unban events as JSON lines on
//! stdin until EOF or Ctrl-C. The other subcommands run one operation and
//! exit.

use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ranksync_core::config::DEFAULT_CONFIG_PATH;
use ranksync_core::{ConsoleCommand, RankSyncConfig, ResetKind};
use ranksync_scheduler::FiredCommand;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod app;
mod dispatch;
mod events;
mod host;

use app::App;

#[derive(Parser)]
#[command(name = "ranksync", version, about = "Ban-aware rank synchronisation")]
struct Cli {
    /// Config file. Falls back to $RANKSYNC_CONFIG, then ./ranksync.toml.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Run the cron jobs and consume host events from stdin (default).
    Run,
    /// Reset a column group for every player: all, exp, stats or play_time.
    ResetRanks { kind: ResetKind },
    /// Reset experience of players not seen for this many days.
    ResetOldExp { days: u32 },
    /// Zero the experience of everyone on the ban list.
    ClearRankIfBanned,
    /// Show configured cron jobs and their next run.
    CronList,
    /// Restore a banned player's cached rank.
    Unban { id64: String },
}

impl Commands {
    fn console_command(&self) -> Option<ConsoleCommand> {
        match self {
            Commands::ResetRanks { kind } => Some(ConsoleCommand::ResetRanks(*kind)),
            Commands::ResetOldExp { days } => Some(ConsoleCommand::ResetOldExp { days: *days }),
            Commands::ClearRankIfBanned => Some(ConsoleCommand::ClearRankIfBanned),
            Commands::CronList => Some(ConsoleCommand::CronList),
            Commands::Run | Commands::Unban { .. } => None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // load config: --config > RANKSYNC_CONFIG env > ./ranksync.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("RANKSYNC_CONFIG").ok());
    let loaded = RankSyncConfig::load(config_path.as_deref());

    let debug = loaded.as_ref().map(|c| c.debug).unwrap_or(false);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(debug).into()),
        )
        .init();

    let config = loaded.unwrap_or_else(|e| {
        warn!("Config load failed ({e}), using defaults");
        RankSyncConfig::default()
    });
    let path = config_path.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    if !Path::new(path).exists() {
        warn!(path, "config file not found, using defaults and environment overrides");
    }

    let (app, fired_rx) = App::bootstrap(config).await?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(app, fired_rx).await,
        Commands::CronList => {
            for status in app.cron.list() {
                println!("{status}");
            }
            Ok(())
        }
        Commands::Unban { id64 } => {
            let record = app.service.synchronizer()?.unban(&id64).await?;
            println!(
                "restored {} ({}): value={} rank={}",
                record.steam, record.name, record.value, record.rank
            );
            Ok(())
        }
        other => {
            let Some(command) = other.console_command() else {
                anyhow::bail!("{other:?} is not a console command");
            };
            if app.service.execute(&command).await {
                Ok(())
            } else {
                anyhow::bail!("`{command}` did not complete, see the log for details")
            }
        }
    }
}

async fn run(app: App, fired_rx: mpsc::Receiver<FiredCommand>) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                shutdown.cancel();
            }
        });
    }

    app.cron.start().await;
    let dispatcher = dispatch::spawn_dispatcher(
        Arc::clone(&app.service),
        Arc::clone(&app.cron),
        fired_rx,
        shutdown.clone(),
    );
    info!(
        jobs = app.config.cron.len(),
        ready = app.service.is_ready(),
        "ranksync running, reading events from stdin"
    );

    let accepted =
        events::pump_events(events::stdin_lines(), Arc::clone(&app.service), shutdown.clone()).await;
    info!(events = accepted, "event stream closed");

    // stop cron loops first so nothing new reaches the dispatcher
    app.cron.stop().await;
    shutdown.cancel();
    dispatcher.await?;
    Ok(())
}

fn default_filter(debug: bool) -> &'static str {
    if debug {
        "ranksync=debug"
    } else {
        "ranksync=info"
    }
}
