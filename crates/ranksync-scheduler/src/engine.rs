use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::clock::{Clock, SystemClock};
use crate::schedule::{format_delay, CronSchedule};
use crate::sleep::{sleep_chunked, MAX_TIMER_DELAY};
use crate::types::{CronJob, CronJobStatus, FiredCommand};

/// Pause after each fire before the next occurrence is computed.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct SchedulerOptions {
    /// Longest single timer; longer waits are split.
    pub max_sleep: Duration,
    pub settle: Duration,
    pub clock: Arc<dyn Clock>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_sleep: MAX_TIMER_DELAY,
            settle: SETTLE_DELAY,
            clock: Arc::new(SystemClock),
        }
    }
}

struct RunningJobs {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl RunningJobs {
    async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!("cron job task ended abnormally: {e}");
            }
        }
    }
}

/// Runs one loop per configured job and forwards every fire to `fired_tx`.
///
/// Commands are never executed inline: the receiver side of the channel is
/// the single place they run.
pub struct CronService {
    jobs: Vec<CronJob>,
    fired_tx: mpsc::Sender<FiredCommand>,
    options: SchedulerOptions,
    running: Mutex<Option<RunningJobs>>,
    span: Span,
}

impl CronService {
    pub fn new(jobs: Vec<CronJob>, fired_tx: mpsc::Sender<FiredCommand>, span: Span) -> Self {
        Self {
            jobs,
            fired_tx,
            options: SchedulerOptions::default(),
            running: Mutex::new(None),
            span,
        }
    }

    pub fn with_options(mut self, options: SchedulerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn jobs(&self) -> &[CronJob] {
        &self.jobs
    }

    /// Start every job loop, first stopping and awaiting any that are running.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if let Some(previous) = running.take() {
            debug!(parent: &self.span, "stopping previous cron loops before restart");
            previous.shutdown().await;
        }

        let cancel = CancellationToken::new();
        let handles: Vec<_> = self
            .jobs
            .iter()
            .cloned()
            .map(|job| {
                let span = info_span!(parent: &self.span, "cron_job", job = job.index);
                tokio::spawn(
                    run_job(job, self.fired_tx.clone(), self.options.clone(), cancel.clone())
                        .instrument(span),
                )
            })
            .collect();

        info!(parent: &self.span, jobs = handles.len(), "cron jobs started");
        *running = Some(RunningJobs { cancel, handles });
    }

    /// Cancel every job loop and wait for all of them to exit.
    pub async fn stop(&self) {
        if let Some(previous) = self.running.lock().await.take() {
            previous.shutdown().await;
            info!(parent: &self.span, "cron jobs stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Status of every configured job, computed from the current time.
    pub fn list(&self) -> Vec<CronJobStatus> {
        let now = self.options.clock.now();
        self.jobs
            .iter()
            .map(|job| {
                let next_fire = CronSchedule::parse(&job.expression)
                    .and_then(|s| s.next_after(now))
                    .map_err(|e| e.to_string());
                let delay = next_fire.as_ref().ok().map(|next| *next - now);
                CronJobStatus {
                    job: job.clone(),
                    next_fire,
                    delay,
                }
            })
            .collect()
    }
}

async fn run_job(
    job: CronJob,
    fired_tx: mpsc::Sender<FiredCommand>,
    options: SchedulerOptions,
    cancel: CancellationToken,
) {
    let schedule = match CronSchedule::parse(&job.expression) {
        Ok(s) => s,
        Err(e) => {
            error!(job = job.index, "{e}; job disabled");
            return;
        }
    };
    debug!(job = job.index, expression = %job.expression, command = %job.command, "cron job loop started");

    loop {
        let now = options.clock.now();
        let next = match schedule.next_after(now) {
            Ok(next) => next,
            Err(e) => {
                error!(job = job.index, "{e}; job disabled");
                return;
            }
        };
        let delay = next - now;
        if delay <= chrono::Duration::zero() {
            continue;
        }
        debug!(job = job.index, %next, delay = %format_delay(delay), "next run scheduled");

        if !sleep_until(next, &options, &cancel).await {
            break;
        }

        let fired = FiredCommand {
            job: job.index,
            command: job.command.clone(),
            fired_at: options.clock.now(),
        };
        info!(job = job.index, command = %job.command, "cron job fired");
        // try_send never blocks the loop on a busy dispatcher.
        if let Err(e) = fired_tx.try_send(fired) {
            warn!(job = job.index, "dispatch channel full or closed, command dropped: {e}");
        }

        if !sleep_chunked(options.settle, options.max_sleep, &cancel).await {
            break;
        }
    }
    debug!(job = job.index, "cron job loop stopped");
}

/// Sleep until the wall clock reaches `deadline`, re-arming if a wake-up
/// arrives early.
async fn sleep_until(
    deadline: DateTime<Utc>,
    options: &SchedulerOptions,
    cancel: &CancellationToken,
) -> bool {
    loop {
        let remaining = (deadline - options.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        if remaining.is_zero() {
            return !cancel.is_cancelled();
        }
        if !sleep_chunked(remaining, options.max_sleep, cancel).await {
            return false;
        }
    }
}
