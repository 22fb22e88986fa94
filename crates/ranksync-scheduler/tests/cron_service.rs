// Job loops driven by tokio's paused clock.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use ranksync_scheduler::{
    CronJob, CronService, FiredCommand, SchedulerOptions, TokioClock, SETTLE_DELAY,
};
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::Span;

fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 30).unwrap()
}

fn job(index: usize, expression: &str, command: &str) -> CronJob {
    CronJob {
        index,
        expression: expression.into(),
        command: command.into(),
    }
}

fn service(jobs: Vec<CronJob>) -> (CronService, mpsc::Receiver<FiredCommand>) {
    let (tx, rx) = mpsc::channel(64);
    let options = SchedulerOptions {
        clock: Arc::new(TokioClock::starting_at(origin())),
        ..Default::default()
    };
    (CronService::new(jobs, tx, Span::none()).with_options(options), rx)
}

/// Everything fired within `window` of paused time.
async fn collect(rx: &mut mpsc::Receiver<FiredCommand>, window: Duration) -> Vec<FiredCommand> {
    let deadline = Instant::now() + window;
    let mut fired = Vec::new();
    while let Ok(Some(cmd)) = timeout_at(deadline, rx.recv()).await {
        fired.push(cmd);
    }
    fired
}

#[tokio::test(start_paused = true)]
async fn minutely_job_fires_on_each_minute() {
    let (svc, mut rx) = service(vec![job(0, "* * * * *", "reset-ranks exp")]);
    svc.start().await;

    let fired = collect(&mut rx, Duration::from_secs(300)).await;
    let times: Vec<_> = fired.iter().map(|f| f.fired_at).collect();
    let expected: Vec<_> = (1..=5)
        .map(|m| Utc.with_ymd_and_hms(2026, 1, 1, 0, m, 0).unwrap())
        .collect();
    assert_eq!(times, expected);
    assert!(fired.iter().all(|f| f.job == 0 && f.command == "reset-ranks exp"));

    svc.stop().await;
}

#[tokio::test(start_paused = true)]
async fn fires_after_delay_longer_than_a_single_timer() {
    let (tx, mut rx) = mpsc::channel(4);
    let options = SchedulerOptions {
        clock: Arc::new(TokioClock::starting_at(origin())),
        max_sleep: Duration::from_secs(3_600),
        ..Default::default()
    };
    // Midnight on the 1st of April: about three months ahead.
    let svc = CronService::new(vec![job(0, "0 0 1 4 *", "reset-ranks all")], tx, Span::none())
        .with_options(options);
    svc.start().await;

    let fired = collect(&mut rx, Duration::from_secs(100 * 86_400)).await;
    assert_eq!(fired.len(), 1);
    assert_eq!(
        fired[0].fired_at,
        Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap()
    );
    svc.stop().await;
}

#[tokio::test(start_paused = true)]
async fn restart_never_runs_duplicate_loops() {
    let (svc, mut rx) = service(vec![job(0, "* * * * *", "clear-rank-if-banned")]);
    svc.start().await;
    svc.start().await;
    svc.start().await;

    let fired = collect(&mut rx, Duration::from_secs(300)).await;
    assert_eq!(fired.len(), 5);
    svc.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_pending_fire() {
    let (svc, mut rx) = service(vec![job(0, "* * * * *", "reset-ranks exp")]);
    svc.start().await;
    assert!(svc.is_running().await);

    tokio::time::sleep(Duration::from_secs(10)).await;
    svc.stop().await;
    assert!(!svc.is_running().await);

    assert!(collect(&mut rx, Duration::from_secs(600)).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn invalid_expression_disables_only_that_job() {
    let (svc, mut rx) = service(vec![
        job(0, "not a cron line", "reset-ranks all"),
        job(1, "* * * * *", "reset-ranks stats"),
    ]);
    svc.start().await;

    let fired = collect(&mut rx, Duration::from_secs(120)).await;
    assert_eq!(fired.len(), 2);
    assert!(fired.iter().all(|f| f.job == 1));
    svc.stop().await;
}

#[tokio::test(start_paused = true)]
async fn jobs_run_independently() {
    let (svc, mut rx) = service(vec![
        job(0, "* * * * *", "reset-ranks exp"),
        job(1, "*/2 * * * *", "clear-rank-if-banned"),
    ]);
    svc.start().await;

    let fired = collect(&mut rx, Duration::from_secs(300)).await;
    assert_eq!(fired.iter().filter(|f| f.job == 0).count(), 5);
    assert_eq!(fired.iter().filter(|f| f.job == 1).count(), 2);
    svc.stop().await;
}

#[tokio::test(start_paused = true)]
async fn list_reports_next_run_and_errors() {
    let (svc, _rx) = service(vec![
        job(0, "0 0 1 */3 *", "reset-ranks exp"),
        job(1, "bogus", "cron-list"),
    ]);

    let status = svc.list();
    assert_eq!(status.len(), 2);
    assert_eq!(
        status[0].next_fire.as_ref().unwrap(),
        &Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap()
    );
    assert!(status[0].to_string().contains("in 89d 23h 59m 30s"));
    assert!(status[1].next_fire.is_err());
    assert!(status[1].to_string().contains("disabled"));
}

#[test]
fn settle_delay_is_one_second() {
    assert_eq!(SETTLE_DELAY, Duration::from_secs(1));
}
