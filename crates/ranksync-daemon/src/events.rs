//! Host events arrive as JSON lines on stdin:
//!
//! ```text
//! {"event":"ban_post","player_id":"76561198000000001","admin":"root","reason":"aim","duration_secs":0}
//! {"event":"unban_post","player_id":"76561198000000001","admin":"root"}
//! ```

use std::io::BufRead;
use std::sync::Arc;

use ranksync_core::HostEvent;
use ranksync_sync::SyncService;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub fn parse_event(line: &str) -> Option<HostEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("ignoring malformed event line: {e}");
            None
        }
    }
}

/// Forward stdin lines from a plain thread.
///
/// A blocked stdin read inside the runtime's blocking pool would hold up
/// shutdown after Ctrl-C; a detached thread does not.
pub fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(64);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("stdin read failed: {e}");
                    break;
                }
            }
        }
    });
    rx
}

/// Hand every event to the service on its own task until the line source
/// ends or `shutdown` fires, then wait for the in-flight ones.
///
/// Returns the number of events accepted.
pub async fn pump_events(
    mut lines: mpsc::Receiver<String>,
    service: Arc<SyncService>,
    shutdown: CancellationToken,
) -> usize {
    let mut in_flight: Vec<JoinHandle<()>> = Vec::new();
    let mut accepted = 0;

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };
        let Some(event) = parse_event(&line) else {
            continue;
        };
        debug!(?event, "host event received");
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(service.spawn_event(event));
        accepted += 1;
    }

    for handle in in_flight {
        if let Err(e) = handle.await {
            warn!("event task ended abnormally: {e}");
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use ranksync_core::{BanEvent, UnbanEvent};

    #[test]
    fn parses_ban_and_unban_lines() {
        let ban = parse_event(
            r#"{"event":"ban_post","player_id":"76561198000000001","admin":"root","reason":"aim","duration_secs":600}"#,
        );
        assert_eq!(
            ban,
            Some(HostEvent::BanPost(BanEvent {
                player_id: "76561198000000001".into(),
                admin: "root".into(),
                reason: "aim".into(),
                duration_secs: 600,
            }))
        );

        let unban = parse_event(r#" {"event":"unban_post","player_id":"7656"} "#);
        assert_eq!(
            unban,
            Some(HostEvent::UnbanPost(UnbanEvent {
                player_id: "7656".into(),
                admin: String::new(),
            }))
        );
    }

    #[test]
    fn blank_and_malformed_lines_are_skipped() {
        assert_eq!(parse_event("   "), None);
        assert_eq!(parse_event("{not json"), None);
        assert_eq!(parse_event(r#"{"event":"kick_post","player_id":"1"}"#), None);
    }

    #[tokio::test]
    async fn pump_counts_events_until_source_closes() {
        let (tx, rx) = mpsc::channel(8);
        for line in [
            r#"{"event":"ban_post","player_id":"76561198000000001"}"#,
            "",
            "garbage",
            r#"{"event":"unban_post","player_id":"76561198000000001"}"#,
        ] {
            tx.send(line.to_string()).await.unwrap();
        }
        drop(tx);

        let service = Arc::new(SyncService::not_ready("test"));
        let accepted = pump_events(rx, service, CancellationToken::new()).await;
        assert_eq!(accepted, 2);
    }

    #[tokio::test]
    async fn pump_stops_on_shutdown() {
        let (_tx, rx) = mpsc::channel::<String>(1);
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let service = Arc::new(SyncService::not_ready("test"));
        assert_eq!(pump_events(rx, service, shutdown).await, 0);
    }
}
