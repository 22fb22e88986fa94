use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::oneshot;

type Tails = DashMap<String, (u64, oneshot::Receiver<()>)>;

/// Arrival-order queue per player.
///
/// [`EventSequencer::ticket`] is synchronous, so the order in which tickets
/// are taken is the order in which their holders run, whatever order the
/// runtime schedules the holding tasks in.
#[derive(Default)]
pub struct EventSequencer {
    tails: Arc<Tails>,
    next: AtomicU64,
}

/// A place in one player's queue. Dropping it lets the next holder run.
pub struct Ticket {
    previous: Option<oneshot::Receiver<()>>,
    done: Option<oneshot::Sender<()>>,
    key: String,
    seq: u64,
    tails: Arc<Tails>,
}

impl EventSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the back of `key`'s queue.
    pub fn ticket(&self, key: &str) -> Ticket {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        let (done, rx) = oneshot::channel();
        let previous = self
            .tails
            .insert(key.to_string(), (seq, rx))
            .map(|(_, rx)| rx);
        Ticket {
            previous,
            done: Some(done),
            key: key.to_string(),
            seq,
            tails: Arc::clone(&self.tails),
        }
    }

    /// Number of players with queued or running work.
    pub fn len(&self) -> usize {
        self.tails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tails.is_empty()
    }
}

impl Ticket {
    /// Wait until every earlier ticket for the same key has been dropped.
    /// Cancel-safe: an abandoned wait can be resumed.
    pub async fn wait_turn(&mut self) {
        if let Some(previous) = self.previous.as_mut() {
            // A dropped sender is also a release; a panicking holder must not wedge the queue.
            let _ = previous.await;
            self.previous = None;
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let seq = self.seq;
        self.tails.remove_if(&self.key, |_, (tail, _)| *tail == seq);
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}
