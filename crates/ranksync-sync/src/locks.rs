use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// One async mutex per canonical player id.
///
/// Ban and unban for the same player take the same lock, so a snapshot and
/// its zeroing write can never interleave with a restore. An id's entry is
/// dropped once nobody holds or waits on it.
#[derive(Default)]
pub struct PlayerLocks {
    inner: Arc<LockMap>,
}

/// Held for the duration of one player operation.
pub struct PlayerGuard {
    guard: Option<OwnedMutexGuard<()>>,
    steam: String,
    map: Arc<LockMap>,
}

impl Drop for PlayerGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone, so a count of one means the map's is the last.
        self.map
            .remove_if(&self.steam, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl PlayerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, steam: &str) -> PlayerGuard {
        // Clone the Arc out first: the shard guard must not be held across `.await`.
        let lock = Arc::clone(self.inner.entry(steam.to_string()).or_default().value());
        PlayerGuard {
            guard: Some(lock.lock_owned().await),
            steam: steam.to_string(),
            map: Arc::clone(&self.inner),
        }
    }

    /// Number of ids currently locked or awaited.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_id_is_exclusive() {
        let locks = Arc::new(PlayerLocks::new());
        let guard = locks.acquire("STEAM_1:0:1").await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.acquire("STEAM_1:0:1").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_ids_do_not_block() {
        let locks = PlayerLocks::new();
        let _a = locks.acquire("STEAM_1:0:1").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("STEAM_1:0:2")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn released_ids_are_forgotten() {
        let locks = Arc::new(PlayerLocks::new());
        let first = locks.acquire("STEAM_1:0:1").await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.acquire("STEAM_1:0:1").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        drop(first);
        assert_eq!(locks.len(), 1, "entry must survive while a waiter holds it");

        waiter.await.unwrap();
        assert!(locks.is_empty());

        drop(locks.acquire("STEAM_1:0:2").await);
        assert!(locks.is_empty());
    }
}
