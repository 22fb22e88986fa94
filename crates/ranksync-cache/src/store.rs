use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use ranksync_core::{CacheEntry, StatsRecord};
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};

/// TTL-bounded snapshot cache persisted as a single JSON document.
///
/// Reads never delete: an expired entry is simply invisible to [`get`](Self::get)
/// until the next [`put`](Self::put) sweeps it out.
pub struct CacheStore {
    path: PathBuf,
    snapshot_dir: PathBuf,
    retention: chrono::Duration,
    /// Held across every load-modify-save cycle.
    write_lock: Mutex<()>,
}

impl CacheStore {
    /// Open (creating if missing) the cache document at `path`.
    pub fn open(
        path: impl Into<PathBuf>,
        snapshot_dir: impl Into<PathBuf>,
        retention: chrono::Duration,
    ) -> Result<Self> {
        let store = Self {
            path: path.into(),
            snapshot_dir: snapshot_dir.into(),
            retention,
            write_lock: Mutex::new(()),
        };
        store.ensure_file()?;
        debug!(path = %store.path.display(), retention_days = retention.num_days(), "cache opened");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn retention(&self) -> chrono::Duration {
        self.retention
    }

    /// Caching is off when the retention window is zero.
    pub fn is_enabled(&self) -> bool {
        self.retention > chrono::Duration::zero()
    }

    /// Return the live snapshot for `steam`, if one exists.
    pub fn get(&self, steam: &str) -> Option<CacheEntry> {
        self.get_at(steam, Utc::now())
    }

    fn get_at(&self, steam: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        let _guard = self.lock();
        let entries = self.load();
        debug!(records = entries.len(), "cache loaded");
        entries
            .into_iter()
            .find(|e| e.steam() == steam && !self.is_expired(e, now))
    }

    /// Insert `entry`, replacing any previous snapshot for the same player and
    /// dropping every expired one.
    pub fn put(&self, entry: CacheEntry) -> Result<()> {
        if entry.steam().is_empty() || !self.is_enabled() {
            return Ok(());
        }

        let _guard = self.lock();
        let now = Utc::now();
        let mut entries = self.load();
        let before = entries.len();
        entries.retain(|e| e.steam() != entry.steam() && !self.is_expired(e, now));
        debug!(
            steam = %entry.steam(),
            evicted = before - entries.len(),
            "cache sweep before insert"
        );
        entries.push(entry);
        self.save(&entries)
    }

    /// Delete every snapshot for `steam`. Missing ids are not an error.
    pub fn remove(&self, steam: &str) -> Result<()> {
        let _guard = self.lock();
        let mut entries = self.load();
        let before = entries.len();
        entries.retain(|e| e.steam() != steam);
        if entries.len() == before {
            return Ok(());
        }
        self.save(&entries)
    }

    /// Every stored entry, expired ones included.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let _guard = self.lock();
        self.load()
    }

    /// Write `records` to a timestamped archive file.
    ///
    /// Archival only: errors are logged and `None` is returned.
    pub fn save_snapshot(&self, records: &[StatsRecord], label: &str) -> Option<PathBuf> {
        let stem = format!("top10_{label}_{}", Utc::now().format("%Y%m%d_%H%M%S_%3f"));

        let result = fs::create_dir_all(&self.snapshot_dir)
            .map_err(|e| io_error(&self.snapshot_dir, e))
            .and_then(|_| serde_json::to_string_pretty(records).map_err(CacheError::from))
            .and_then(|json| write_new_file(&self.snapshot_dir, &stem, &json));

        match result {
            Ok(target) => {
                info!(path = %target.display(), records = records.len(), "snapshot exported");
                Some(target)
            }
            Err(e) => {
                warn!(label, "snapshot export failed: {e}");
                None
            }
        }
    }

    // --- private helpers ---------------------------------------------------

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.timestamp >= self.retention
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded data is `()`, so a poisoned lock carries no broken state.
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_file(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        debug!(path = %self.path.display(), "cache file not found, creating new one");
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        self.save(&[])
    }

    /// An unreadable document is treated as empty; the next save replaces it.
    fn load(&self) -> Vec<CacheEntry> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %self.path.display(), "cache read failed: {e}");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), "cache document is corrupt, ignoring: {e}");
            Vec::new()
        })
    }

    /// Serialise to a sibling temp file, then rename over the document.
    fn save(&self, entries: &[CacheEntry]) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| io_error(&self.path, e))
    }
}

/// Write `contents` to `<stem>.json` in `dir`, adding a `_<n>` suffix when
/// that name is already taken. Existing archives are never overwritten.
fn write_new_file(dir: &Path, stem: &str, contents: &str) -> Result<PathBuf> {
    let mut attempt = 0u32;
    loop {
        let name = match attempt {
            0 => format!("{stem}.json"),
            n => format!("{stem}_{n}.json"),
        };
        let target = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(mut file) => {
                file.write_all(contents.as_bytes())
                    .map_err(|e| io_error(&target, e))?;
                return Ok(target);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(io_error(&target, e)),
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> CacheError {
    CacheError::Io {
        path: path.display().to_string(),
        source,
    }
}
