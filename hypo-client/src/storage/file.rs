//! File-backed store.
//!
//! Entries live in a single JSON document. The file is re-read on every
//! access so several processes sharing it see each other's writes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::KeyValueStore;
use crate::clock::{Clock, SystemClock, expiry_after};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Durable store persisted as JSON at a fixed path.
pub struct FileStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    /// Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a store backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    /// Create a store backed by `path` using the given clock for expiry.
    pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
            write_lock: Mutex::new(()),
        }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> HashMap<String, StoredEntry> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), "failed to read store: {}", e);
                return HashMap::new();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), "discarding unreadable store: {}", e);
            HashMap::new()
        })
    }

    fn persist(&self, entries: &HashMap<String, StoredEntry>) {
        if let Err(e) = self.try_persist(entries) {
            warn!(path = %self.path.display(), "failed to write store: {}", e);
        }
    }

    fn try_persist(&self, entries: &HashMap<String, StoredEntry>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)
    }

    /// Apply `change` to the live (unexpired) entries and write them back.
    fn update(&self, change: impl FnOnce(&mut HashMap<String, StoredEntry>)) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        let mut entries = self.load();
        entries.retain(|_, entry| now < entry.expires_at);
        change(&mut entries);
        self.persist(&entries);
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        self.load()
            .remove(key)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.value)
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) {
        let expires_at = expiry_after(self.clock.now(), ttl);
        self.update(|entries| {
            entries.insert(
                key.to_string(),
                StoredEntry {
                    value: value.to_string(),
                    expires_at,
                },
            );
        });
    }

    fn remove(&self, key: &str) {
        self.update(|entries| {
            entries.remove(key);
        });
    }
}
