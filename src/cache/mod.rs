//! Local cache: the client's source of truth between syncs.
//!
//! [`LocalCache`] wraps a [`KeyValueStore`] with total functions: reads never
//! fail (any backend problem reads as absent) and writes report a
//! [`WriteOutcome`] instead of an error, so callers can treat persistence as
//! fire-and-forget. Successful pulls broadcast [`StorageEvent`]s so every
//! reader in the process can refresh its in-memory view.

pub mod store;

use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub use store::{FileStore, KeyValueStore, MemoryStore};

/// Fixed storage keys.
pub mod keys {
    /// Current task collection.
    pub const TASKS: &str = "workboard-simple-tasks-v2";
    /// Discovery collection.
    pub const DISCOVERIES: &str = "workboard-discoveries-v1";
    /// Legacy column board, read only by migration.
    pub const LEGACY_COLUMNS: &str = "workboard-tasks-v1";

    /// Key of the schema version tag written next to `key`.
    #[must_use]
    pub fn version_tag(key: &str) -> String {
        format!("{key}::version")
    }
}

const EVENT_CAPACITY: usize = 64;

/// Result of a best-effort write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The value was stored.
    Written,
    /// Storing the value would exceed the cache quota; nothing was stored.
    QuotaExceeded,
    /// The backend could not be written.
    Unavailable,
}

impl WriteOutcome {
    /// Whether the value reached the backend.
    #[must_use]
    pub fn is_written(self) -> bool {
        self == Self::Written
    }
}

/// Change notification for a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Key that changed.
    pub key: String,
    /// Raw value now stored under the key.
    pub new_value: Option<String>,
}

/// Quota-bounded, never-failing view over a key-value store.
pub struct LocalCache {
    store: Arc<dyn KeyValueStore>,
    quota_bytes: usize,
    write_lock: Mutex<()>,
    events: broadcast::Sender<StorageEvent>,
}

impl LocalCache {
    /// Wrap `store`, refusing writes that would push its size past `quota_bytes`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, quota_bytes: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            quota_bytes,
            write_lock: Mutex::new(()),
            events,
        }
    }

    /// Cache over a fresh [`MemoryStore`].
    #[must_use]
    pub fn in_memory(quota_bytes: usize) -> Self {
        Self::new(Arc::new(MemoryStore::new()), quota_bytes)
    }

    /// Read the raw value under `key`. Backend failures read as absent.
    #[must_use]
    pub fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(err) => {
                debug!(key, %err, "local cache read failed");
                None
            }
        }
    }

    /// Store `value` under `key` if the quota allows it.
    pub fn write(&self, key: &str, value: &str) -> WriteOutcome {
        self.write_all(&[(key, value)])
    }

    /// Store every `(key, value)` pair, or none of them.
    ///
    /// The quota is checked against the combined result before anything is
    /// stored. If the backend fails partway, pairs already stored are put
    /// back to their previous values.
    pub fn write_all(&self, entries: &[(&str, &str)]) -> WriteOutcome {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let used = match self.store.used_bytes() {
            Ok(used) => used,
            Err(err) => {
                warn!(%err, "local cache unavailable");
                return WriteOutcome::Unavailable;
            }
        };
        let previous: Vec<Option<String>> = entries
            .iter()
            .map(|(key, _)| self.store.get(key).ok().flatten())
            .collect();
        let replaced: usize = entries
            .iter()
            .zip(&previous)
            .filter_map(|((key, _), old)| old.as_ref().map(|old| key.len() + old.len()))
            .sum();
        let added: usize = entries.iter().map(|(k, v)| k.len() + v.len()).sum();
        let projected = used.saturating_sub(replaced) + added;
        if projected > self.quota_bytes {
            warn!(
                keys = ?entries.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
                projected,
                quota = self.quota_bytes,
                "local cache quota exceeded"
            );
            return WriteOutcome::QuotaExceeded;
        }

        for (done, (key, value)) in entries.iter().enumerate() {
            if let Err(err) = self.store.set(key, value) {
                warn!(key, %err, "local cache write dropped");
                self.restore(&entries[..done], &previous[..done]);
                return WriteOutcome::Unavailable;
            }
        }
        WriteOutcome::Written
    }

    fn restore(&self, entries: &[(&str, &str)], previous: &[Option<String>]) {
        for ((key, _), old) in entries.iter().zip(previous).rev() {
            let restored = match old {
                Some(old) => self.store.set(key, old),
                None => self.store.remove(key),
            };
            if let Err(err) = restored {
                warn!(key, %err, "local cache rollback failed");
            }
        }
    }

    /// Serialize `items` under `key` and record `version` in its tag.
    ///
    /// The collection and its tag are stored together or not at all.
    pub fn write_collection<T: Serialize>(
        &self,
        key: &str,
        items: &[T],
        version: u32,
    ) -> WriteOutcome {
        let raw = match serde_json::to_string(items) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, %err, "cannot encode collection");
                return WriteOutcome::Unavailable;
            }
        };
        self.write_raw_collection(key, &raw, version)
    }

    /// Store an already-encoded collection under `key` with its version tag.
    pub fn write_raw_collection(&self, key: &str, raw: &str, version: u32) -> WriteOutcome {
        self.write_raw_collections(&[(key, raw, version)])
    }

    /// Store several encoded collections with their tags as one
    /// [`write_all`](Self::write_all).
    pub fn write_raw_collections(&self, collections: &[(&str, &str, u32)]) -> WriteOutcome {
        let tags: Vec<(String, String)> = collections
            .iter()
            .map(|(key, _, version)| (keys::version_tag(key), version.to_string()))
            .collect();
        let mut entries: Vec<(&str, &str)> = collections
            .iter()
            .map(|(key, raw, _)| (*key, *raw))
            .collect();
        entries.extend(tags.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        self.write_all(&entries)
    }

    /// Schema version recorded for `key`, if any.
    #[must_use]
    pub fn version(&self, key: &str) -> Option<u32> {
        self.read(&keys::version_tag(key))
            .and_then(|raw| raw.trim().parse().ok())
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }

    /// Broadcast that `key` now holds `new_value`.
    pub fn notify(&self, key: &str, new_value: Option<String>) {
        // No subscribers is not an error.
        let _ = self.events.send(StorageEvent {
            key: key.to_owned(),
            new_value,
        });
    }
}

/// Decode `json`, returning `fallback` for absent, empty or malformed input.
#[must_use]
pub fn parse<T: DeserializeOwned>(json: Option<&str>, fallback: T) -> T {
    match json {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw).unwrap_or(fallback),
        _ => fallback,
    }
}
