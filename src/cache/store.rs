//! Key-value store backends underneath the local cache.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::warn;

use crate::{AppError, Result};

/// Synchronous string-to-string storage, scoped to one client.
///
/// Implementations report failures as errors; [`super::LocalCache`] is the
/// layer that turns them into absent reads and write outcomes.
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Storage` when the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Storage` when the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key` if present.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Storage` when the backend cannot be written.
    fn remove(&self, key: &str) -> Result<()>;

    /// Total size in bytes of every stored key and value.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Storage` when the backend cannot be read.
    fn used_bytes(&self) -> Result<usize>;
}

/// Local storage persisted as a single JSON object file.
///
/// The file is re-read on every access so several `workboard` processes
/// sharing a data directory observe each other's writes. A file that is not
/// a JSON object of strings is renamed to `<name>.corrupt` and the store
/// starts empty. Writes go through a
/// temp file in the same directory and an atomic rename.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Store backed by the file at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(map) => Ok(map),
                Err(err) => self.set_aside(&err.to_string()),
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(AppError::Storage(format!(
                "cannot read {}: {err}",
                self.path.display()
            ))),
        }
    }

    /// Move an unreadable file to `<name>.corrupt` and start over empty.
    fn set_aside(&self, reason: &str) -> Result<BTreeMap<String, String>> {
        let mut aside = self.path.clone().into_os_string();
        aside.push(".corrupt");
        fs::rename(&self.path, &aside).map_err(|err| {
            AppError::Storage(format!("cannot move aside {}: {err}", self.path.display()))
        })?;
        warn!(path = %self.path.display(), reason, "corrupt local storage moved aside");
        Ok(BTreeMap::new())
    }

    fn save(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)
            .map_err(|err| AppError::Storage(format!("cannot create {}: {err}", dir.display())))?;

        let body = serde_json::to_vec(map)
            .map_err(|err| AppError::Storage(format!("cannot encode store: {err}")))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|err| AppError::Storage(format!("cannot create temp file: {err}")))?;
        tmp.write_all(&body)
            .map_err(|err| AppError::Storage(format!("cannot write temp file: {err}")))?;
        tmp.persist(&self.path).map_err(|err| {
            AppError::Storage(format!("cannot replace {}: {err}", self.path.display()))
        })?;
        Ok(())
    }

    fn with_map<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> (T, bool),
    ) -> Result<T> {
        let _guard = self
            .lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut map = self.load()?;
        let (out, dirty) = f(&mut map);
        if dirty {
            self.save(&map)?;
        }
        Ok(out)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_map(|map| (map.get(key).cloned(), false))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_map(|map| {
            map.insert(key.to_owned(), value.to_owned());
            ((), true)
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_map(|map| {
            let existed = map.remove(key).is_some();
            ((), existed)
        })
    }

    fn used_bytes(&self) -> Result<usize> {
        self.with_map(|map| (entries_size(map.iter()), false))
    }
}

/// In-process store. Can be switched off to behave like disabled storage.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Empty, available store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle whether every operation fails as if storage were disabled.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(AppError::Storage("storage is disabled".into()))
        } else {
            Ok(())
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check()?;
        self.entries().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.check()?;
        self.entries().remove(key);
        Ok(())
    }

    fn used_bytes(&self) -> Result<usize> {
        self.check()?;
        Ok(entries_size(self.entries().iter()))
    }
}

fn entries_size<'a>(entries: impl Iterator<Item = (&'a String, &'a String)>) -> usize {
    entries.map(|(k, v)| k.len() + v.len()).sum()
}
