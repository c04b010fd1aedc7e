//! JSON file persistence for the companion server.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::models::{today, Discovery, Task};
use crate::{AppError, Result};

const TASKS_FILE: &str = "tasks.json";
const DISCOVERIES_FILE: &str = "discoveries.json";

/// Server-side copy of both collections, one pretty-printed file each.
///
/// Missing or corrupt files read as empty collections. Writes normalise
/// incoming records and replace the file atomically.
pub struct ServerStore {
    data_dir: PathBuf,
    lock: Mutex<()>,
}

impl ServerStore {
    /// Open (and initialise) the store under `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the directory or the initial files cannot be
    /// created.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(|err| {
            AppError::Io(format!("cannot create {}: {err}", data_dir.display()))
        })?;
        let store = Self {
            data_dir,
            lock: Mutex::new(()),
        };
        for name in [TASKS_FILE, DISCOVERIES_FILE] {
            let path = store.data_dir.join(name);
            if !path.exists() {
                write_json_atomic(&path, &Vec::<Value>::new())?;
            }
        }
        Ok(store)
    }

    /// Directory holding the data files.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding backup files.
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    /// Stored tasks.
    #[must_use]
    pub fn read_tasks(&self) -> Vec<Task> {
        let _guard = self.guard();
        self.read_entries(TASKS_FILE)
            .iter()
            .filter_map(normalize_task)
            .collect()
    }

    /// Stored discoveries.
    #[must_use]
    pub fn read_discoveries(&self) -> Vec<Discovery> {
        let _guard = self.guard();
        self.read_entries(DISCOVERIES_FILE)
            .iter()
            .filter_map(normalize_discovery)
            .collect()
    }

    /// Replace the task file with the normalised `entries`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file cannot be written.
    pub fn write_tasks(&self, entries: &[Value]) -> Result<Vec<Task>> {
        let tasks: Vec<Task> = entries.iter().filter_map(normalize_task).collect();
        let _guard = self.guard();
        write_json_atomic(&self.data_dir.join(TASKS_FILE), &tasks)?;
        Ok(tasks)
    }

    /// Replace the discovery file with the normalised `entries`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file cannot be written.
    pub fn write_discoveries(&self, entries: &[Value]) -> Result<Vec<Discovery>> {
        let items: Vec<Discovery> = entries.iter().filter_map(normalize_discovery).collect();
        let _guard = self.guard();
        write_json_atomic(&self.data_dir.join(DISCOVERIES_FILE), &items)?;
        Ok(items)
    }

    fn read_entries(&self, name: &str) -> Vec<Value> {
        let path = self.data_dir.join(name);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!(path = %path.display(), %err, "cannot read data file");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(path = %path.display(), %err, "corrupt data file, reading as empty");
            Vec::new()
        })
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Normalise an incoming task record.
///
/// Non-objects and records whose text is `null` are dropped; missing text
/// reads as empty. `id` and `done` are kept when present (a missing id is
/// generated) and a missing date becomes today.
#[must_use]
pub fn normalize_task(entry: &Value) -> Option<Task> {
    let map = entry.as_object()?;
    let text = text_of(map.get("text"))?;
    let mut task = Task::new(text, date_or_today(map.get("date")));
    if let Some(id) = map.get("id").and_then(Value::as_str).filter(|id| !id.is_empty()) {
        id.clone_into(&mut task.id);
    }
    task.done = map.get("done").and_then(Value::as_bool).unwrap_or(false);
    Some(task)
}

/// Normalise an incoming discovery record. Same dropping rules as tasks.
#[must_use]
pub fn normalize_discovery(entry: &Value) -> Option<Discovery> {
    let map = entry.as_object()?;
    let text = text_of(map.get("text"))?;
    Some(Discovery::new(text, date_or_today(map.get("date"))))
}

fn text_of(value: Option<&Value>) -> Option<String> {
    match value {
        None => Some(String::new()),
        Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn date_or_today(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Null | Value::String(_)) | None => today(),
        Some(other) => other.to_string(),
    }
}

/// Pretty-print `value` to `path` through a temp file and rename.
///
/// # Errors
///
/// Returns `AppError::Io` if any step fails.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let body = serde_json::to_vec_pretty(value)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&body)?;
    tmp.persist(path)
        .map_err(|err| AppError::Io(format!("cannot replace {}: {err}", path.display())))?;
    Ok(())
}
