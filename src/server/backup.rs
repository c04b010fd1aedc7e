//! Backup snapshots and time-based backup retention.
//!
//! Backups are written to `<data_dir>/backups/backup_YYYYMMDD_HHMMSS.json`.
//! The backup schedule writes one backup per period (hourly by default) and
//! then deletes backups whose file-name date is older than `retention_days`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::store::{write_json_atomic, ServerStore};
use crate::{AppError, Result};

const PREFIX: &str = "backup_";

/// Write a backup of both collections and return its file name.
///
/// # Errors
///
/// Returns `AppError::Io` if the backup directory or file cannot be written.
pub fn create_backup(store: &ServerStore) -> Result<String> {
    let dir = store.backup_dir();
    fs::create_dir_all(&dir)
        .map_err(|err| AppError::Io(format!("cannot create {}: {err}", dir.display())))?;

    let now = Local::now();
    let stamp = now.format("%Y%m%d_%H%M%S").to_string();
    let (filename, path) = unused_name(&dir, &stamp);

    let body = json!({
        "created_at": now.to_rfc3339(),
        "tasks": store.read_tasks(),
        "discoveries": store.read_discoveries(),
    });
    write_json_atomic(&path, &body)?;
    info!(%filename, "backup written");
    Ok(filename)
}

fn unused_name(dir: &Path, stamp: &str) -> (String, PathBuf) {
    let mut filename = format!("{PREFIX}{stamp}.json");
    let mut n = 1;
    while dir.join(&filename).exists() {
        filename = format!("{PREFIX}{stamp}_{n}.json");
        n += 1;
    }
    let path = dir.join(&filename);
    (filename, path)
}

/// Delete backups in `dir` dated more than `retention_days` before `today`.
///
/// Files whose names do not carry a parseable date are left alone. Returns
/// the number of files deleted.
///
/// # Errors
///
/// Returns `AppError::Io` if `dir` exists but cannot be listed.
pub fn cleanup_old_backups(dir: &Path, retention_days: u32, today: NaiveDate) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let cutoff = today - chrono::Duration::days(i64::from(retention_days));
    let mut removed = 0;

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(date) = backup_date(&path) else {
            continue;
        };
        if date < cutoff {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) => warn!(path = %path.display(), %err, "cannot delete old backup"),
            }
        }
    }
    Ok(removed)
}

/// Date embedded in a `backup_YYYYMMDD_*.json` file name.
fn backup_date(path: &Path) -> Option<NaiveDate> {
    if path.extension()? != "json" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let digits = stem.strip_prefix(PREFIX)?.split('_').next()?;
    NaiveDate::parse_from_str(digits, "%Y%m%d").ok()
}

/// Spawn the periodic backup task.
///
/// Expired backups are purged once at start. After each `period` a new
/// backup is written and expired ones are purged again.
#[must_use]
pub fn spawn_backup_schedule(
    store: Arc<ServerStore>,
    retention_days: u32,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        purge_expired(&store, retention_days);
        let start = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("backup schedule shutting down");
                    break;
                }
                _ = interval.tick() => {
                    match create_backup(&store) {
                        Ok(filename) => info!(filename, "scheduled backup written"),
                        Err(err) => error!(%err, "scheduled backup failed"),
                    }
                    purge_expired(&store, retention_days);
                }
            }
        }
    })
}

fn purge_expired(store: &ServerStore, retention_days: u32) {
    let today = Local::now().date_naive();
    match cleanup_old_backups(&store.backup_dir(), retention_days, today) {
        Ok(removed) => info!(removed, retention_days, "backup retention completed"),
        Err(err) => error!(%err, "backup retention failed"),
    }
}
