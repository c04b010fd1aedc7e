//! Integration tests for backup files, retention and the server data files.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::{json, Value};

use tokio_util::sync::CancellationToken;

use workboard::server::backup::{cleanup_old_backups, create_backup, spawn_backup_schedule};
use workboard::server::ServerStore;

#[test]
fn open_initialises_empty_data_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ServerStore::open(dir.path().join("data")).expect("open");

    for name in ["tasks.json", "discoveries.json"] {
        let raw = fs::read_to_string(store.data_dir().join(name)).expect("file exists");
        assert_eq!(serde_json::from_str::<Value>(&raw).expect("json"), json!([]));
    }
}

#[test]
fn corrupt_data_file_reads_as_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ServerStore::open(dir.path()).expect("open");
    fs::write(dir.path().join("tasks.json"), "{{{").expect("corrupt");

    assert!(store.read_tasks().is_empty());
    store.write_tasks(&[json!({ "text": "recovered" })]).expect("write");
    assert_eq!(store.read_tasks()[0].text, "recovered");
}

#[test]
fn backup_contains_both_collections() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ServerStore::open(dir.path()).expect("open");
    store
        .write_tasks(&[json!({ "id": "a", "text": "task" })])
        .expect("tasks");
    store
        .write_discoveries(&[json!({ "text": "finding", "date": "2024-01-01" })])
        .expect("discoveries");

    let filename = create_backup(&store).expect("backup");
    let raw = fs::read_to_string(store.backup_dir().join(&filename)).expect("backup file");
    let body: Value = serde_json::from_str(&raw).expect("json");

    assert!(body["created_at"].is_string());
    assert_eq!(body["tasks"][0]["id"], "a");
    assert_eq!(body["discoveries"][0]["text"], "finding");
}

#[test]
fn backups_taken_in_the_same_second_do_not_overwrite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ServerStore::open(dir.path()).expect("open");

    let first = create_backup(&store).expect("first");
    let second = create_backup(&store).expect("second");
    assert_ne!(first, second);
    assert!(store.backup_dir().join(first).exists());
    assert!(store.backup_dir().join(second).exists());
}

#[test]
fn retention_removes_only_expired_backups() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backups = dir.path().join("backups");
    fs::create_dir_all(&backups).expect("mkdir");
    for name in [
        "backup_20240101_080000.json",
        "backup_20240220_080000.json",
        "backup_20240301_080000.json",
        "notes.json",
        "backup_garbage.json",
    ] {
        fs::write(backups.join(name), "{}").expect("write");
    }

    let today = NaiveDate::from_ymd_opt(2024, 3, 10).expect("date");
    let removed = cleanup_old_backups(&backups, 30, today).expect("cleanup");

    assert_eq!(removed, 1);
    assert!(!backups.join("backup_20240101_080000.json").exists());
    assert!(backups.join("backup_20240220_080000.json").exists());
    assert!(backups.join("backup_20240301_080000.json").exists());
    assert!(backups.join("notes.json").exists());
    assert!(backups.join("backup_garbage.json").exists());
}

#[test]
fn retention_on_missing_directory_is_a_no_op() {
    let dir = tempfile::tempdir().expect("tempdir");
    let today = NaiveDate::from_ymd_opt(2024, 3, 10).expect("date");
    assert_eq!(
        cleanup_old_backups(&dir.path().join("absent"), 30, today).expect("cleanup"),
        0
    );
}

#[tokio::test]
async fn schedule_writes_backups_and_purges_expired_ones() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(ServerStore::open(dir.path()).expect("open"));
    store
        .write_tasks(&[json!({ "id": "a", "text": "task" })])
        .expect("tasks");
    let backups = store.backup_dir();
    fs::create_dir_all(&backups).expect("backup dir");
    fs::write(backups.join("backup_20000101_000000.json"), "{}").expect("old backup");

    let cancel = CancellationToken::new();
    let handle = spawn_backup_schedule(
        Arc::clone(&store),
        30,
        Duration::from_millis(50),
        cancel.clone(),
    );

    let mut names = Vec::new();
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        names = fs::read_dir(&backups)
            .expect("read dir")
            .filter_map(|entry| entry.ok()?.file_name().into_string().ok())
            .collect();
        if !names.is_empty() && !names.iter().any(|n| n.starts_with("backup_2000")) {
            break;
        }
    }
    cancel.cancel();
    handle.await.expect("schedule stops");

    assert!(!names.is_empty(), "no scheduled backup was written");
    assert!(!names.iter().any(|n| n.starts_with("backup_2000")), "{names:?}");
    let raw = fs::read_to_string(backups.join(&names[0])).expect("backup file");
    let backup: Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(backup["tasks"][0]["text"], "task");
}
