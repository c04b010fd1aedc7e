//! Unit tests for the local cache contract and its store backends.

use std::sync::Arc;

use workboard::cache::{keys, parse, FileStore, KeyValueStore, LocalCache, MemoryStore, WriteOutcome};
use workboard::models::Task;

fn sample_tasks() -> Vec<Task> {
    vec![
        Task::new("write report", "2024-03-01"),
        Task {
            id: "fixed".into(),
            text: "call back".into(),
            done: true,
            date: None,
        },
    ]
}

#[test]
fn task_array_round_trips_through_write_and_parse() {
    let cache = LocalCache::in_memory(1024 * 1024);
    let tasks = sample_tasks();

    let outcome = cache.write_collection(keys::TASKS, &tasks, 2);
    assert_eq!(outcome, WriteOutcome::Written);

    let read: Vec<Task> = parse(cache.read(keys::TASKS).as_deref(), Vec::new());
    assert_eq!(read, tasks);
    assert_eq!(cache.version(keys::TASKS), Some(2));
}

#[test]
fn parse_returns_fallback_for_malformed_input() {
    let fallback = vec![Task::new("fallback", "2024-01-01")];
    for raw in ["", "   ", "{not json", "[{\"id\":", "\"a string\""] {
        let parsed: Vec<Task> = parse(Some(raw), fallback.clone());
        assert_eq!(parsed, fallback, "input {raw:?}");
    }
    let parsed: Vec<Task> = parse(None, Vec::new());
    assert!(parsed.is_empty());
}

#[test]
fn read_of_missing_key_is_none() {
    let cache = LocalCache::in_memory(1024);
    assert_eq!(cache.read("nope"), None);
    assert_eq!(cache.version("nope"), None);
}

#[test]
fn write_over_quota_is_refused_and_keeps_old_value() {
    let cache = LocalCache::in_memory(32);
    assert_eq!(cache.write("k", "small"), WriteOutcome::Written);

    let big = "x".repeat(64);
    assert_eq!(cache.write("k", &big), WriteOutcome::QuotaExceeded);
    assert_eq!(cache.read("k").as_deref(), Some("small"));
}

#[test]
fn collection_tag_is_not_written_when_value_is_refused() {
    let cache = LocalCache::in_memory(16);
    let outcome = cache.write_raw_collection(keys::TASKS, "[]", 2);
    // The key alone is longer than the quota.
    assert_eq!(outcome, WriteOutcome::QuotaExceeded);
    assert_eq!(cache.version(keys::TASKS), None);
}

#[test]
fn collections_written_together_fit_the_quota_as_a_whole() {
    let cache = LocalCache::in_memory(140);
    let tasks = "[1]";
    let discoveries = "x".repeat(60);

    let outcome = cache.write_raw_collections(&[
        (keys::TASKS, tasks, 2),
        (keys::DISCOVERIES, &discoveries, 1),
    ]);
    assert_eq!(outcome, WriteOutcome::QuotaExceeded);
    assert_eq!(cache.read(keys::TASKS), None);
    assert_eq!(cache.version(keys::TASKS), None);

    let outcome = cache.write_raw_collections(&[(keys::TASKS, tasks, 2), (keys::DISCOVERIES, "[]", 1)]);
    assert_eq!(outcome, WriteOutcome::Written);
    assert_eq!(cache.read(keys::DISCOVERIES).as_deref(), Some("[]"));
    assert_eq!(cache.version(keys::DISCOVERIES), Some(1));
}

#[test]
fn unavailable_backend_reads_absent_and_reports_writes() {
    let store = Arc::new(MemoryStore::new());
    let cache = LocalCache::new(store.clone(), 1024);
    assert_eq!(cache.write("k", "v"), WriteOutcome::Written);

    store.set_unavailable(true);
    assert_eq!(cache.read("k"), None);
    assert_eq!(cache.write("k", "w"), WriteOutcome::Unavailable);
    assert!(!cache.write("k", "w").is_written());

    store.set_unavailable(false);
    assert_eq!(cache.read("k").as_deref(), Some("v"));
}

#[test]
fn notify_reaches_subscribers() {
    let cache = LocalCache::in_memory(1024);
    let mut events = cache.subscribe();
    cache.notify(keys::DISCOVERIES, Some("[]".into()));

    let event = events.try_recv().expect("event delivered");
    assert_eq!(event.key, keys::DISCOVERIES);
    assert_eq!(event.new_value.as_deref(), Some("[]"));
}

#[test]
fn file_store_persists_across_instances() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("local-storage.json");

    let store = FileStore::new(&path);
    store.set("a", "1").expect("set");
    store.set("b", "22").expect("set");
    store.remove("a").expect("remove");

    let reopened = FileStore::new(&path);
    assert_eq!(reopened.get("a").expect("get"), None);
    assert_eq!(reopened.get("b").expect("get").as_deref(), Some("22"));
    assert_eq!(reopened.used_bytes().expect("size"), "b".len() + "22".len());
}

#[test]
fn file_store_missing_file_reads_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileStore::new(dir.path().join("absent.json"));
    assert_eq!(store.get("x").expect("get"), None);
    assert_eq!(store.used_bytes().expect("size"), 0);
}

#[test]
fn corrupt_file_store_is_moved_aside_and_writable_again() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("local-storage.json");
    std::fs::write(&path, "{broken").expect("write");

    let cache = LocalCache::new(Arc::new(FileStore::new(&path)), 1024);
    assert_eq!(cache.read("x"), None);
    assert_eq!(cache.write("x", "1"), WriteOutcome::Written);
    assert_eq!(cache.read("x").as_deref(), Some("1"));

    let aside = dir.path().join("local-storage.json.corrupt");
    assert_eq!(std::fs::read_to_string(aside).expect("kept"), "{broken");
}
