//! Unit tests for read-side migration of stored collections.

use serde_json::json;

use workboard::cache::{keys, LocalCache};
use workboard::migration::{decode_tasks, load_discoveries, load_tasks};
use workboard::models::legacy::flatten_columns;
use workboard::models::task::TASKS_VERSION;
use workboard::models::Task;

fn cache() -> LocalCache {
    LocalCache::in_memory(1024 * 1024)
}

fn legacy_board() -> String {
    json!([
        { "title": "todo", "tasks": [{ "id": "t1", "title": "first" }, { "title": "second" }] },
        { "title": "doing" },
        { "title": "done", "tasks": [{ "id": 42, "title": "third" }] },
    ])
    .to_string()
}

#[test]
fn empty_storage_loads_empty_collections() {
    let cache = cache();
    assert!(load_tasks(&cache).is_empty());
    assert!(load_discoveries(&cache).is_empty());
}

#[test]
fn current_key_wins_when_it_has_tasks() {
    let cache = cache();
    cache.write(keys::TASKS, r#"[{"id":"c1","text":"current","done":true}]"#);
    cache.write(keys::LEGACY_COLUMNS, &legacy_board());

    let tasks = load_tasks(&cache);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, "c1");
    assert!(tasks[0].done);
}

#[test]
fn legacy_board_is_flattened_in_column_then_task_order() {
    let cache = cache();
    cache.write(keys::LEGACY_COLUMNS, &legacy_board());

    let tasks = load_tasks(&cache);
    let texts: Vec<&str> = tasks.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, ["first", "second", "third"]);
    assert_eq!(tasks[0].id, "t1");
    assert_eq!(tasks[2].id, "42");
    assert_eq!(tasks[1].id, "legacy-0-1");
    assert!(tasks.iter().all(|t| !t.done && t.date.is_none()));
}

#[test]
fn untagged_empty_current_key_falls_through_to_legacy() {
    let cache = cache();
    cache.write(keys::TASKS, "[]");
    cache.write(keys::LEGACY_COLUMNS, &legacy_board());
    assert_eq!(load_tasks(&cache).len(), 3);
}

#[test]
fn tagged_empty_current_key_is_authoritative() {
    let cache = cache();
    cache.write_raw_collection(keys::TASKS, "[]", TASKS_VERSION);
    cache.write(keys::LEGACY_COLUMNS, &legacy_board());
    assert!(load_tasks(&cache).is_empty());
}

#[test]
fn loading_never_writes() {
    let cache = cache();
    cache.write(keys::LEGACY_COLUMNS, &legacy_board());
    let _ = load_tasks(&cache);

    assert_eq!(cache.read(keys::TASKS), None);
    assert_eq!(cache.read(keys::LEGACY_COLUMNS), Some(legacy_board()));
}

#[test]
fn migration_is_idempotent_once_persisted() {
    let cache = cache();
    cache.write(keys::LEGACY_COLUMNS, &legacy_board());

    let first = load_tasks(&cache);
    cache.write_collection(keys::TASKS, &first, TASKS_VERSION);
    let second = load_tasks(&cache);
    let third = load_tasks(&cache);

    assert_eq!(second, first);
    assert_eq!(third, first);
}

#[test]
fn non_array_legacy_value_is_ignored() {
    let cache = cache();
    cache.write(keys::LEGACY_COLUMNS, r#"{"columns":[]}"#);
    assert!(load_tasks(&cache).is_empty());

    cache.write(keys::LEGACY_COLUMNS, "not json");
    assert!(load_tasks(&cache).is_empty());
}

#[test]
fn legacy_records_that_are_not_objects_are_dropped() {
    let legacy = json!([{ "tasks": ["loose string", 3, { "title": "kept" }] }]);
    let tasks = flatten_columns(&legacy).expect("array input");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].text, "kept");
}

#[test]
fn decode_tasks_fills_defaults_and_drops_garbage() {
    let raw = r#"[{"text":"no id"}, "loose", {"id":"x","text":"ok","done":"maybe"}, {"id":"y"}]"#;
    let tasks: Vec<Task> = decode_tasks(Some(raw));

    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].text, "no id");
    assert!(!tasks[0].id.is_empty());
    assert!(!tasks[0].done);
    assert_eq!(tasks[1].id, "y");
    assert_eq!(tasks[1].text, "");
}

#[test]
fn discoveries_get_todays_date_when_missing() {
    let cache = cache();
    cache.write(keys::DISCOVERIES, r#"[{"text":"undated"},{"text":"dated","date":"2023-12-24"}]"#);

    let found = load_discoveries(&cache);
    assert_eq!(found[0].date, workboard::models::today());
    assert_eq!(found[1].date, "2023-12-24");
}

#[test]
fn derived_ids_are_the_same_on_every_load() {
    let cache = cache();
    cache.write(keys::TASKS, r#"[{"text":"x"},{"id":"b","text":"y"},{"id":"b","text":"z"}]"#);

    let first = load_tasks(&cache);
    let second = load_tasks(&cache);
    assert_eq!(first, second);
    let ids: Vec<&str> = first.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["task-0", "b", "task-2"]);
}

#[test]
fn derived_ids_skip_ids_already_in_use() {
    let tasks = decode_tasks(Some(r#"[{"id":"task-1","text":"a"},{"text":"b"}]"#));
    let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["task-1", "task-1-1"]);
}
