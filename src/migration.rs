//! Read-side migration from stored shapes into the current collections.
//!
//! Dispatch order for tasks:
//!
//! 1. A version tag equal to [`TASKS_VERSION`] makes the current key
//!    authoritative, even when it holds an empty array.
//! 2. Untagged stores (older clients, raw server snapshots) use the current
//!    key when it holds at least one task.
//! 3. Otherwise the legacy column board is flattened.
//! 4. Otherwise the collection is empty.
//!
//! Loading never writes. The migrated shape reaches storage with the first
//! mutation, and the legacy key is never touched.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, info};

use crate::cache::{keys, parse, LocalCache};
use crate::models::discovery::Discovery;
use crate::models::legacy::flatten_columns;
use crate::models::task::{Task, TASKS_VERSION};
use crate::models::today;

/// Load the task collection, migrating from the legacy board if needed.
#[must_use]
pub fn load_tasks(cache: &LocalCache) -> Vec<Task> {
    let current = decode_tasks(cache.read(keys::TASKS).as_deref());

    if cache.version(keys::TASKS) == Some(TASKS_VERSION) {
        return current;
    }
    if !current.is_empty() {
        return current;
    }

    let legacy: Value = parse(cache.read(keys::LEGACY_COLUMNS).as_deref(), Value::Null);
    match flatten_columns(&legacy) {
        Some(mut tasks) => {
            assign_stable_ids(&mut tasks, "legacy");
            info!(count = tasks.len(), "migrated legacy column board");
            tasks
        }
        None => Vec::new(),
    }
}

/// Load the discovery collection, coercing malformed entries.
#[must_use]
pub fn load_discoveries(cache: &LocalCache) -> Vec<Discovery> {
    decode_discoveries(cache.read(keys::DISCOVERIES).as_deref())
}

/// Decode a raw tasks value.
///
/// Non-object entries are dropped. Missing, empty or repeated ids are
/// replaced with ids derived from the record's position, so two loads of the
/// same value agree on them.
#[must_use]
pub fn decode_tasks(raw: Option<&str>) -> Vec<Task> {
    let entries: Vec<Value> = parse(raw, Vec::new());
    let mut tasks: Vec<Task> = entries
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|entry| match serde_json::from_value::<Task>(entry) {
            Ok(task) => Some(task),
            Err(err) => {
                debug!(%err, "dropping undecodable task record");
                None
            }
        })
        .collect();
    assign_stable_ids(&mut tasks, "task");
    tasks
}

/// Replace empty and repeated ids with `<prefix>-<position>`.
///
/// The first holder of an id keeps it. Derived ids never collide with an id
/// already present in the collection.
fn assign_stable_ids(tasks: &mut [Task], prefix: &str) {
    let mut taken = HashSet::new();
    let mut missing = Vec::new();
    for (index, task) in tasks.iter().enumerate() {
        if task.id.is_empty() || !taken.insert(task.id.clone()) {
            missing.push(index);
        }
    }
    for index in missing {
        let mut candidate = format!("{prefix}-{index}");
        let mut n = 1;
        while taken.contains(&candidate) {
            candidate = format!("{prefix}-{index}-{n}");
            n += 1;
        }
        taken.insert(candidate.clone());
        tasks[index].id = candidate;
    }
}

/// Decode a raw discoveries value, filling missing dates with today.
#[must_use]
pub fn decode_discoveries(raw: Option<&str>) -> Vec<Discovery> {
    let entries: Vec<Value> = parse(raw, Vec::new());
    let today = today();
    entries
        .iter()
        .map(|entry| Discovery::from_value(entry, &today))
        .collect()
}
