//! Legacy column-board shape, read once during migration.
//!
//! The old board stored an array of columns, each with a nested `tasks`
//! array of `{ id?, title }` records. It is only ever read.

use serde_json::Value;

use super::task::Task;

/// Flatten a legacy column board into current-shape tasks.
///
/// Columns are visited in order, then each column's tasks in order.
/// Columns that are not objects, or whose `tasks` field is not an array, are
/// skipped. Non-object task entries are dropped. Migrated tasks are open and
/// carry no date. A record without an id gets `legacy-<column>-<position>`,
/// so repeated migrations of the same board agree on it.
///
/// Returns `None` when `legacy` is not an array at all.
#[must_use]
pub fn flatten_columns(legacy: &Value) -> Option<Vec<Task>> {
    let columns = legacy.as_array()?;
    let tasks = columns
        .iter()
        .enumerate()
        .filter_map(|(c, column)| Some((c, column.get("tasks")?.as_array()?)))
        .flat_map(|(c, records)| {
            records.iter().enumerate().filter_map(move |(i, record)| {
                let record = record.as_object()?;
                Some(Task {
                    id: record
                        .get("id")
                        .and_then(scalar_string)
                        .unwrap_or_else(|| format!("legacy-{c}-{i}")),
                    text: record.get("title").and_then(scalar_string).unwrap_or_default(),
                    done: false,
                    date: None,
                })
            })
        })
        .collect();
    Some(tasks)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
