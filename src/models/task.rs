//! Task record stored under the tasks key.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schema version written alongside the tasks collection.
pub const TASKS_VERSION: u32 = 2;

/// A single to-do item on the board.
///
/// Records read back without an `id` (older server snapshots drop it) decode
/// with an empty one; the migration loaders derive a stable replacement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    /// Opaque identifier, stable for the task's lifetime.
    #[serde(default)]
    pub id: String,
    /// User-entered text.
    #[serde(default)]
    pub text: String,
    /// Completion flag.
    #[serde(default)]
    pub done: bool,
    /// Creation date (`YYYY-MM-DD`); absent for migrated legacy tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl Task {
    /// Construct a new open task created on `date`.
    #[must_use]
    pub fn new(text: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            text: text.into(),
            done: false,
            date: Some(date.into()),
        }
    }
}

/// Generate a client-side task identifier.
#[must_use]
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
