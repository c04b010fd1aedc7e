//! Domain model module declarations.

pub mod discovery;
pub mod legacy;
pub mod snapshot;
pub mod task;

pub use discovery::Discovery;
pub use snapshot::{BackupReceipt, Snapshot, SyncedCounts};
pub use task::Task;

/// Today's calendar date as `YYYY-MM-DD`.
#[must_use]
pub fn today() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Summary counts over both collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BoardStats {
    /// Number of tasks.
    pub total_tasks: usize,
    /// Number of tasks marked done.
    pub completed_tasks: usize,
    /// Number of discoveries.
    pub total_discoveries: usize,
}

impl BoardStats {
    /// Count tasks and discoveries.
    #[must_use]
    pub fn from_collections(tasks: &[Task], discoveries: &[Discovery]) -> Self {
        Self {
            total_tasks: tasks.len(),
            completed_tasks: tasks.iter().filter(|t| t.done).count(),
            total_discoveries: discoveries.len(),
        }
    }

    /// Tasks not yet done.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.total_tasks.saturating_sub(self.completed_tasks)
    }
}
