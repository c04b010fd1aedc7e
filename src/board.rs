//! Task and discovery collections with their user-facing mutations.
//!
//! Each board holds the in-memory collection and persists the whole of it
//! to the local cache after every successful mutation. Rejected mutations
//! (blank text, unknown id) leave both memory and storage untouched.

use std::sync::Arc;

use crate::cache::{keys, LocalCache, StorageEvent, WriteOutcome};
use crate::migration::{decode_discoveries, decode_tasks, load_discoveries, load_tasks};
use crate::models::discovery::DISCOVERIES_VERSION;
use crate::models::task::TASKS_VERSION;
use crate::models::{today, BoardStats, Discovery, Task};

/// The task list, newest first.
pub struct TaskBoard {
    cache: Arc<LocalCache>,
    tasks: Vec<Task>,
    last_write: Option<WriteOutcome>,
}

impl TaskBoard {
    /// Load tasks from the cache, migrating a legacy board if present.
    #[must_use]
    pub fn load(cache: Arc<LocalCache>) -> Self {
        let tasks = load_tasks(&cache);
        Self {
            cache,
            tasks,
            last_write: None,
        }
    }

    /// Current tasks, newest first.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Look a task up by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Outcome of the most recent persist, if any mutation happened.
    #[must_use]
    pub fn last_write(&self) -> Option<WriteOutcome> {
        self.last_write
    }

    /// Prepend a task dated today. Blank text is ignored.
    pub fn add(&mut self, text: &str) -> Option<&Task> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.tasks.insert(0, Task::new(text, today()));
        self.persist();
        self.tasks.first()
    }

    /// Flip the completion flag of the task with `id`.
    pub fn toggle(&mut self, id: &str) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        task.done = !task.done;
        self.persist();
        true
    }

    /// Remove the task with `id`, keeping the order of the rest.
    pub fn remove(&mut self, id: &str) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        let removed = self.tasks.remove(index);
        self.persist();
        Some(removed)
    }

    /// Counts for the task side of the board.
    #[must_use]
    pub fn stats(&self) -> BoardStats {
        BoardStats::from_collections(&self.tasks, &[])
    }

    /// Refresh from a change notification. Returns whether it applied.
    pub fn apply_event(&mut self, event: &StorageEvent) -> bool {
        if event.key != keys::TASKS {
            return false;
        }
        self.tasks = decode_tasks(event.new_value.as_deref());
        true
    }

    fn persist(&mut self) {
        self.last_write = Some(
            self.cache
                .write_collection(keys::TASKS, &self.tasks, TASKS_VERSION),
        );
    }
}

/// The discovery list, newest first.
pub struct DiscoveryBoard {
    cache: Arc<LocalCache>,
    items: Vec<Discovery>,
    last_write: Option<WriteOutcome>,
}

impl DiscoveryBoard {
    /// Load discoveries from the cache.
    #[must_use]
    pub fn load(cache: Arc<LocalCache>) -> Self {
        let items = load_discoveries(&cache);
        Self {
            cache,
            items,
            last_write: None,
        }
    }

    /// Current discoveries, newest first.
    #[must_use]
    pub fn discoveries(&self) -> &[Discovery] {
        &self.items
    }

    /// Outcome of the most recent persist, if any mutation happened.
    #[must_use]
    pub fn last_write(&self) -> Option<WriteOutcome> {
        self.last_write
    }

    /// Prepend a discovery dated today. Blank text is ignored.
    pub fn add(&mut self, text: &str) -> Option<&Discovery> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.items.insert(0, Discovery::new(text, today()));
        self.persist();
        self.items.first()
    }

    /// Remove the discovery at `index` (0 is the newest).
    pub fn remove(&mut self, index: usize) -> Option<Discovery> {
        if index >= self.items.len() {
            return None;
        }
        let removed = self.items.remove(index);
        self.persist();
        Some(removed)
    }

    /// Refresh from a change notification. Returns whether it applied.
    pub fn apply_event(&mut self, event: &StorageEvent) -> bool {
        if event.key != keys::DISCOVERIES {
            return false;
        }
        self.items = decode_discoveries(event.new_value.as_deref());
        true
    }

    fn persist(&mut self) {
        self.last_write = Some(self.cache.write_collection(
            keys::DISCOVERIES,
            &self.items,
            DISCOVERIES_VERSION,
        ));
    }
}
