//! In-memory task collection.

use std::ops::Deref;
use std::sync::Arc;

use tokio::sync::watch;

use crate::domain::{StoreError, Task, TaskId};
use crate::observability::StoreCounts;

/// Immutable copy of the store contents, in display order.
///
/// Cheap to clone and never aliases the store's own storage, so a view can
/// keep iterating it while the store moves on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskSnapshot(Arc<[Task]>);

impl TaskSnapshot {
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.0.iter().find(|task| &task.id == id)
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.0.iter().map(|task| task.id.clone()).collect()
    }

    pub fn counts(&self) -> StoreCounts {
        StoreCounts::tally(self.0.iter())
    }
}

impl Deref for TaskSnapshot {
    type Target = [Task];

    fn deref(&self) -> &[Task] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a TaskSnapshot {
    type Item = &'a Task;
    type IntoIter = std::slice::Iter<'a, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The authoritative list of tasks as the UI currently understands it.
///
/// Design:
/// - Entries are kept in display order; updates and id remaps happen in place.
/// - At most one entry per id.
/// - Every effective change publishes a fresh `TaskSnapshot` to subscribers.
///   Publishing never fails, so a torn-down view cannot block a mutation.
pub struct TaskStore {
    tasks: Vec<Task>,
    changes: watch::Sender<TaskSnapshot>,
}

impl TaskStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(TaskSnapshot::default());
        Self {
            tasks: Vec::new(),
            changes,
        }
    }

    /// Set the full collection (after a fresh list fetch).
    ///
    /// A repeated id overwrites the earlier entry in place.
    pub fn replace_all(&mut self, tasks: impl IntoIterator<Item = Task>) {
        self.tasks.clear();
        for task in tasks {
            self.put(task);
        }
        self.publish();
    }

    /// Overwrite the entry with the same id in place, or append.
    pub fn upsert(&mut self, task: Task) {
        self.put(task);
        self.publish();
    }

    /// Remove an entry. Absent ids are a no-op.
    pub fn remove_by_id(&mut self, id: &TaskId) -> Option<Task> {
        let index = self.position(id)?;
        let removed = self.tasks.remove(index);
        self.publish();
        Some(removed)
    }

    /// Rekey one entry from `old` to `new`, keeping its fields and position.
    ///
    /// If `new` already holds a task with identical content, the `old` entry is
    /// a duplicate of it and is dropped. Any other occupant of `new` is a
    /// conflict and leaves the store untouched.
    pub fn remap_id(&mut self, old: &TaskId, new: TaskId) -> Result<(), StoreError> {
        let from = self
            .position(old)
            .ok_or_else(|| StoreError::NotFound(old.clone()))?;
        if *old == new {
            return Ok(());
        }

        if let Some(existing) = self.position(&new) {
            if !self.tasks[existing].same_content(&self.tasks[from]) {
                return Err(StoreError::Conflict {
                    from: old.clone(),
                    to: new,
                });
            }
            self.tasks.remove(from);
        } else {
            self.tasks[from].id = new;
        }
        self.publish();
        Ok(())
    }

    /// Set-to-snapshot: overwrite in place when present, otherwise insert at
    /// `position` (clamped to the end).
    pub fn restore(&mut self, task: Task, position: usize) {
        match self.position(&task.id) {
            Some(index) => self.tasks[index] = task,
            None => {
                let index = position.min(self.tasks.len());
                self.tasks.insert(index, task);
            }
        }
        self.publish();
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot(self.tasks.iter().cloned().collect())
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskSnapshot> {
        self.changes.subscribe()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| &task.id == id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| &task.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn counts(&self) -> StoreCounts {
        StoreCounts::tally(&self.tasks)
    }

    fn put(&mut self, task: Task) {
        match self.position(&task.id) {
            Some(index) => self.tasks[index] = task,
            None => self.tasks.push(task),
        }
    }

    fn publish(&self) {
        self.changes.send_replace(self.snapshot());
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
