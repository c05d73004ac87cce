//! Task store: the active and history lists.
//!
//! Pure state with no I/O and no timers. Mutations that change archival
//! eligibility return a [`StoreSignal`] for the caller to forward to the
//! archive scheduler.
//!
//! Invariants:
//! - A task id appears at most once across both lists.
//! - Tasks enter history only through [`TaskStore::archive_if_still_completed`].
//! - Every history entry has `completed = true`.

use thiserror::Error;

use crate::domain::{StoreSignal, Task, TaskId, TaskSnapshot};

/// Errors returned by store mutations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("Invalid input: task text is empty")]
    InvalidInput,
}

/// Owner of the two ordered task lists
#[derive(Debug, Default)]
pub struct TaskStore {
    /// Insertion order, appended at the end
    active: Vec<Task>,

    /// Newest first, inserted at the head
    history: Vec<Task>,
}

impl TaskStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new incomplete task. Text is trimmed before storing.
    pub fn add_task(&mut self, text: &str) -> Result<TaskId, TaskError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TaskError::InvalidInput);
        }

        let task = Task::new(text);
        let id = task.id;
        self.active.push(task);
        Ok(id)
    }

    /// Flip `completed` on an active task. Unknown ids are a silent no-op.
    pub fn toggle_task(&mut self, id: TaskId) -> Option<StoreSignal> {
        let task = self.active.iter_mut().find(|t| t.id == id)?;
        task.completed = !task.completed;

        if task.completed {
            Some(StoreSignal::Armed(id))
        } else {
            Some(StoreSignal::Disarmed(id))
        }
    }

    /// Remove an active task regardless of state.
    ///
    /// Always returns a disarm signal for `id`, even when the task was
    /// unknown or never completed.
    pub fn delete_task(&mut self, id: TaskId) -> (Option<Task>, StoreSignal) {
        let removed = self
            .active
            .iter()
            .position(|t| t.id == id)
            .map(|idx| self.active.remove(idx));
        (removed, StoreSignal::Disarmed(id))
    }

    /// Remove the active task at `index`. Out-of-range indexes are a no-op.
    pub fn delete_at(&mut self, index: usize) -> Option<(Task, StoreSignal)> {
        if index >= self.active.len() {
            return None;
        }
        let task = self.active.remove(index);
        let signal = StoreSignal::Disarmed(task.id);
        Some((task, signal))
    }

    /// Move `id` to the head of history if it is still active and completed.
    ///
    /// Returns whether the task moved. Absent or uncompleted tasks are left
    /// untouched, so this is safe to call from a stale timer.
    pub fn archive_if_still_completed(&mut self, id: TaskId) -> bool {
        let Some(idx) = self.active.iter().position(|t| t.id == id) else {
            return false;
        };
        if !self.active[idx].completed {
            return false;
        }

        let task = self.active.remove(idx);
        self.history.insert(0, task);
        true
    }

    /// Empty the history list. The active list is never touched.
    pub fn clear_history(&mut self) -> usize {
        let count = self.history.len();
        self.history.clear();
        count
    }

    /// Active tasks, oldest first
    pub fn active(&self) -> &[Task] {
        &self.active
    }

    /// Archived tasks, newest first
    pub fn history(&self) -> &[Task] {
        &self.history
    }

    /// Identifier of the active task at `index`
    pub fn id_at(&self, index: usize) -> Option<TaskId> {
        self.active.get(index).map(|t| t.id)
    }

    /// Copy both lists
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            active: self.active.clone(),
            history: self.history.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_appends_incomplete_task() {
        let mut store = TaskStore::new();
        store.add_task("first").unwrap();
        let id = store.add_task("  second  ").unwrap();

        assert_eq!(store.active().len(), 2);
        let last = store.active().last().unwrap();
        assert_eq!(last.id, id);
        assert_eq!(last.text, "second");
        assert!(!last.completed);
    }

    #[test]
    fn test_add_rejects_blank_text() {
        let mut store = TaskStore::new();
        assert_eq!(store.add_task(""), Err(TaskError::InvalidInput));
        assert_eq!(store.add_task(" \t\n"), Err(TaskError::InvalidInput));
        assert!(store.active().is_empty());
        assert!(store.history().is_empty());
    }

    #[test]
    fn test_toggle_emits_arm_then_disarm() {
        let mut store = TaskStore::new();
        let id = store.add_task("Buy milk").unwrap();

        assert_eq!(store.toggle_task(id), Some(StoreSignal::Armed(id)));
        assert!(store.active()[0].completed);

        assert_eq!(store.toggle_task(id), Some(StoreSignal::Disarmed(id)));
        assert!(!store.active()[0].completed);
    }

    #[test]
    fn test_toggle_unknown_id_is_noop() {
        let mut store = TaskStore::new();
        store.add_task("Buy milk").unwrap();
        assert_eq!(store.toggle_task(TaskId::new()), None);
        assert!(!store.active()[0].completed);
    }

    #[test]
    fn test_delete_always_disarms() {
        let mut store = TaskStore::new();
        let id = store.add_task("Buy milk").unwrap();

        let (removed, signal) = store.delete_task(id);
        assert_eq!(removed.map(|t| t.text), Some("Buy milk".to_string()));
        assert_eq!(signal, StoreSignal::Disarmed(id));
        assert!(store.active().is_empty());

        let (removed, signal) = store.delete_task(id);
        assert!(removed.is_none());
        assert_eq!(signal, StoreSignal::Disarmed(id));
    }

    #[test]
    fn test_delete_at_index() {
        let mut store = TaskStore::new();
        store.add_task("a").unwrap();
        let b = store.add_task("b").unwrap();
        store.add_task("c").unwrap();

        let (task, signal) = store.delete_at(1).unwrap();
        assert_eq!(task.id, b);
        assert_eq!(signal, StoreSignal::Disarmed(b));
        assert!(store.delete_at(5).is_none());

        let texts: Vec<_> = store.active().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "c"]);
    }

    #[test]
    fn test_archive_moves_completed_to_history_head() {
        let mut store = TaskStore::new();
        let a = store.add_task("a").unwrap();
        let b = store.add_task("b").unwrap();

        store.toggle_task(a);
        store.toggle_task(b);
        assert!(store.archive_if_still_completed(a));
        assert!(store.archive_if_still_completed(b));

        assert!(store.active().is_empty());
        let history: Vec<_> = store.history().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(history, vec!["b", "a"]);
        assert!(store.history().iter().all(|t| t.completed));
    }

    #[test]
    fn test_archive_skips_uncompleted_or_missing() {
        let mut store = TaskStore::new();
        let id = store.add_task("a").unwrap();

        assert!(!store.archive_if_still_completed(id));
        assert!(!store.archive_if_still_completed(TaskId::new()));

        store.toggle_task(id);
        store.toggle_task(id);
        assert!(!store.archive_if_still_completed(id));
        assert_eq!(store.active().len(), 1);
        assert!(store.history().is_empty());
    }

    #[test]
    fn test_archive_is_idempotent() {
        let mut store = TaskStore::new();
        let id = store.add_task("a").unwrap();
        store.toggle_task(id);

        assert!(store.archive_if_still_completed(id));
        assert!(!store.archive_if_still_completed(id));
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn test_archived_task_is_terminal() {
        let mut store = TaskStore::new();
        let id = store.add_task("a").unwrap();
        store.toggle_task(id);
        store.archive_if_still_completed(id);

        assert_eq!(store.toggle_task(id), None);
        let (removed, _) = store.delete_task(id);
        assert!(removed.is_none());
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn test_clear_history_leaves_active() {
        let mut store = TaskStore::new();
        let a = store.add_task("a").unwrap();
        store.add_task("b").unwrap();
        store.toggle_task(a);
        store.archive_if_still_completed(a);

        assert_eq!(store.clear_history(), 1);
        assert!(store.history().is_empty());
        assert_eq!(store.active().len(), 1);
        assert_eq!(store.active()[0].text, "b");
    }
}
