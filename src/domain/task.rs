//! Task records and list snapshots.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique, immutable task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Allocate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// First 8 characters, for compact display
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single entry in the task list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Assigned once at creation
    pub id: TaskId,

    /// Display text (never empty)
    pub text: String,

    /// Whether the user has checked this task off
    pub completed: bool,
}

impl Task {
    /// Create an incomplete task with a fresh identifier
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            text: text.into(),
            completed: false,
        }
    }
}

/// Point-in-time copy of both lists, in presentation order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Active tasks, oldest first
    pub active: Vec<Task>,

    /// Archived tasks, newest first
    pub history: Vec<Task>,
}

impl TaskSnapshot {
    /// Texts of the active list, in order
    pub fn active_texts(&self) -> Vec<&str> {
        self.active.iter().map(|t| t.text.as_str()).collect()
    }

    /// Texts of the history list, in order
    pub fn history_texts(&self) -> Vec<&str> {
        self.history.iter().map(|t| t.text.as_str()).collect()
    }

    /// Look up an active task by identifier
    pub fn find_active(&self, id: TaskId) -> Option<&Task> {
        self.active.iter().find(|t| t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_incomplete() {
        let task = Task::new("Buy milk");
        assert_eq!(task.text, "Buy milk");
        assert!(!task.completed);
    }

    #[test]
    fn test_task_ids_are_unique() {
        let a = Task::new("one");
        let b = Task::new("one");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_task_id_serializes_as_plain_uuid() {
        let id = TaskId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
        assert_eq!(id.short().len(), 8);
    }
}
