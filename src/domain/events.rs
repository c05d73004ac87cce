//! Signals emitted by the task store.
//!
//! The store never schedules anything itself. Mutations that affect
//! archival return a signal, and the owner forwards it to the scheduler.

use serde::{Deserialize, Serialize};

use super::task::TaskId;

/// Archival signal produced by a store mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "task_id", rename_all = "snake_case")]
pub enum StoreSignal {
    /// Task became completed; start its grace period
    Armed(TaskId),

    /// Task is no longer eligible; cancel any pending archival
    Disarmed(TaskId),
}

impl StoreSignal {
    /// Identifier the signal refers to
    pub fn task_id(&self) -> TaskId {
        match self {
            Self::Armed(id) | Self::Disarmed(id) => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_serialization() {
        let id = TaskId::new();
        let json = serde_json::to_string(&StoreSignal::Armed(id)).unwrap();
        assert!(json.contains("\"type\":\"armed\""));

        let parsed: StoreSignal = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, StoreSignal::Armed(id));
        assert_eq!(parsed.task_id(), id);
    }
}
