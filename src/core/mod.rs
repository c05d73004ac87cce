//! Core task-list logic.
//!
//! This module contains:
//! - TaskStore: Active and history lists with their ordering rules
//! - ArchiveScheduler: Per-task delayed archival timers
//! - TaskList: Single-owner actor combining the two
//! - Orchestrator: Voice-to-task pipeline

pub mod orchestrator;
pub mod scheduler;
pub mod task_list;
pub mod task_store;

// Re-export commonly used types
pub use orchestrator::{Orchestrator, PipelineError, PipelineOutcome};
pub use scheduler::{ArchiveFire, ArchiveScheduler, DEFAULT_GRACE_PERIOD};
pub use task_list::{TaskList, TaskListError};
pub use task_store::{TaskError, TaskStore};
