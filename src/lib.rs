//! taskman - Voice-driven personal task list
//!
//! Speak a note, get tasks. A recording is transcribed, split into short
//! task descriptions by a language service, and appended to an active list.
//! Completed tasks move to history after a grace period unless they are
//! un-completed or deleted first.
//!
//! # Architecture
//!
//! The task list has a single owner:
//! - One tokio task holds the active list, history, and archive timers
//! - Callers send commands over a channel and read snapshots from a watch
//! - Timer fires go through the same loop, so every mutation is serialized
//!
//! # Modules
//!
//! - `adapters`: Task extraction service and user feedback
//! - `core`: Task store, archive scheduler, task list actor, orchestrator
//! - `domain`: Data structures (Task, AudioArtifact, StoreSignal)
//! - `ingest`: Audio recording and speech transcription
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Interactive session
//! taskman shell
//!
//! # Extract tasks from an existing recording
//! taskman process note.m4a
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;

// Re-export main types at crate root for convenience
pub use core::{Orchestrator, PipelineError, PipelineOutcome, TaskList};
pub use domain::{AudioArtifact, Task, TaskId, TaskSnapshot};
