//! Domain types for taskman.
//!
//! This module contains the core data structures:
//! - Task: List entries and snapshots
//! - Events: Archival signals emitted by the store
//! - Artifact: Finished audio recordings

pub mod artifact;
pub mod events;
pub mod task;

// Re-export commonly used types
pub use artifact::{compute_file_hash, AudioArtifact, AudioFormat};
pub use events::StoreSignal;
pub use task::{Task, TaskId, TaskSnapshot};
