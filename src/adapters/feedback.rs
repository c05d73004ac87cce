//! User feedback capability.
//!
//! The orchestrator reports notable moments (recording started, tasks
//! added, failure) to an optional [`Feedback`] sink. Whatever renders them
//! (sound, vibration, terminal bell) lives outside this crate.

use tracing::info;

/// Moments worth signalling to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackEvent {
    RecordingStarted,
    RecordingStopped,
    TasksAdded(usize),
    Failed(String),
}

/// Feedback sink injected into the orchestrator
pub trait Feedback: Send + Sync {
    fn notify(&self, event: FeedbackEvent);
}

/// Feedback sink that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFeedback;

impl Feedback for LogFeedback {
    fn notify(&self, event: FeedbackEvent) {
        match event {
            FeedbackEvent::RecordingStarted => info!("Listening..."),
            FeedbackEvent::RecordingStopped => info!("Processing..."),
            FeedbackEvent::TasksAdded(count) => info!(count, "Tasks added"),
            FeedbackEvent::Failed(error) => info!(%error, "Voice capture failed"),
        }
    }
}
