//! Adapter interfaces for external systems.
//!
//! Adapters sit between the pipeline and services it does not own:
//! the language-understanding service that extracts tasks, and the
//! feedback sink that signals the user.

pub mod extractor;
pub mod feedback;

pub use extractor::{
    parse_task_list, ExtractionClient, ExtractionError, LanguageService, MessagesApiExtractor,
};
pub use feedback::{Feedback, FeedbackEvent, LogFeedback};
