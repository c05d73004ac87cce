//! Voice capture side of the pipeline.
//!
//! 1. **Recorder**: one audio capture session at a time (ffmpeg backend)
//! 2. **Transcriber**: final transcript for a finished recording (whisper backend)
//!
//! # Architecture
//!
//! ```text
//! microphone → Recorder → artifact (.m4a) → Transcriber → utterance text
//! ```

pub mod recorder;
pub mod transcriber;

// Re-export key types
pub use recorder::{
    AudioCapture, CaptureSession, FfmpegCapture, RecorderController, RecorderError, RecorderState,
};
pub use transcriber::{
    language_for_locale, SpeechEngine, TranscriptResult, TranscriptionBridge, TranscriptionError,
    WhisperEngine,
};
