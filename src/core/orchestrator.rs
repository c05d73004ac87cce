//! Voice-to-task pipeline orchestrator.
//!
//! Sequences one run:
//!
//! ```text
//! stop recorder → transcribe → extract → add each task (in order)
//! ```
//!
//! A failure in transcription or extraction aborts the run before any task
//! is inserted. Insertion is a single local operation on the task list, so
//! a run never leaves a partial batch behind.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::adapters::{
    ExtractionClient, ExtractionError, Feedback, FeedbackEvent, MessagesApiExtractor,
};
use crate::config::{self, ResolvedConfig};
use crate::domain::{compute_file_hash, AudioArtifact, AudioFormat, TaskId};
use crate::ingest::{
    FfmpegCapture, RecorderController, RecorderError, RecorderState, TranscriptionBridge,
    TranscriptionError, WhisperEngine,
};

use super::task_list::{TaskList, TaskListError};
use super::task_store::TaskError;

/// User-visible pipeline failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("Invalid input: task text is empty")]
    InvalidInput,

    #[error("Recording unavailable: {0}")]
    RecordingUnavailable(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Task list owner has stopped")]
    TaskListClosed,
}

impl From<RecorderError> for PipelineError {
    fn from(e: RecorderError) -> Self {
        match e {
            RecorderError::RecordingUnavailable(cause) => Self::RecordingUnavailable(cause),
        }
    }
}

impl From<TranscriptionError> for PipelineError {
    fn from(e: TranscriptionError) -> Self {
        match e {
            TranscriptionError::TranscriptionFailed(cause) => Self::TranscriptionFailed(cause),
        }
    }
}

impl From<ExtractionError> for PipelineError {
    fn from(e: ExtractionError) -> Self {
        match e {
            ExtractionError::ExtractionFailed(cause) => Self::ExtractionFailed(cause),
        }
    }
}

impl From<TaskListError> for PipelineError {
    fn from(e: TaskListError) -> Self {
        match e {
            TaskListError::Task(TaskError::InvalidInput) => Self::InvalidInput,
            TaskListError::Closed => Self::TaskListClosed,
        }
    }
}

/// Result of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The recorder produced nothing to process
    NoArtifact,

    /// The run finished; `added` may be empty
    Completed {
        transcript: String,
        added: Vec<TaskId>,
    },
}

impl PipelineOutcome {
    /// Tasks inserted by this run
    pub fn added(&self) -> &[TaskId] {
        match self {
            Self::NoArtifact => &[],
            Self::Completed { added, .. } => added,
        }
    }
}

/// Counts one run as in flight until dropped, however the run ends
struct ProcessingGuard<'a>(&'a AtomicUsize);

impl<'a> ProcessingGuard<'a> {
    fn enter(runs: &'a AtomicUsize) -> Self {
        runs.fetch_add(1, Ordering::AcqRel);
        Self(runs)
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Voice-to-task pipeline
pub struct Orchestrator {
    recorder: Mutex<RecorderController>,
    transcriber: TranscriptionBridge,
    extractor: ExtractionClient,
    tasks: TaskList,
    feedback: Option<Arc<dyn Feedback>>,
    keep_recordings: bool,
    runs_in_flight: AtomicUsize,
}

impl Orchestrator {
    /// Assemble an orchestrator from its parts
    pub fn new(
        recorder: RecorderController,
        transcriber: TranscriptionBridge,
        extractor: ExtractionClient,
        tasks: TaskList,
    ) -> Self {
        Self {
            recorder: Mutex::new(recorder),
            transcriber,
            extractor,
            tasks,
            feedback: None,
            keep_recordings: false,
            runs_in_flight: AtomicUsize::new(0),
        }
    }

    /// Build the default stack (ffmpeg, whisper, Messages API) from configuration.
    ///
    /// Spawns the task list owner, so this must run inside a tokio runtime.
    pub fn from_config(cfg: &ResolvedConfig) -> Self {
        let capture = FfmpegCapture::new(
            &cfg.recorder.ffmpeg_path,
            &cfg.recorder.input_format,
            &cfg.recorder.input_device,
        );
        let format = AudioFormat {
            sample_rate: cfg.recorder.sample_rate,
            channels: cfg.recorder.channels,
            ..AudioFormat::default()
        };
        let recorder =
            RecorderController::new(Arc::new(capture), format, config::recordings_dir_for(cfg));

        let engine = WhisperEngine::new(&cfg.transcription.whisper_path, &cfg.transcription.model);
        let transcriber = TranscriptionBridge::new(
            Arc::new(engine),
            &cfg.transcription.locale,
            Duration::from_secs(cfg.transcription.timeout_seconds),
        );

        let service = MessagesApiExtractor::new(
            cfg.extraction.endpoint.clone(),
            cfg.extraction.model.clone(),
            cfg.extraction.api_key.clone(),
            cfg.extraction.max_tokens,
        );
        let extractor = ExtractionClient::new(
            Arc::new(service),
            Duration::from_secs(cfg.extraction.timeout_seconds),
        );

        let tasks = TaskList::spawn(Duration::from_secs(cfg.archive.grace_period_seconds));

        Self::new(recorder, transcriber, extractor, tasks)
            .keep_recordings(cfg.recorder.keep_recordings)
    }

    /// Attach a feedback sink
    pub fn with_feedback(mut self, feedback: Arc<dyn Feedback>) -> Self {
        self.feedback = Some(feedback);
        self
    }

    /// Keep artifact files after processing instead of deleting them
    pub fn keep_recordings(mut self, keep: bool) -> Self {
        self.keep_recordings = keep;
        self
    }

    /// Handle to the task list this pipeline feeds
    pub fn tasks(&self) -> &TaskList {
        &self.tasks
    }

    /// Whether any pipeline run is in flight
    pub fn is_processing(&self) -> bool {
        self.runs_in_flight.load(Ordering::Acquire) > 0
    }

    /// Current recorder state
    pub async fn recorder_state(&self) -> RecorderState {
        self.recorder.lock().await.state()
    }

    /// How long the current recording has been running (zero when idle)
    pub async fn recording_elapsed(&self) -> Duration {
        self.recorder.lock().await.elapsed()
    }

    /// Check whether the recorder backend can capture audio
    pub async fn check_recording_available(&self) -> Result<(), PipelineError> {
        Ok(self.recorder.lock().await.check_available().await?)
    }

    fn notify(&self, event: FeedbackEvent) {
        if let Some(feedback) = &self.feedback {
            feedback.notify(event);
        }
    }

    /// Add a typed task
    pub async fn add_text_task(&self, text: &str) -> Result<TaskId, PipelineError> {
        let id = self.tasks.add_task(text).await?;
        self.notify(FeedbackEvent::TasksAdded(1));
        Ok(id)
    }

    /// Begin recording. Ignored if already recording.
    pub async fn start_recording(&self) -> Result<(), PipelineError> {
        let mut recorder = self.recorder.lock().await;
        if recorder.is_recording() {
            return Ok(());
        }

        if let Err(e) = recorder.start().await {
            warn!(error = %e, "Could not start recording");
            self.notify(FeedbackEvent::Failed(e.to_string()));
            return Err(e.into());
        }
        self.notify(FeedbackEvent::RecordingStarted);
        Ok(())
    }

    /// Stop recording and run the pipeline on the result
    #[instrument(skip(self))]
    pub async fn stop_and_process(&self) -> Result<PipelineOutcome, PipelineError> {
        let artifact = {
            let mut recorder = self.recorder.lock().await;
            if !recorder.is_recording() {
                return Ok(PipelineOutcome::NoArtifact);
            }
            recorder.stop().await
        };
        self.notify(FeedbackEvent::RecordingStopped);

        let Some(artifact) = artifact else {
            info!("No recording to process");
            return Ok(PipelineOutcome::NoArtifact);
        };

        let result = self.process_artifact(&artifact).await;

        if !self.keep_recordings {
            if let Err(e) = tokio::fs::remove_file(artifact.path()).await {
                warn!(file = %artifact.file_name(), error = %e, "Failed to remove recording");
            }
        }

        result
    }

    /// Start when idle, otherwise stop and process.
    ///
    /// Returns `None` when this call started a recording.
    pub async fn toggle_recording(&self) -> Result<Option<PipelineOutcome>, PipelineError> {
        if self.recorder_state().await == RecorderState::Recording {
            self.stop_and_process().await.map(Some)
        } else {
            self.start_recording().await.map(|_| None)
        }
    }

    /// Transcribe, extract and insert tasks for an existing recording
    #[instrument(skip(self, artifact), fields(file = %artifact.file_name()))]
    pub async fn process_artifact(
        &self,
        artifact: &AudioArtifact,
    ) -> Result<PipelineOutcome, PipelineError> {
        let _guard = ProcessingGuard::enter(&self.runs_in_flight);

        let audio_id = compute_file_hash(artifact.path())
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        info!(%audio_id, duration_ms = artifact.duration_ms, "Processing recording");

        match self.run_stages(artifact).await {
            Ok(outcome) => {
                let count = outcome.added().len();
                info!(%audio_id, count, "Pipeline run completed");
                self.notify(FeedbackEvent::TasksAdded(count));
                Ok(outcome)
            }
            Err(e) => {
                error!(%audio_id, error = %e, "Pipeline run failed");
                self.notify(FeedbackEvent::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run_stages(&self, artifact: &AudioArtifact) -> Result<PipelineOutcome, PipelineError> {
        let transcript = self.transcriber.transcribe(artifact).await?;

        if transcript.trim().is_empty() {
            info!("Empty transcript, nothing to extract");
            return Ok(PipelineOutcome::Completed {
                transcript,
                added: Vec::new(),
            });
        }

        let texts = self.extractor.extract_tasks(&transcript).await?;
        let added = if texts.is_empty() {
            Vec::new()
        } else {
            self.tasks.add_tasks(texts).await?
        };

        Ok(PipelineOutcome::Completed { transcript, added })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions_keep_cause() {
        let e: PipelineError = TranscriptionError::TranscriptionFailed("no speech".into()).into();
        assert_eq!(e, PipelineError::TranscriptionFailed("no speech".into()));

        let e: PipelineError = ExtractionError::ExtractionFailed("http 500".into()).into();
        assert_eq!(e.to_string(), "Extraction failed: http 500");

        let e: PipelineError = TaskListError::Task(TaskError::InvalidInput).into();
        assert_eq!(e, PipelineError::InvalidInput);
    }

    #[test]
    fn test_processing_guard_counts_nested_runs() {
        let runs = AtomicUsize::new(0);
        let outer = ProcessingGuard::enter(&runs);
        {
            let _inner = ProcessingGuard::enter(&runs);
            assert_eq!(runs.load(Ordering::Acquire), 2);
        }
        assert_eq!(runs.load(Ordering::Acquire), 1);
        drop(outer);
        assert_eq!(runs.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_no_artifact_outcome_has_no_tasks() {
        assert!(PipelineOutcome::NoArtifact.added().is_empty());
    }
}
