//! Recorder controller: one audio capture session at a time.
//!
//! ```text
//! Idle --start()--> Recording --stop()--> Idle (+ artifact)
//! ```
//!
//! `start()` while recording and `stop()` while idle are no-ops. A failed
//! `start()` reports `RecordingUnavailable` and leaves the controller idle.
//!
//! Capture itself is delegated to an [`AudioCapture`] backend. The default
//! backend drives an `ffmpeg` subprocess.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::{AudioArtifact, AudioFormat};

/// How long ffmpeg must survive after spawn before the device counts as open
const STARTUP_CHECK_DELAY: Duration = Duration::from_millis(250);

/// How long to wait for ffmpeg to flush and exit after `q`
const FINISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors reported by the recorder
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecorderError {
    #[error("Recording unavailable: {0}")]
    RecordingUnavailable(String),
}

/// Observable recorder state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    Idle,
    Recording,
}

/// A capture in progress
#[async_trait]
pub trait CaptureSession: Send {
    /// Stop capturing and finalize the output file
    async fn finish(self: Box<Self>) -> Result<()>;
}

/// Audio capture backend
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Check that capture is possible (device present, permission granted)
    async fn probe(&self) -> Result<()>;

    /// Begin writing one recording to `path`
    async fn begin(&self, path: &Path, format: &AudioFormat) -> Result<Box<dyn CaptureSession>>;
}

enum RecorderPhase {
    Idle,
    Recording {
        session: Box<dyn CaptureSession>,
        path: PathBuf,
        started_at: DateTime<Utc>,
        started: Instant,
    },
}

/// State machine around one capture backend
pub struct RecorderController {
    capture: Arc<dyn AudioCapture>,
    format: AudioFormat,
    output_dir: PathBuf,
    phase: RecorderPhase,
}

impl RecorderController {
    /// Create an idle controller writing into `output_dir`
    pub fn new(capture: Arc<dyn AudioCapture>, format: AudioFormat, output_dir: PathBuf) -> Self {
        Self {
            capture,
            format,
            output_dir,
            phase: RecorderPhase::Idle,
        }
    }

    /// Current state
    pub fn state(&self) -> RecorderState {
        match self.phase {
            RecorderPhase::Idle => RecorderState::Idle,
            RecorderPhase::Recording { .. } => RecorderState::Recording,
        }
    }

    /// Whether a session is active
    pub fn is_recording(&self) -> bool {
        self.state() == RecorderState::Recording
    }

    /// Time since the current session started (zero when idle)
    pub fn elapsed(&self) -> Duration {
        match &self.phase {
            RecorderPhase::Recording { started, .. } => started.elapsed(),
            RecorderPhase::Idle => Duration::ZERO,
        }
    }

    /// Ask the backend whether recording would work
    pub async fn check_available(&self) -> Result<(), RecorderError> {
        self.capture
            .probe()
            .await
            .map_err(|e| RecorderError::RecordingUnavailable(format!("{:#}", e)))
    }

    /// Begin a session. No-op if one is already active.
    pub async fn start(&mut self) -> Result<(), RecorderError> {
        if self.is_recording() {
            debug!("start() while recording, ignoring");
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| {
                RecorderError::RecordingUnavailable(format!(
                    "cannot create {}: {}",
                    self.output_dir.display(),
                    e
                ))
            })?;

        let started_at = Utc::now();
        let path = self.output_dir.join(format!(
            "recording-{}.{}",
            started_at.format("%Y%m%dT%H%M%S%3f"),
            self.format.extension
        ));

        let session = self
            .capture
            .begin(&path, &self.format)
            .await
            .map_err(|e| RecorderError::RecordingUnavailable(format!("{:#}", e)))?;

        info!(backend = self.capture.name(), path = %path.display(), "Recording started");
        self.phase = RecorderPhase::Recording {
            session,
            path,
            started_at,
            started: Instant::now(),
        };
        Ok(())
    }

    /// End the session and return its artifact.
    ///
    /// Returns `None` when idle, or when the backend produced no usable file.
    pub async fn stop(&mut self) -> Option<AudioArtifact> {
        let RecorderPhase::Recording {
            session,
            path,
            started_at,
            started,
        } = std::mem::replace(&mut self.phase, RecorderPhase::Idle)
        else {
            debug!("stop() while idle, ignoring");
            return None;
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        if let Err(e) = session.finish().await {
            warn!(error = %format!("{:#}", e), "Failed to finalize recording");
        }

        let artifact = AudioArtifact {
            path,
            format: self.format.clone(),
            recorded_at: started_at,
            duration_ms,
        };

        if !artifact.is_present().await {
            warn!(path = %artifact.path.display(), "Recording produced no audio");
            discard_empty(&artifact.path).await;
            return None;
        }

        info!(file = %artifact.file_name(), duration_ms, "Recording stopped");
        Some(artifact)
    }
}

/// Remove a zero-byte output file; a missing file is fine
async fn discard_empty(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed empty recording"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove empty recording"),
    }
}

/// Capture backend using an ffmpeg subprocess
pub struct FfmpegCapture {
    /// Path to the ffmpeg binary
    binary_path: String,

    /// ffmpeg input format (`-f`), e.g. pulse, alsa, avfoundation, dshow
    input_format: String,

    /// ffmpeg input device (`-i`)
    input_device: String,
}

impl FfmpegCapture {
    /// Create a backend for the given ffmpeg binary and input
    pub fn new(
        binary_path: impl Into<String>,
        input_format: impl Into<String>,
        input_device: impl Into<String>,
    ) -> Self {
        Self {
            binary_path: binary_path.into(),
            input_format: input_format.into(),
            input_device: input_device.into(),
        }
    }

    fn capture_args(&self, path: &Path, format: &AudioFormat) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
            "-f".to_string(),
            self.input_format.clone(),
            "-i".to_string(),
            self.input_device.clone(),
            "-ac".to_string(),
            format.channels.to_string(),
            "-ar".to_string(),
            format.sample_rate.to_string(),
            "-c:a".to_string(),
            format.codec.clone(),
            "-q:a".to_string(),
            "2".to_string(),
            path.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl AudioCapture for FfmpegCapture {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self) -> Result<()> {
        let output = Command::new(&self.binary_path)
            .args(["-hide_banner", "-loglevel", "error"])
            .args(["-f", &self.input_format, "-i", &self.input_device])
            .args(["-t", "0.15", "-f", "null", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.binary_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Audio input probe failed: {}", stderr.trim());
        }
        Ok(())
    }

    async fn begin(&self, path: &Path, format: &AudioFormat) -> Result<Box<dyn CaptureSession>> {
        let mut child = Command::new(&self.binary_path)
            .args(self.capture_args(path, format))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.binary_path))?;

        // A missing device or denied permission makes ffmpeg exit right away
        tokio::time::sleep(STARTUP_CHECK_DELAY).await;
        if let Some(status) = child.try_wait().context("Failed to poll ffmpeg")? {
            let stderr = read_stderr(&mut child).await;
            anyhow::bail!("ffmpeg exited with {}: {}", status, stderr.trim());
        }

        Ok(Box::new(FfmpegSession { child }))
    }
}

struct FfmpegSession {
    child: Child,
}

#[async_trait]
impl CaptureSession for FfmpegSession {
    async fn finish(self: Box<Self>) -> Result<()> {
        let mut child = self.child;

        // `q` on stdin makes ffmpeg flush the container and exit cleanly
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(b"q")
                .await
                .context("Failed to signal ffmpeg")?;
        }

        match tokio::time::timeout(FINISH_TIMEOUT, child.wait()).await {
            Ok(status) => {
                let status = status.context("Failed to wait for ffmpeg")?;
                if !status.success() {
                    let stderr = read_stderr(&mut child).await;
                    anyhow::bail!("ffmpeg exited with {}: {}", status, stderr.trim());
                }
                Ok(())
            }
            Err(_) => {
                child.kill().await.context("Failed to kill ffmpeg")?;
                anyhow::bail!("ffmpeg did not exit within {:?}", FINISH_TIMEOUT)
            }
        }
    }
}

async fn read_stderr(child: &mut Child) -> String {
    let mut buf = String::new();
    if let Some(mut stderr) = child.stderr.take() {
        let _ = stderr.read_to_string(&mut buf).await;
    }
    buf
}
