//! Speech-to-text bridge.
//!
//! [`TranscriptionBridge`] turns one audio artifact into its final transcript
//! via a [`SpeechEngine`]. The default engine shells out to a local whisper
//! binary. Only the final transcript is used; there is no streaming.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::domain::AudioArtifact;

/// Errors reported by the bridge
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptionError {
    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),
}

/// Result of transcription
#[derive(Debug, Clone)]
pub struct TranscriptResult {
    pub text: String,
    pub language: String,
    pub duration_seconds: f64,
}

/// Speech recognition backend
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Human-readable engine name
    fn name(&self) -> &str;

    /// Produce the final transcript for one audio file
    async fn transcribe(&self, audio_path: &Path, locale: &str) -> Result<TranscriptResult>;
}

/// Single-shot transcription with a timeout
pub struct TranscriptionBridge {
    engine: Arc<dyn SpeechEngine>,
    locale: String,
    timeout: Duration,
}

impl TranscriptionBridge {
    /// Create a bridge for `engine` using `locale` (e.g. "en-US")
    pub fn new(engine: Arc<dyn SpeechEngine>, locale: impl Into<String>, timeout: Duration) -> Self {
        Self {
            engine,
            locale: locale.into(),
            timeout,
        }
    }

    /// Transcribe one artifact. Engine errors and timeouts both map to
    /// `TranscriptionFailed`.
    pub async fn transcribe(&self, artifact: &AudioArtifact) -> Result<String, TranscriptionError> {
        debug!(engine = self.engine.name(), file = %artifact.file_name(), "Transcribing");

        let result = tokio::time::timeout(
            self.timeout,
            self.engine.transcribe(artifact.path(), &self.locale),
        )
        .await
        .map_err(|_| {
            TranscriptionError::TranscriptionFailed(format!(
                "{} timed out after {:?}",
                self.engine.name(),
                self.timeout
            ))
        })?
        .map_err(|e| TranscriptionError::TranscriptionFailed(format!("{:#}", e)))?;

        info!(
            language = %result.language,
            duration_seconds = result.duration_seconds,
            chars = result.text.len(),
            "Transcription complete"
        );
        Ok(result.text)
    }
}

/// Whisper output JSON structure
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    text: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    #[serde(default)]
    end: f64,
}

/// Local whisper binary
pub struct WhisperEngine {
    binary_path: String,
    model: String,
}

impl WhisperEngine {
    /// Create an engine for the given binary and model
    pub fn new(binary_path: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            model: model.into(),
        }
    }
}

/// Whisper takes a bare language code: "en-US" -> "en"
pub fn language_for_locale(locale: &str) -> String {
    locale
        .split(['-', '_'])
        .next()
        .filter(|code| !code.is_empty())
        .unwrap_or("en")
        .to_lowercase()
}

fn parse_whisper_output(json_content: &str, fallback_language: &str) -> Result<TranscriptResult> {
    let whisper: WhisperOutput =
        serde_json::from_str(json_content).context("Failed to parse whisper JSON")?;

    let duration = whisper.segments.last().map(|s| s.end).unwrap_or(0.0);

    Ok(TranscriptResult {
        text: whisper.text.trim().to_string(),
        language: if whisper.language.is_empty() {
            fallback_language.to_string()
        } else {
            whisper.language
        },
        duration_seconds: duration,
    })
}

#[async_trait]
impl SpeechEngine for WhisperEngine {
    fn name(&self) -> &str {
        "whisper"
    }

    async fn transcribe(&self, audio_path: &Path, locale: &str) -> Result<TranscriptResult> {
        let language = language_for_locale(locale);
        let temp_dir = tempfile::tempdir().context("Failed to create temp dir")?;

        let output = Command::new(&self.binary_path)
            .arg(audio_path)
            .arg("--model")
            .arg(&self.model)
            .arg("--output_dir")
            .arg(temp_dir.path())
            .arg("--output_format")
            .arg("json")
            .arg("--language")
            .arg(&language)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.binary_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Whisper failed: {}", stderr.trim());
        }

        let stem = audio_path.file_stem().unwrap_or_default().to_string_lossy();
        let json_path = temp_dir.path().join(format!("{}.json", stem));

        let json_content = tokio::fs::read_to_string(&json_path)
            .await
            .context("Failed to read whisper output")?;

        parse_whisper_output(&json_content, &language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEngine {
        text: &'static str,
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl SpeechEngine for FixedEngine {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn transcribe(&self, _audio_path: &Path, locale: &str) -> Result<TranscriptResult> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                anyhow::bail!("recognizer unavailable");
            }
            Ok(TranscriptResult {
                text: self.text.to_string(),
                language: language_for_locale(locale),
                duration_seconds: 1.0,
            })
        }
    }

    fn bridge(engine: FixedEngine, timeout: Duration) -> TranscriptionBridge {
        TranscriptionBridge::new(Arc::new(engine), "en-US", timeout)
    }

    #[test]
    fn test_language_for_locale() {
        assert_eq!(language_for_locale("en-US"), "en");
        assert_eq!(language_for_locale("de_DE"), "de");
        assert_eq!(language_for_locale("FR"), "fr");
        assert_eq!(language_for_locale(""), "en");
    }

    #[test]
    fn test_parse_whisper_output() {
        let json = r#"{"text": "  buy milk and call alice ", "language": "en",
                       "segments": [{"end": 1.5}, {"end": 3.25}]}"#;
        let result = parse_whisper_output(json, "en").unwrap();
        assert_eq!(result.text, "buy milk and call alice");
        assert_eq!(result.duration_seconds, 3.25);
    }

    #[test]
    fn test_parse_whisper_output_defaults_language() {
        let result = parse_whisper_output(r#"{"text": "hello"}"#, "de").unwrap();
        assert_eq!(result.language, "de");
        assert_eq!(result.duration_seconds, 0.0);
    }

    #[tokio::test]
    async fn test_bridge_returns_final_text() {
        let bridge = bridge(
            FixedEngine {
                text: "buy milk",
                delay: Duration::ZERO,
                fail: false,
            },
            Duration::from_secs(5),
        );
        let artifact = AudioArtifact::from_path("/tmp/x.m4a");
        assert_eq!(bridge.transcribe(&artifact).await.unwrap(), "buy milk");
    }

    #[tokio::test]
    async fn test_bridge_maps_engine_error() {
        let bridge = bridge(
            FixedEngine {
                text: "",
                delay: Duration::ZERO,
                fail: true,
            },
            Duration::from_secs(5),
        );
        let artifact = AudioArtifact::from_path("/tmp/x.m4a");
        let err = bridge.transcribe(&artifact).await.unwrap_err();
        assert_eq!(
            err,
            TranscriptionError::TranscriptionFailed("recognizer unavailable".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_times_out() {
        let bridge = bridge(
            FixedEngine {
                text: "late",
                delay: Duration::from_secs(600),
                fail: false,
            },
            Duration::from_secs(10),
        );
        let artifact = AudioArtifact::from_path("/tmp/x.m4a");
        let err = bridge.transcribe(&artifact).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::TranscriptionFailed(ref msg) if msg.contains("timed out")));
    }
}
