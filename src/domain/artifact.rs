//! Audio artifacts produced by one recording session.
//!
//! An artifact is a reference to a finished file on disk, plus the format
//! it was captured in. The file itself lives in a transient location and
//! may be removed once the pipeline has consumed it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Capture format for speech recordings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Samples per second
    pub sample_rate: u32,

    /// Channel count (1 = mono)
    pub channels: u16,

    /// ffmpeg encoder name
    pub codec: String,

    /// File extension (without dot)
    pub extension: String,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 12_000,
            channels: 1,
            codec: "aac".to_string(),
            extension: "m4a".to_string(),
        }
    }
}

/// A finished recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioArtifact {
    /// Path to the audio file
    pub path: PathBuf,

    /// Format the file was captured in
    pub format: AudioFormat,

    /// When capture started
    pub recorded_at: DateTime<Utc>,

    /// Wall-clock capture length in milliseconds
    pub duration_ms: u64,
}

impl AudioArtifact {
    /// Wrap an existing file (e.g. one handed in on the command line)
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut format = AudioFormat::default();
        if let Some(ext) = path.extension() {
            format.extension = ext.to_string_lossy().to_string();
        }
        Self {
            path,
            format,
            recorded_at: Utc::now(),
            duration_ms: 0,
        }
    }

    /// Path to the audio file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name only
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    /// Whether the file exists and holds at least one byte
    pub async fn is_present(&self) -> bool {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(_) => false,
        }
    }
}

/// SHA256 of file content (first 12 hex chars), used as a log correlation id
pub async fn compute_file_hash(path: &Path) -> Result<String, std::io::Error> {
    let content = tokio::fs::read(path).await?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    let result = hasher.finalize();

    Ok(format!("{:x}", result)[..12].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_format_is_mono_speech_quality() {
        let format = AudioFormat::default();
        assert_eq!(format.sample_rate, 12_000);
        assert_eq!(format.channels, 1);
        assert_eq!(format.extension, "m4a");
    }

    #[test]
    fn test_from_path_takes_extension() {
        let artifact = AudioArtifact::from_path("/tmp/memo.wav");
        assert_eq!(artifact.format.extension, "wav");
        assert_eq!(artifact.file_name(), "memo.wav");
    }

    #[tokio::test]
    async fn test_presence_requires_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.m4a");
        tokio::fs::write(&path, b"").await.unwrap();

        let artifact = AudioArtifact::from_path(&path);
        assert!(!artifact.is_present().await);

        tokio::fs::write(&path, b"audio").await.unwrap();
        assert!(artifact.is_present().await);

        let missing = AudioArtifact::from_path(temp.path().join("missing.m4a"));
        assert!(!missing.is_present().await);
    }

    #[tokio::test]
    async fn test_file_hash_is_stable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.m4a");
        tokio::fs::write(&path, b"same bytes").await.unwrap();

        let first = compute_file_hash(&path).await.unwrap();
        let second = compute_file_hash(&path).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 12);
    }
}
