//! Configuration for taskman.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (TASKMAN_HOME, TASKMAN_GRACE_SECONDS, FFMPEG_PATH,
//!    WHISPER_PATH, and the API key variable named in the config)
//! 2. Config file (.taskman/config.yaml)
//! 3. Defaults (~/.taskman)
//!
//! Config file discovery:
//! - Searches current directory and parents for .taskman/config.yaml
//! - Paths in config file are relative to the .taskman/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::DEFAULT_GRACE_PERIOD;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub archive: Option<ArchiveConfig>,
    #[serde(default)]
    pub recorder: Option<RecorderConfig>,
    #[serde(default)]
    pub transcription: Option<TranscriptionConfig>,
    #[serde(default)]
    pub extraction: Option<ExtractionConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .taskman/)
    pub home: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    pub grace_period_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecorderConfig {
    pub ffmpeg_path: Option<String>,
    pub input_format: Option<String>,
    pub input_device: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub keep_recordings: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionConfig {
    pub whisper_path: Option<String>,
    pub model: Option<String>,
    pub locale: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub max_tokens: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to taskman home (recordings, logs)
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub archive: ArchiveSettings,
    pub recorder: RecorderSettings,
    pub transcription: TranscriptionSettings,
    pub extraction: ExtractionSettings,
}

#[derive(Debug, Clone)]
pub struct ArchiveSettings {
    pub grace_period_seconds: u64,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            grace_period_seconds: DEFAULT_GRACE_PERIOD.as_secs(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecorderSettings {
    pub ffmpeg_path: String,
    pub input_format: String,
    pub input_device: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub keep_recordings: bool,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            input_format: default_input_format().to_string(),
            input_device: default_input_device().to_string(),
            sample_rate: 12_000,
            channels: 1,
            keep_recordings: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptionSettings {
    pub whisper_path: String,
    pub model: String,
    pub locale: String,
    pub timeout_seconds: u64,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            whisper_path: "whisper".to_string(),
            model: "base".to_string(),
            locale: "en-US".to_string(),
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    /// Resolved from `api_key_env` at load time; never printed
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-haiku-4-5-20251001".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            api_key: None,
            max_tokens: 1024,
            timeout_seconds: 60,
        }
    }
}

/// ffmpeg capture input for the current platform
fn default_input_format() -> &'static str {
    if cfg!(target_os = "macos") {
        "avfoundation"
    } else if cfg!(windows) {
        "dshow"
    } else {
        "pulse"
    }
}

fn default_input_device() -> &'static str {
    if cfg!(target_os = "macos") {
        ":0"
    } else if cfg!(windows) {
        "audio=default"
    } else {
        "default"
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".taskman").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge a parsed config file over defaults. Environment is applied separately.
fn merge_file(config: ConfigFile, config_path: &Path, default_home: PathBuf) -> ResolvedConfig {
    let taskman_dir = config_path.parent().unwrap_or(Path::new("."));

    let home = match config.paths.home {
        Some(ref home_path) => resolve_path(taskman_dir, home_path),
        None => default_home,
    };

    let mut archive = ArchiveSettings::default();
    if let Some(a) = config.archive {
        archive.grace_period_seconds = a.grace_period_seconds.unwrap_or(archive.grace_period_seconds);
    }

    let mut recorder = RecorderSettings::default();
    if let Some(r) = config.recorder {
        recorder.ffmpeg_path = r.ffmpeg_path.unwrap_or(recorder.ffmpeg_path);
        recorder.input_format = r.input_format.unwrap_or(recorder.input_format);
        recorder.input_device = r.input_device.unwrap_or(recorder.input_device);
        recorder.sample_rate = r.sample_rate.unwrap_or(recorder.sample_rate);
        recorder.channels = r.channels.unwrap_or(recorder.channels);
        recorder.keep_recordings = r.keep_recordings.unwrap_or(recorder.keep_recordings);
    }

    let mut transcription = TranscriptionSettings::default();
    if let Some(t) = config.transcription {
        transcription.whisper_path = t.whisper_path.unwrap_or(transcription.whisper_path);
        transcription.model = t.model.unwrap_or(transcription.model);
        transcription.locale = t.locale.unwrap_or(transcription.locale);
        transcription.timeout_seconds = t.timeout_seconds.unwrap_or(transcription.timeout_seconds);
    }

    let mut extraction = ExtractionSettings::default();
    if let Some(e) = config.extraction {
        extraction.endpoint = e.endpoint.unwrap_or(extraction.endpoint);
        extraction.model = e.model.unwrap_or(extraction.model);
        extraction.api_key_env = e.api_key_env.unwrap_or(extraction.api_key_env);
        extraction.max_tokens = e.max_tokens.unwrap_or(extraction.max_tokens);
        extraction.timeout_seconds = e.timeout_seconds.unwrap_or(extraction.timeout_seconds);
    }

    ResolvedConfig {
        home,
        config_file: Some(config_path.to_path_buf()),
        archive,
        recorder,
        transcription,
        extraction,
    }
}

/// Apply environment overrides on top of file/default values
fn apply_env(mut config: ResolvedConfig) -> ResolvedConfig {
    if let Ok(home) = std::env::var("TASKMAN_HOME") {
        config.home = PathBuf::from(home);
    }
    if let Some(secs) = std::env::var("TASKMAN_GRACE_SECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
    {
        config.archive.grace_period_seconds = secs;
    }
    if let Ok(path) = std::env::var("FFMPEG_PATH") {
        config.recorder.ffmpeg_path = path;
    }
    if let Ok(path) = std::env::var("WHISPER_PATH") {
        config.transcription.whisper_path = path;
    }
    config.extraction.api_key = std::env::var(&config.extraction.api_key_env)
        .ok()
        .filter(|k| !k.trim().is_empty());
    config
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".taskman");

    let resolved = match find_config_file() {
        Some(config_path) => {
            let config = load_config_file(&config_path)?;
            merge_file(config, &config_path, default_home)
        }
        None => ResolvedConfig {
            home: default_home,
            config_file: None,
            archive: ArchiveSettings::default(),
            recorder: RecorderSettings::default(),
            transcription: TranscriptionSettings::default(),
            extraction: ExtractionSettings::default(),
        },
    };

    Ok(apply_env(resolved))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Recordings directory for a resolved config ($TASKMAN_HOME/recordings)
pub fn recordings_dir_for(config: &ResolvedConfig) -> PathBuf {
    config.home.join("recordings")
}
