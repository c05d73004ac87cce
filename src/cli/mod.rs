//! Command-line interface for taskman.
//!
//! Provides an interactive task shell, one-shot processing of a recording,
//! a dry-run of task extraction, and a configuration report.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{ExtractionClient, LogFeedback, MessagesApiExtractor};
use crate::config::{self, ResolvedConfig};
use crate::core::{Orchestrator, PipelineOutcome};
use crate::domain::AudioArtifact;

pub mod shell;

/// taskman - Voice-driven personal task list
#[derive(Parser, Debug)]
#[command(name = "taskman")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive task list session (type `help` inside)
    Shell,

    /// Transcribe a recording and add the tasks it contains
    Process {
        /// Audio file to process
        file: PathBuf,
    },

    /// Show which tasks would be extracted from a sentence
    Extract {
        /// Utterance text
        text: String,
    },

    /// Show configuration
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Shell => {
                let cfg = config::config()?;
                let orchestrator =
                    Orchestrator::from_config(cfg).with_feedback(Arc::new(LogFeedback));
                shell::run(orchestrator).await
            }
            Commands::Process { file } => process_file(file).await,
            Commands::Extract { text } => extract_text(&text).await,
            Commands::Config => show_config(),
        }
    }
}

/// Run the pipeline on an existing audio file
async fn process_file(file: PathBuf) -> Result<()> {
    let cfg = config::config()?;
    let artifact = AudioArtifact::from_path(&file);
    if !artifact.is_present().await {
        anyhow::bail!("Audio file not found or empty: {}", file.display());
    }

    let orchestrator = Orchestrator::from_config(cfg).with_feedback(Arc::new(LogFeedback));
    let outcome = orchestrator
        .process_artifact(&artifact)
        .await
        .with_context(|| format!("Failed to process {}", file.display()))?;

    if let PipelineOutcome::Completed { transcript, .. } = &outcome {
        eprintln!("Transcript: {}", transcript);
    }

    let snapshot = orchestrator.tasks().snapshot().await?;
    if snapshot.active.is_empty() {
        println!("No tasks found");
    }
    for (i, task) in snapshot.active.iter().enumerate() {
        println!("{:>3}. {}", i + 1, task.text);
    }
    Ok(())
}

/// Extract tasks from text without touching a task list
async fn extract_text(text: &str) -> Result<()> {
    let cfg = config::config()?;
    let service = MessagesApiExtractor::new(
        cfg.extraction.endpoint.clone(),
        cfg.extraction.model.clone(),
        cfg.extraction.api_key.clone(),
        cfg.extraction.max_tokens,
    );
    let client = ExtractionClient::new(
        Arc::new(service),
        Duration::from_secs(cfg.extraction.timeout_seconds),
    );

    let tasks = client.extract_tasks(text).await?;
    if tasks.is_empty() {
        println!("No tasks found");
    }
    for task in tasks {
        println!("- {}", task);
    }
    Ok(())
}

fn show_config() -> Result<()> {
    let cfg = config::config()?;
    print_config(cfg);
    Ok(())
}

fn print_config(cfg: &ResolvedConfig) {
    println!();
    println!("taskman Configuration");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    match &cfg.config_file {
        Some(path) => println!("Config file:      {}", path.display()),
        None => println!("Config file:      (none, using defaults)"),
    }
    println!("Home:             {}", cfg.home.display());
    println!("Recordings:       {}", config::recordings_dir_for(cfg).display());
    println!();
    println!("Archive grace:    {} seconds", cfg.archive.grace_period_seconds);
    println!();
    println!(
        "Recorder:         {} -f {} -i {}",
        cfg.recorder.ffmpeg_path, cfg.recorder.input_format, cfg.recorder.input_device
    );
    println!(
        "Audio format:     {} Hz, {} channel(s)",
        cfg.recorder.sample_rate, cfg.recorder.channels
    );
    println!("Keep recordings:  {}", cfg.recorder.keep_recordings);
    println!();
    println!(
        "Transcription:    {} (model {}, locale {}, timeout {}s)",
        cfg.transcription.whisper_path,
        cfg.transcription.model,
        cfg.transcription.locale,
        cfg.transcription.timeout_seconds
    );
    println!(
        "Extraction:       {} (model {}, timeout {}s)",
        cfg.extraction.endpoint, cfg.extraction.model, cfg.extraction.timeout_seconds
    );
    if cfg.extraction.api_key.is_some() {
        println!("✓ {} is set", cfg.extraction.api_key_env);
    } else {
        println!("✗ {} is not set (extraction will fail)", cfg.extraction.api_key_env);
    }
    println!();
}
