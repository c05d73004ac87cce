//! Task extraction via a language-understanding service.
//!
//! [`ExtractionClient`] sends one utterance to a [`LanguageService`] and
//! receives an ordered list of short task descriptions. The default service
//! calls an LLM Messages API over HTTP and asks for a JSON array of strings.
//!
//! Endpoint: POST {endpoint}
//! Auth: `x-api-key` header

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Errors reported by the extraction client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),
}

/// Language-understanding backend
#[async_trait]
pub trait LanguageService: Send + Sync {
    /// Human-readable service name
    fn name(&self) -> &str;

    /// Split `utterance` into task descriptions, in spoken order
    async fn extract(&self, utterance: &str) -> Result<Vec<String>>;
}

/// Single-shot extraction with a timeout
pub struct ExtractionClient {
    service: Arc<dyn LanguageService>,
    timeout: Duration,
}

impl ExtractionClient {
    /// Create a client for `service`
    pub fn new(service: Arc<dyn LanguageService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Extract tasks from `utterance`.
    ///
    /// Entries are trimmed and blank entries dropped; order is preserved.
    /// An utterance with no tasks yields an empty list, not an error.
    pub async fn extract_tasks(&self, utterance: &str) -> Result<Vec<String>, ExtractionError> {
        debug!(service = self.service.name(), chars = utterance.len(), "Extracting tasks");

        let raw = tokio::time::timeout(self.timeout, self.service.extract(utterance))
            .await
            .map_err(|_| {
                ExtractionError::ExtractionFailed(format!(
                    "{} timed out after {:?}",
                    self.service.name(),
                    self.timeout
                ))
            })?
            .map_err(|e| ExtractionError::ExtractionFailed(format!("{:#}", e)))?;

        let tasks: Vec<String> = raw
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        info!(count = tasks.len(), "Extraction complete");
        Ok(tasks)
    }
}

const SYSTEM_PROMPT: &str = "You turn a spoken note into to-do items. \
Return ONLY a JSON array of strings, no explanation. \
Each string is one short imperative task (e.g. \"Buy milk\", \"Call Alice\"), \
in the order the speaker mentioned them. \
If the note contains no tasks, return [].";

/// Request body for the Messages API
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

/// Response from the Messages API
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Alternate shape some models return
#[derive(Debug, Deserialize)]
struct TaskEnvelope {
    tasks: Vec<String>,
}

/// LLM Messages API client
pub struct MessagesApiExtractor {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    client: reqwest::Client,
}

impl MessagesApiExtractor {
    /// Create a new client. Without a key every call fails with a clear error.
    pub fn new(endpoint: String, model: String, api_key: Option<String>, max_tokens: u32) -> Self {
        Self {
            endpoint,
            model,
            api_key,
            max_tokens,
            client: reqwest::Client::new(),
        }
    }

    fn request_body<'a>(&'a self, utterance: &'a str) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: utterance,
            }],
        }
    }
}

#[async_trait]
impl LanguageService for MessagesApiExtractor {
    fn name(&self) -> &str {
        "messages-api"
    }

    async fn extract(&self, utterance: &str) -> Result<Vec<String>> {
        let api_key = self
            .api_key
            .as_deref()
            .context("No API key configured for task extraction")?;

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&self.request_body(utterance))
            .send()
            .await
            .context("Extraction request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Extraction API error ({}): {}", status, text);
        }

        let body: MessagesResponse = response
            .json()
            .await
            .context("Failed to parse extraction response")?;

        let text = body
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .find_map(|block| block.text.as_deref())
            .context("No text in extraction response")?;

        parse_task_list(text)
    }
}

/// Parse model output into task strings.
///
/// Accepts a bare JSON array or `{"tasks": [...]}`, optionally wrapped in a
/// markdown code fence.
pub fn parse_task_list(text: &str) -> Result<Vec<String>> {
    let trimmed = text.trim();
    let json_str = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let json_str = json_str.strip_suffix("```").unwrap_or(json_str).trim();

    if let Ok(tasks) = serde_json::from_str::<Vec<String>>(json_str) {
        return Ok(tasks);
    }

    let envelope: TaskEnvelope = serde_json::from_str(json_str)
        .with_context(|| format!("Unexpected task list format: {}", text))?;
    Ok(envelope.tasks)
}
