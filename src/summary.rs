use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const SYSTEM_PROMPT: &str = "You summarize political statements. Respond with a single \
neutral sentence capturing the core claim of the statement. Do not editorialize.";

const DEFAULT_MAX_TOKENS: u32 = 120;
const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Best-effort enrichment seam. Implementations must never panic; a failed
/// call is reported as `None` and the statement is stored without a summary.
#[async_trait]
pub trait Summarizer: Send + Sync + 'static {
    async fn summarize(&self, statement_text: &str) -> Option<String>;
}

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("summary request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("summary provider returned {status}: {body}")]
    Provider {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("summary response contained no choices")]
    EmptyResponse,
}

/// Chat-completion client for an OpenAI-compatible endpoint.
pub struct ChatCompletionSummarizer {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

impl ChatCompletionSummarizer {
    pub fn new(
        api_url: String,
        api_key: Option<String>,
        model: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url,
            api_key,
            model,
        })
    }

    async fn request_summary(&self, statement_text: &str) -> Result<String, SummaryError> {
        let url = format!("{}/chat/completions", self.api_url.trim_end_matches('/'));
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: statement_text,
                },
            ],
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        };

        let mut req = self.client.post(&url).json(&request);
        if let Some(key) = self.api_key.as_deref() {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SummaryError::Provider { status, body });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(SummaryError::EmptyResponse)?;

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(SummaryError::EmptyResponse);
        }
        Ok(trimmed.to_string())
    }
}

#[async_trait]
impl Summarizer for ChatCompletionSummarizer {
    async fn summarize(&self, statement_text: &str) -> Option<String> {
        match self.request_summary(statement_text).await {
            Ok(summary) => Some(summary),
            Err(err) => {
                warn!(error = %err, "statement summary skipped");
                None
            }
        }
    }
}

/// Stored form of an enriched statement: the submitted text with the
/// generated summary appended.
pub fn append_summary(statement_text: &str, summary: &str) -> String {
    format!("{statement_text}\n\nAI summary: {summary}")
}
