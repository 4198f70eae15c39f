//! Claude Messages API adapter.
//!
//! One instance per model: the pipeline uses a cheaper model for
//! translation/chapters/tags and a stronger one for summaries.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::{LlmResponse, LlmService};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Claude API client bound to one model
pub struct ClaudeService {
    /// HTTP client
    client: reqwest::Client,

    /// API key (from ANTHROPIC_API_KEY)
    api_key: String,

    /// Model identifier; doubles as the ledger service name
    model: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: UsageBlock,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct UsageBlock {
    input_tokens: u64,
    output_tokens: u64,
}

impl ClaudeService {
    /// Create a client for one model
    pub fn new(api_key: String, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
        }
    }

    /// Create from the ANTHROPIC_API_KEY environment variable
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key =
            std::env::var("ANTHROPIC_API_KEY").context("ANTHROPIC_API_KEY is not set")?;
        Ok(Self::new(api_key, model))
    }
}

#[async_trait]
impl LlmService for ClaudeService {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, max_tokens: u32, timeout: Duration) -> Result<LlmResponse> {
        let response = self
            .client
            .post(API_URL)
            .timeout(timeout)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&serde_json::json!({
                "model": self.model,
                "max_tokens": max_tokens,
                "messages": [{"role": "user", "content": prompt}],
            }))
            .send()
            .await
            .with_context(|| format!("Claude request failed for model '{}'", self.model))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Claude API error {} for model '{}': {}", status, self.model, body);
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .context("Failed to parse Claude response")?;

        let text = parsed
            .content
            .first()
            .map(|block| block.text.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            anyhow::bail!("Claude returned an empty response for model '{}'", self.model);
        }

        Ok(LlmResponse {
            text,
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
        })
    }
}
