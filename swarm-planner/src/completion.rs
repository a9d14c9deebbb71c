//! Completion-service contract and the chat-completions HTTP client.
//!
//! The planner consumes the completion service through a single synchronous
//! request/response contract: one prompt in, one text body out. Timeouts,
//! rate limits, and provider errors all collapse into
//! [`PlanError::Upstream`]; the caller decides whether a degraded fallback
//! applies (task generation) or the whole operation fails (scope extraction).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{PlanError, Result};

/// Per-call sampling options.
#[derive(Debug, Clone, Copy)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 2000,
        }
    }
}

/// A service that turns a prompt into completion text.
///
/// Production uses [`ChatCompletionClient`]; tests substitute scripted
/// responses.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str, options: CompletionOptions) -> Result<String>;
}

/// OpenAI-compatible chat-completions client (OpenRouter or XAI direct).
pub struct ChatCompletionClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: Option<u64>,
}

impl ChatCompletionClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PlanError::Upstream(format!("http client init: {e}")))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl CompletionService for ChatCompletionClient {
    async fn complete(&self, prompt: &str, options: CompletionOptions) -> Result<String> {
        let payload = serde_json::json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        });

        let mut request = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&payload);
        // OpenRouter attribution headers
        if let Some(referer) = &self.config.referer {
            request = request.header("HTTP-Referer", referer);
        }
        if let Some(app_name) = &self.config.app_name {
            request = request.header("X-Title", app_name);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PlanError::Upstream(format!("request to {}: {e}", self.config.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(PlanError::Upstream(format!(
                "{} returned {status}: {snippet}",
                self.config.endpoint
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| PlanError::Upstream(format!("malformed completion payload: {e}")))?;

        if let Some(usage) = &parsed.usage {
            debug!(
                model = %self.config.model,
                total_tokens = usage.total_tokens.unwrap_or(0),
                "completion call finished"
            );
        }

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| PlanError::Upstream("completion returned no choices".to_string()))
    }
}
