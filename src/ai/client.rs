//! Chat model client.
//!
//! `ChatModel` abstracts the provider so the router, the composer, and
//! every capability handler can be exercised against deterministic stubs.
//! `ChatClient` is the production implementation: a plain non-streaming
//! call against an OpenAI-format chat/completions endpoint.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;

/// Per-call options. Stage temperatures differ: routing wants
/// deterministic output, composition wants some freedom.
#[derive(Debug, Clone, Copy)]
pub struct CompletionOptions {
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 400,
            temperature: 0.3,
        }
    }
}

/// The external classification/generation collaborator.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Make a single completion call and return the text content.
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
        options: CompletionOptions,
    ) -> Result<String>;
}

/// OpenAI-format HTTP client.
pub struct ChatClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl ChatClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        }
    }

    async fn handle_error_response(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        bail!("API error: HTTP {}: {}", status.as_u16(), body)
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
        options: CompletionOptions,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_message}
            ]
        });

        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("request failed")?;
        let response = self.handle_error_response(response).await?;

        let json: Value = response.json().await.context("invalid response body")?;

        let text = json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|t| t.as_str())
            .unwrap_or("");

        debug!(model = %self.model, chars = text.len(), "completion received");

        Ok(text.trim().to_string())
    }
}
