//! Service configuration.
//!
//! Loaded once at process start from environment variables and passed by
//! handle into request handling. There is no process-wide singleton.

use std::time::Duration;

use crate::error::Error;

const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1/chat/completions";
const DEFAULT_MODEL: &str = "grok-4-fast-reasoning";

/// How many trailing exchanges (user + assistant pairs) the composer sees.
const DEFAULT_HISTORY_WINDOW: usize = 3;

/// Per-run deadline. When it expires the capability currently in flight
/// is aborted as an error result and composition proceeds with whatever
/// results exist so far.
const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the classification/generation provider.
    pub api_key: String,
    /// Chat-completions endpoint (OpenAI wire format).
    pub base_url: String,
    /// Model ID used for routing, summarization, and composition.
    pub model: String,
    /// Trailing conversation window, in exchanges. Older history is
    /// dropped, not summarized.
    pub history_window: usize,
    /// Deadline for one full pipeline run.
    pub run_timeout: Duration,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// `XAI_API_KEY` is required; everything else has defaults.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("XAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("XAI_API_KEY is not set".to_string()))?;

        let base_url =
            std::env::var("QUORUM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("QUORUM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let run_timeout = std::env::var("QUORUM_RUN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RUN_TIMEOUT);

        Ok(Self {
            api_key,
            base_url,
            model,
            history_window: DEFAULT_HISTORY_WINDOW,
            run_timeout,
        })
    }

    /// Config for tests and embedding: no provider access implied.
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            history_window: DEFAULT_HISTORY_WINDOW,
            run_timeout: DEFAULT_RUN_TIMEOUT,
        }
    }
}
