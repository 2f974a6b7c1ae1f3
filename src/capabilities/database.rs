//! Database capability: structured data questions.
//!
//! Runs the natural-language question against the query backend, then
//! summarizes the raw rows with the model under a strict no-technical
//! prompt. The rows themselves never leave this handler.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error, info};

use super::registry::{CapabilityContext, CapabilityHandler, TaskResult};
use super::CapabilityId;
use crate::ai::client::{ChatModel, CompletionOptions};
use crate::pipeline::sanitize;

const SUMMARY_MAX_TOKENS: usize = 400;
const SUMMARY_TEMPERATURE: f32 = 0.3;

const SUMMARY_SYSTEM_PROMPT: &str = "\
You are a data analyst summarizing datastore query results.

STRICT RULES:
- Do NOT mention queries, SQL, or technical details
- Do NOT include JSON, formatted tables, or code
- Focus on WHAT was found: numbers, trends, patterns
- Be concise: 2-3 sentences maximum
- Round numbers sensibly
- If the result is an error, explain what failed in simple terms

GOOD: \"There are 15,234 male patients on record, about 48% of all episodes.\"
BAD: anything that quotes the query or the raw result format.";

/// Seam to the out-of-scope datastore collaborator.
///
/// Takes the user's natural-language question and returns the raw result
/// text (rows, counts, whatever the backend produces). The handler owns
/// turning that into a clean summary.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn run_query(&self, question: &str) -> Result<String>;
}

pub struct DatabaseCapability {
    model: Arc<dyn ChatModel>,
    backend: Arc<dyn QueryBackend>,
}

impl DatabaseCapability {
    pub fn new(model: Arc<dyn ChatModel>, backend: Arc<dyn QueryBackend>) -> Self {
        Self { model, backend }
    }
}

#[async_trait]
impl CapabilityHandler for DatabaseCapability {
    fn id(&self) -> CapabilityId {
        CapabilityId::Database
    }

    async fn execute(&self, ctx: &CapabilityContext<'_>) -> TaskResult {
        let raw = match self.backend.run_query(ctx.query).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "query backend failed");
                return TaskResult::error(
                    self.id(),
                    "The datastore could not be queried for this request.",
                );
            }
        };

        debug!(chars = raw.len(), "raw query result received");

        let user_prompt = format!(
            "User question: {}\n\nQuery result:\n{raw}\n\n\
             Summarize these findings in natural language, omitting every technical detail.",
            ctx.query
        );

        let summary = match self
            .model
            .complete(
                SUMMARY_SYSTEM_PROMPT,
                &user_prompt,
                CompletionOptions {
                    max_tokens: SUMMARY_MAX_TOKENS,
                    temperature: SUMMARY_TEMPERATURE,
                },
            )
            .await
        {
            Ok(summary) => sanitize::scrub(&summary),
            Err(e) => {
                // Returning the raw rows instead would breach the
                // firewall, so this degrades to an error result.
                error!(error = %e, "result summarization failed");
                return TaskResult::error(
                    self.id(),
                    "Data was found but could not be summarized.",
                );
            }
        };

        if let Some(marker) = sanitize::find_marker(&summary, false) {
            error!(marker, "summary failed sanitization, degrading");
            return TaskResult::error(
                self.id(),
                "Data was found but could not be summarized cleanly.",
            );
        }

        info!(chars = summary.len(), "database summary produced");
        TaskResult::ok(self.id(), summary)
    }
}
