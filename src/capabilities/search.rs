//! Search capability: external knowledge lookups.
//!
//! Sends the question to the search backend and condenses the hits into
//! a short cited summary. Raw hit payloads stay behind the boundary.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::registry::{CapabilityContext, CapabilityHandler, TaskResult};
use super::CapabilityId;
use crate::ai::client::{ChatModel, CompletionOptions};
use crate::pipeline::sanitize;

const SUMMARY_MAX_TOKENS: usize = 500;
const SUMMARY_TEMPERATURE: f32 = 0.3;

/// Hits beyond this are dropped before summarization.
const MAX_HITS: usize = 5;

const SUMMARY_SYSTEM_PROMPT: &str = "\
You are a research librarian condensing web search results.

STRICT RULES:
- Answer the user's question using ONLY the search results below
- Cite the source title for each claim you take from a result
- Do NOT include URLs verbatim in the prose; list sources at the end
- Do NOT include code, JSON, or raw result structure
- Be concise: one short paragraph plus a source list
- If the results do not answer the question, say so

End with a \"Sources:\" line listing the titles used.";

/// One hit from the search backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Seam to the out-of-scope web search collaborator.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}

pub struct SearchCapability {
    model: Arc<dyn ChatModel>,
    backend: Arc<dyn SearchBackend>,
}

impl SearchCapability {
    pub fn new(model: Arc<dyn ChatModel>, backend: Arc<dyn SearchBackend>) -> Self {
        Self { model, backend }
    }
}

#[async_trait]
impl CapabilityHandler for SearchCapability {
    fn id(&self) -> CapabilityId {
        CapabilityId::Search
    }

    async fn execute(&self, ctx: &CapabilityContext<'_>) -> TaskResult {
        let hits = match self.backend.search(ctx.query).await {
            Ok(hits) => hits,
            Err(e) => {
                error!(error = %e, "search backend failed");
                return TaskResult::error(
                    self.id(),
                    "External search was unavailable for this request.",
                );
            }
        };

        if hits.is_empty() {
            info!("search returned no hits");
            return TaskResult::ok(
                self.id(),
                "No relevant external sources were found for this question.",
            );
        }

        debug!(hits = hits.len(), "search hits received");

        let mut listing = String::new();
        for (i, hit) in hits.iter().take(MAX_HITS).enumerate() {
            listing.push_str(&format!(
                "[{n}] {title}\n{snippet}\n\n",
                n = i + 1,
                title = hit.title,
                snippet = hit.snippet,
            ));
        }

        let user_prompt = format!(
            "User question: {}\n\nSearch results:\n{listing}\
             Condense these into a cited answer.",
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
                error!(error = %e, "search summarization failed");
                return TaskResult::error(
                    self.id(),
                    "Sources were found but could not be summarized.",
                );
            }
        };

        if let Some(marker) = sanitize::find_marker(&summary, false) {
            error!(marker, "search summary failed sanitization, degrading");
            return TaskResult::error(
                self.id(),
                "Sources were found but could not be summarized cleanly.",
            );
        }

        info!(chars = summary.len(), "search summary produced");
        TaskResult::ok(self.id(), summary)
    }
}
