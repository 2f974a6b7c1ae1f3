//! Diagram capability: visualizations as embeddable mermaid blocks.
//!
//! The one place a code fence is allowed across the result boundary:
//! the summary carries a single ```mermaid block plus a one-line
//! description, and the result is flagged so downstream checks permit
//! exactly that fence.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error, info};

use super::registry::{CapabilityContext, CapabilityHandler, TaskResult};
use super::CapabilityId;
use crate::ai::client::{ChatModel, CompletionOptions};
use crate::pipeline::sanitize;

const DIAGRAM_MAX_TOKENS: usize = 800;
const DIAGRAM_TEMPERATURE: f32 = 0.2;

/// Diagram types the renderer on the consuming side supports.
const KNOWN_HEADERS: &[&str] = &[
    "graph",
    "flowchart",
    "sequencediagram",
    "pie",
    "gantt",
    "xychart-beta",
    "mindmap",
    "timeline",
];

const DIAGRAM_SYSTEM_PROMPT: &str = "\
You design mermaid diagrams for clinical data questions.

RULES:
- Output exactly one mermaid diagram inside a ```mermaid fence
- Before the fence, write ONE sentence describing what the diagram shows
- Choose the simplest diagram type that fits (pie, flowchart, xychart-beta...)
- Use only data mentioned in the request or the findings provided
- No other code, no JSON, no commentary after the diagram";

pub struct DiagramCapability {
    model: Arc<dyn ChatModel>,
}

impl DiagramCapability {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl CapabilityHandler for DiagramCapability {
    fn id(&self) -> CapabilityId {
        CapabilityId::Diagram
    }

    async fn execute(&self, ctx: &CapabilityContext<'_>) -> TaskResult {
        let mut user_prompt = format!("Visualization request: {}", ctx.query);
        if !ctx.completed.is_empty() {
            user_prompt.push_str("\n\nFindings gathered this run:\n");
            for result in ctx.completed {
                user_prompt.push_str(&format!("- {}\n", result.summary));
            }
        }
        user_prompt.push_str("\n\nProduce the diagram now.");

        let output = match self
            .model
            .complete(
                DIAGRAM_SYSTEM_PROMPT,
                &user_prompt,
                CompletionOptions {
                    max_tokens: DIAGRAM_MAX_TOKENS,
                    temperature: DIAGRAM_TEMPERATURE,
                },
            )
            .await
        {
            Ok(output) => output,
            Err(e) => {
                error!(error = %e, "diagram generation failed");
                return TaskResult::error(
                    self.id(),
                    "A diagram could not be generated for this request.",
                );
            }
        };

        let summary = match extract_diagram(&output) {
            Some(summary) => summary,
            None => {
                error!("model output held no valid mermaid block");
                return TaskResult::error(
                    self.id(),
                    "A diagram could not be generated for this request.",
                );
            }
        };

        if let Some(marker) = sanitize::find_marker(&summary, true) {
            error!(marker, "diagram summary failed sanitization, degrading");
            return TaskResult::error(
                self.id(),
                "A diagram was generated but could not be delivered cleanly.",
            );
        }

        info!(chars = summary.len(), "diagram produced");
        TaskResult::ok(self.id(), summary).with_diagram()
    }
}

/// Pull the first mermaid block out of the model output and rebuild the
/// summary as description plus fence, dropping any trailing chatter.
/// Returns `None` when no well-formed block with a known diagram header
/// is present.
fn extract_diagram(output: &str) -> Option<String> {
    let start = output.find("```mermaid")?;
    let body_start = start + "```mermaid".len();
    let body_len = output[body_start..].find("```")?;
    let body = output[body_start..body_start + body_len].trim();

    let header = body
        .lines()
        .next()?
        .trim()
        .split_whitespace()
        .next()?
        .to_ascii_lowercase();
    if !KNOWN_HEADERS.contains(&header.as_str()) {
        debug!(header, "unknown diagram type");
        return None;
    }

    let description = output[..start].trim();
    if description.is_empty() {
        Some(format!("```mermaid\n{body}\n```"))
    } else {
        Some(format!("{description}\n\n```mermaid\n{body}\n```"))
    }
}
