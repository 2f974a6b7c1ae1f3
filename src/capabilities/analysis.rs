//! Analysis capability: computed statistics.
//!
//! Two model round trips bracket one sandboxed execution: the model
//! writes an analysis script for the question, the runner executes it,
//! and the model interprets the printed output. Neither the script nor
//! any execution trace crosses the result boundary.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error, info};

use super::registry::{CapabilityContext, CapabilityHandler, TaskResult};
use super::CapabilityId;
use crate::ai::client::{ChatModel, CompletionOptions};
use crate::pipeline::sanitize;

const CODEGEN_MAX_TOKENS: usize = 800;
const CODEGEN_TEMPERATURE: f32 = 0.1;
const INTERPRET_MAX_TOKENS: usize = 400;
const INTERPRET_TEMPERATURE: f32 = 0.3;

const CODEGEN_SYSTEM_PROMPT: &str = "\
You write short, self-contained analysis scripts.

RULES:
- Output ONLY code, no prose, no markdown fences
- Print every result the user asked for, with clear labels
- Use only the standard scientific stack already available
- Keep it under 40 lines
- Never read or write files, never make network calls";

const INTERPRET_SYSTEM_PROMPT: &str = "\
You are a statistician explaining computed results.

STRICT RULES:
- Explain what the numbers mean for the user's question
- Do NOT include code, variable names, or execution details
- Do NOT include stack traces or error dumps
- Be concise: 2-4 sentences
- Round numbers sensibly";

/// Seam to the out-of-scope sandboxed execution collaborator.
///
/// Runs the given script and returns its printed output. Failures
/// (including nonzero exits and timeouts) surface as errors.
#[async_trait]
pub trait CodeRunner: Send + Sync {
    async fn run(&self, code: &str) -> Result<String>;
}

pub struct AnalysisCapability {
    model: Arc<dyn ChatModel>,
    runner: Arc<dyn CodeRunner>,
}

impl AnalysisCapability {
    pub fn new(model: Arc<dyn ChatModel>, runner: Arc<dyn CodeRunner>) -> Self {
        Self { model, runner }
    }
}

#[async_trait]
impl CapabilityHandler for AnalysisCapability {
    fn id(&self) -> CapabilityId {
        CapabilityId::Analysis
    }

    async fn execute(&self, ctx: &CapabilityContext<'_>) -> TaskResult {
        let mut codegen_prompt = format!("Analysis request: {}", ctx.query);
        if !ctx.completed.is_empty() {
            codegen_prompt.push_str("\n\nFindings already gathered this run:\n");
            for result in ctx.completed {
                codegen_prompt.push_str(&format!("- {}\n", result.summary));
            }
        }
        codegen_prompt.push_str("\n\nWrite the analysis script now.");

        let code = match self
            .model
            .complete(
                CODEGEN_SYSTEM_PROMPT,
                &codegen_prompt,
                CompletionOptions {
                    max_tokens: CODEGEN_MAX_TOKENS,
                    temperature: CODEGEN_TEMPERATURE,
                },
            )
            .await
        {
            // Models fence code anyway sometimes; scrubbing would delete
            // it, so only the fence lines are stripped here.
            Ok(code) => strip_fences(&code),
            Err(e) => {
                error!(error = %e, "analysis code generation failed");
                return TaskResult::error(
                    self.id(),
                    "The analysis could not be set up for this request.",
                );
            }
        };

        debug!(lines = code.lines().count(), "analysis script generated");

        let output = match self.runner.run(&code).await {
            Ok(output) => output,
            Err(e) => {
                error!(error = %e, "analysis execution failed");
                return TaskResult::error(
                    self.id(),
                    "The analysis could not be completed for this request.",
                );
            }
        };

        let interpret_prompt = format!(
            "User question: {}\n\nComputed output:\n{output}\n\n\
             Explain these results in plain language.",
            ctx.query
        );

        let summary = match self
            .model
            .complete(
                INTERPRET_SYSTEM_PROMPT,
                &interpret_prompt,
                CompletionOptions {
                    max_tokens: INTERPRET_MAX_TOKENS,
                    temperature: INTERPRET_TEMPERATURE,
                },
            )
            .await
        {
            Ok(summary) => sanitize::scrub(&summary),
            Err(e) => {
                error!(error = %e, "analysis interpretation failed");
                return TaskResult::error(
                    self.id(),
                    "Results were computed but could not be explained.",
                );
            }
        };

        if let Some(marker) = sanitize::find_marker(&summary, false) {
            error!(marker, "analysis summary failed sanitization, degrading");
            return TaskResult::error(
                self.id(),
                "Results were computed but could not be explained cleanly.",
            );
        }

        info!(chars = summary.len(), "analysis summary produced");
        TaskResult::ok(self.id(), summary)
    }
}

/// Remove markdown fence lines without touching the code between them.
fn strip_fences(code: &str) -> String {
    code.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
