//! Composition stage.
//!
//! Turns the ordered, sanitized task results into one user-facing
//! response. Each summary is the sole source of truth for its
//! capability's contribution; the prompt forbids inventing facts beyond
//! them. A generation failure here is the one fatal error of a run.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::ai::client::{ChatModel, CompletionOptions};
use crate::ai::types::{ChatMessage, ChatRole};
use crate::capabilities::registry::TaskResult;
use crate::capabilities::CapabilityId;

const COMPOSE_MAX_TOKENS: usize = 1000;
const COMPOSE_TEMPERATURE: f32 = 0.5;

/// Truncation applied to prior assistant turns in the history context.
const HISTORY_SNIPPET_CHARS: usize = 200;

const COMPOSE_SYSTEM_PROMPT: &str = "\
You are a research assistant for clinical data analysis.

Your goal is clear, professional, useful answers for medical researchers.

PRINCIPLES:
1. Clarity: professional but accessible language
2. Precision: base your answer ONLY on the specialist findings provided
3. Context: integrate multiple findings coherently
4. Honesty: if a step failed or data is missing, say so plainly
5. Value: highlight actionable insights and relevant patterns

FORMAT (rich markdown):
- Start with a direct answer to the main question
- Bold key figures and statistics
- Use bullet lists for multiple points and subheadings for long answers
- If a finding includes references or sources, list them at the end
- If a finding includes an embeddable mermaid block, include it verbatim

DO NOT:
- Invent information that is not in the findings
- Mention the specialists or the pipeline mechanics
- Use programming jargon (queries, JSON, APIs)";

/// Output of the composition stage, derived purely from the completed
/// result list and the generated text.
#[derive(Debug, Clone)]
pub struct Composition {
    pub response: String,
    pub capabilities_used: Vec<CapabilityId>,
    pub has_errors: bool,
}

pub struct Composer {
    model: Arc<dyn ChatModel>,
}

impl Composer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Produce the final response from the request, the (already bounded)
    /// trailing history window, and the ordered results. An empty result
    /// list still yields a coherent response that acknowledges no
    /// specialized data was consulted.
    pub async fn compose(
        &self,
        query: &str,
        history: &[ChatMessage],
        results: &[TaskResult],
    ) -> Result<Composition> {
        let user_prompt = build_user_prompt(query, history, results);

        let response = self
            .model
            .complete(
                COMPOSE_SYSTEM_PROMPT,
                &user_prompt,
                CompletionOptions {
                    max_tokens: COMPOSE_MAX_TOKENS,
                    temperature: COMPOSE_TEMPERATURE,
                },
            )
            .await?;

        let capabilities_used: Vec<CapabilityId> = results.iter().map(|r| r.capability).collect();
        let has_errors = results.iter().any(|r| r.is_error());

        info!(
            chars = response.len(),
            specialists = results.len(),
            has_errors,
            "composition finished"
        );

        Ok(Composition {
            response,
            capabilities_used,
            has_errors,
        })
    }
}

fn build_user_prompt(query: &str, history: &[ChatMessage], results: &[TaskResult]) -> String {
    let mut prompt = format!("User question: {query}\n\n");

    if !history.is_empty() {
        prompt.push_str("Previous conversation context:\n");
        for message in history {
            match message.role {
                ChatRole::User => {
                    prompt.push_str(&format!("User: {}\n", message.content));
                }
                ChatRole::Assistant => {
                    let snippet: String =
                        message.content.chars().take(HISTORY_SNIPPET_CHARS).collect();
                    if snippet.len() < message.content.len() {
                        prompt.push_str(&format!("Assistant: {snippet}...\n"));
                    } else {
                        prompt.push_str(&format!("Assistant: {snippet}\n"));
                    }
                }
            }
        }
        prompt.push('\n');
    }

    prompt.push_str("Specialist findings:\n");
    prompt.push_str(&format_results(results));
    prompt.push_str(
        "\n\nWrite the final answer now, in rich markdown, based only on the findings above.",
    );
    prompt
}

fn format_results(results: &[TaskResult]) -> String {
    if results.is_empty() {
        return "No specialist data was gathered for this request. Answer directly \
                from the conversation, and say that no specialized data was consulted."
            .to_string();
    }

    let mut formatted = Vec::with_capacity(results.len());
    for result in results {
        let label = result.capability.label();
        if result.is_error() {
            formatted.push(format!("**{label}** (step failed): {}", result.summary));
        } else {
            formatted.push(format!("**{label}**: {}", result.summary));
        }
    }
    formatted.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::CompletionOptions;
    use async_trait::async_trait;

    /// Echoes its inputs so tests can verify the composition is derived
    /// solely from the request text plus the summaries.
    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn complete(
            &self,
            _system_prompt: &str,
            user_message: &str,
            _options: CompletionOptions,
        ) -> Result<String> {
            Ok(user_message.to_string())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl ChatModel for FailingModel {
        async fn complete(
            &self,
            _system_prompt: &str,
            _user_message: &str,
            _options: CompletionOptions,
        ) -> Result<String> {
            Err(anyhow::anyhow!("generation unavailable"))
        }
    }

    #[tokio::test]
    async fn output_is_derived_from_query_and_summaries_only() {
        let composer = Composer::new(Arc::new(EchoModel));
        let results = vec![TaskResult::ok(
            CapabilityId::Database,
            "There are 120 episodes on record.",
        )];

        let composition = composer
            .compose("How many episodes?", &[], &results)
            .await
            .unwrap();

        assert!(composition.response.contains("How many episodes?"));
        assert!(composition
            .response
            .contains("There are 120 episodes on record."));
        assert_eq!(
            composition.capabilities_used,
            vec![CapabilityId::Database]
        );
        assert!(!composition.has_errors);
    }

    #[tokio::test]
    async fn empty_results_still_compose() {
        let composer = Composer::new(Arc::new(EchoModel));
        let composition = composer.compose("Hello!", &[], &[]).await.unwrap();

        assert!(composition
            .response
            .contains("No specialist data was gathered"));
        assert!(composition.capabilities_used.is_empty());
        assert!(!composition.has_errors);
    }

    #[tokio::test]
    async fn error_results_set_has_errors_but_are_still_listed() {
        let composer = Composer::new(Arc::new(EchoModel));
        let results = vec![
            TaskResult::ok(CapabilityId::Database, "Found 12 records."),
            TaskResult::error(CapabilityId::Search, "The search service was unavailable."),
        ];

        let composition = composer.compose("q", &[], &results).await.unwrap();

        assert!(composition.has_errors);
        assert_eq!(
            composition.capabilities_used,
            vec![CapabilityId::Database, CapabilityId::Search]
        );
        assert!(composition.response.contains("step failed"));
    }

    #[tokio::test]
    async fn generation_failure_is_fatal() {
        let composer = Composer::new(Arc::new(FailingModel));
        let err = composer.compose("q", &[], &[]).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn history_window_appears_with_truncated_assistant_turns() {
        let composer = Composer::new(Arc::new(EchoModel));
        let history = vec![
            ChatMessage::user("earlier question"),
            ChatMessage::assistant("x".repeat(500)),
        ];

        let composition = composer.compose("follow-up", &history, &[]).await.unwrap();

        assert!(composition.response.contains("earlier question"));
        assert!(composition.response.contains("..."));
        assert!(!composition.response.contains(&"x".repeat(300)));
    }
}
