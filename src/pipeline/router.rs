//! Routing stage.
//!
//! One classification call per request decides which capabilities run and
//! in what order. The proposal is validated against the registry before
//! execution begins, never during. There are no retries here: a failed
//! classification falls back to the default capability.

use std::sync::Arc;

use tracing::{info, warn};

use crate::ai::client::{ChatModel, CompletionOptions};
use crate::ai::types::{ChatMessage, ChatRole};
use crate::capabilities::registry::CapabilityRegistry;
use crate::capabilities::CapabilityId;

/// Static fallback when classification fails outright.
const FALLBACK_CAPABILITY: CapabilityId = CapabilityId::Database;

const ROUTING_MAX_TOKENS: usize = 200;

const ROUTING_SYSTEM_PROMPT: &str = "\
You are an expert request-routing agent.

Analyze the user's request and decide which specialists should handle it.

AVAILABLE SPECIALISTS:
1. database: questions about data in the datastore (statistics, counts, trends, filters)
2. search: external medical/scientific information lookups
3. analysis: complex statistical analysis, calculations, correlations
4. diagram: requests for diagrams, visualizations, schematics, flows

ROUTING RULES:
- You may pick MULTIPLE specialists for a complex request, in the order they should run
- database: keywords like how many, statistics, average, total, filter, episodes, patients
- search: keywords like look up, research, information about, what is, latest studies
- analysis: keywords like calculate, correlation, statistical analysis, regression, test
- diagram: keywords like diagram, chart, visualize, schema, flow, process, show me

RESPONSE FORMAT:
Return ONLY a comma-separated list of specialist names, or the single word
\"none\" if no specialist is needed.

Examples:
- \"How many patients are there?\" -> database
- \"Calculate the correlation between age and stay length\" -> database,analysis
- \"Find information about schizophrenia\" -> search
- \"Show me a diagram of the admission process\" -> diagram
- \"Thanks, that's all!\" -> none";

/// The ordered capability queue chosen for one request. May be empty.
///
/// Invariant: every element belongs to the registry; invalid elements are
/// dropped before execution begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub capabilities: Vec<CapabilityId>,
}

impl RoutingDecision {
    pub fn empty() -> Self {
        Self {
            capabilities: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

pub struct Router {
    model: Arc<dyn ChatModel>,
}

impl Router {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Classify the request into an ordered capability queue.
    ///
    /// Never fails: a classifier error, or a non-empty proposal that
    /// validates down to nothing, falls back to the default capability.
    /// An explicit "no specialist needed" answer is honored as an empty
    /// decision.
    pub async fn route(
        &self,
        query: &str,
        history: &[ChatMessage],
        registry: &CapabilityRegistry,
    ) -> RoutingDecision {
        let user_prompt = build_user_prompt(query, history);
        let options = CompletionOptions {
            max_tokens: ROUTING_MAX_TOKENS,
            temperature: 0.0,
        };

        let proposal = match self
            .model
            .complete(ROUTING_SYSTEM_PROMPT, &user_prompt, options)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "classification failed, falling back to default capability");
                return RoutingDecision {
                    capabilities: vec![FALLBACK_CAPABILITY],
                };
            }
        };

        let decision = parse_proposal(&proposal, registry);
        info!(capabilities = ?decision.capabilities, "routing resolved");
        decision
    }
}

fn build_user_prompt(query: &str, history: &[ChatMessage]) -> String {
    let mut prompt = String::new();
    if !history.is_empty() {
        prompt.push_str("Recent conversation:\n");
        for message in history {
            let speaker = match message.role {
                ChatRole::User => "User",
                ChatRole::Assistant => "Assistant",
            };
            prompt.push_str(&format!("{speaker}: {}\n", message.content));
        }
        prompt.push('\n');
    }
    prompt.push_str(&format!(
        "User request: {query}\n\nWhich specialists should handle this request?"
    ));
    prompt
}

/// Validate a classifier proposal against the registry.
///
/// Unknown names are dropped with a warning, relative order is preserved,
/// and duplicates keep only their first occurrence: a capability runs at
/// most once per request. A proposal that names specialists but validates
/// down to nothing is treated like a classification failure.
fn parse_proposal(proposal: &str, registry: &CapabilityRegistry) -> RoutingDecision {
    let trimmed = proposal.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return RoutingDecision::empty();
    }

    let mut capabilities = Vec::new();
    for name in trimmed.split(',') {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let Some(id) = CapabilityId::parse(name) else {
            warn!(name, "dropping unknown capability from routing proposal");
            continue;
        };
        if !registry.contains(id) {
            warn!(capability = %id, "dropping unregistered capability from routing proposal");
            continue;
        }
        if capabilities.contains(&id) {
            warn!(capability = %id, "dropping duplicate capability from routing proposal");
            continue;
        }
        capabilities.push(id);
    }

    if capabilities.is_empty() {
        warn!(
            proposal = trimmed,
            "no valid capability in routing proposal, falling back to default"
        );
        return RoutingDecision {
            capabilities: vec![FALLBACK_CAPABILITY],
        };
    }

    RoutingDecision { capabilities }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::registry::{
        CapabilityContext, CapabilityHandler, TaskResult,
    };
    use anyhow::anyhow;
    use async_trait::async_trait;

    struct StubHandler(CapabilityId);

    #[async_trait]
    impl CapabilityHandler for StubHandler {
        fn id(&self) -> CapabilityId {
            self.0
        }

        async fn execute(&self, _ctx: &CapabilityContext<'_>) -> TaskResult {
            TaskResult::ok(self.0, "stub")
        }
    }

    fn full_registry() -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        for id in CapabilityId::ALL {
            registry.register(Arc::new(StubHandler(id)));
        }
        registry
    }

    struct FixedModel(Option<String>);

    #[async_trait]
    impl ChatModel for FixedModel {
        async fn complete(
            &self,
            _system_prompt: &str,
            _user_message: &str,
            _options: CompletionOptions,
        ) -> anyhow::Result<String> {
            match &self.0 {
                Some(text) => Ok(text.clone()),
                None => Err(anyhow!("classifier unreachable")),
            }
        }
    }

    #[test]
    fn proposal_order_is_preserved() {
        let registry = full_registry();
        let decision = parse_proposal("diagram, database", &registry);
        assert_eq!(
            decision.capabilities,
            vec![CapabilityId::Diagram, CapabilityId::Database]
        );
    }

    #[test]
    fn unknown_names_are_dropped_not_fatal() {
        let registry = full_registry();
        let decision = parse_proposal("database, sql_specialist", &registry);
        assert_eq!(decision.capabilities, vec![CapabilityId::Database]);
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let registry = full_registry();
        let decision = parse_proposal("database, search, database", &registry);
        assert_eq!(
            decision.capabilities,
            vec![CapabilityId::Database, CapabilityId::Search]
        );
    }

    #[test]
    fn explicit_none_is_an_empty_decision() {
        let registry = full_registry();
        assert!(parse_proposal("none", &registry).is_empty());
        assert!(parse_proposal("  NONE  ", &registry).is_empty());
        assert!(parse_proposal("", &registry).is_empty());
    }

    #[test]
    fn all_invalid_proposal_falls_back() {
        let registry = full_registry();
        let decision = parse_proposal("oracle, langgraph", &registry);
        assert_eq!(decision.capabilities, vec![CapabilityId::Database]);
    }

    #[test]
    fn unregistered_capability_is_dropped() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(StubHandler(CapabilityId::Search)));

        let decision = parse_proposal("search, diagram", &registry);
        assert_eq!(decision.capabilities, vec![CapabilityId::Search]);
    }

    #[tokio::test]
    async fn classifier_failure_falls_back_to_default() {
        let registry = full_registry();
        let router = Router::new(Arc::new(FixedModel(None)));

        let decision = router.route("how many patients?", &[], &registry).await;
        assert_eq!(decision.capabilities, vec![CapabilityId::Database]);
    }

    #[tokio::test]
    async fn classifier_empty_answer_is_honored() {
        let registry = full_registry();
        let router = Router::new(Arc::new(FixedModel(Some("none".to_string()))));

        let decision = router.route("thanks!", &[], &registry).await;
        assert!(decision.is_empty());
    }
}
