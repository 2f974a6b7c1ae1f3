//! The assistant service: the one long-lived object callers hold.
//!
//! Construction wires the registry, the shared chat model, and the
//! engine once; every call after that is an independent run. There is
//! no global instance, callers own the service and its lifetime.

use std::sync::Arc;

use serde::Serialize;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::error;

use crate::ai::client::{ChatClient, ChatModel};
use crate::ai::types::ChatMessage;
use crate::capabilities::{
    AnalysisCapability, CapabilityRegistry, CodeRunner, DatabaseCapability, DiagramCapability,
    QueryBackend, SearchBackend, SearchCapability,
};
use crate::config::Config;
use crate::pipeline::engine::PipelineEngine;
use crate::pipeline::events::ProgressEvent;

/// Blocking-call response shape. `intermediate_steps` is always empty;
/// per-step detail lives in the progress stream, not here.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub tool_calls: Vec<String>,
    pub intermediate_steps: Vec<serde_json::Value>,
    pub has_errors: bool,
}

pub struct AssistantService {
    engine: PipelineEngine,
}

impl AssistantService {
    /// Build a service from configuration and the external collaborators
    /// the capabilities need. The HTTP-backed chat model is shared by
    /// every model-facing stage.
    pub fn new(
        config: &Config,
        query_backend: Arc<dyn QueryBackend>,
        search_backend: Arc<dyn SearchBackend>,
        code_runner: Arc<dyn CodeRunner>,
    ) -> Self {
        let model: Arc<dyn ChatModel> = Arc::new(ChatClient::new(config));
        let registry = default_registry(model.clone(), query_backend, search_backend, code_runner);
        Self::from_parts(registry, model, config)
    }

    /// Assemble from pre-built parts. Tests and embedders that bring
    /// their own model or registry come through here.
    pub fn from_parts(
        registry: CapabilityRegistry,
        model: Arc<dyn ChatModel>,
        config: &Config,
    ) -> Self {
        Self {
            engine: PipelineEngine::new(Arc::new(registry), model, config),
        }
    }

    /// Run the pipeline to completion and return the final response.
    ///
    /// A fatal run folds into a single error-shaped response instead of
    /// propagating: callers of the blocking surface always get one
    /// well-formed `ChatResponse`.
    pub async fn chat(&self, query: &str, history: &[ChatMessage]) -> ChatResponse {
        match self.engine.run_collect(query, history).await {
            Ok(result) => ChatResponse {
                response: result.response,
                tool_calls: result
                    .capabilities_used
                    .iter()
                    .map(|c| c.as_str().to_string())
                    .collect(),
                intermediate_steps: Vec::new(),
                has_errors: result.has_errors,
            },
            Err(e) => {
                error!(error = %e, "chat run failed");
                ChatResponse {
                    response: "I hit an internal problem while answering. Please try again."
                        .to_string(),
                    tool_calls: Vec::new(),
                    intermediate_steps: Vec::new(),
                    has_errors: true,
                }
            }
        }
    }

    /// Run the pipeline and stream its progress frames. The stream ends
    /// after the terminal `complete` or `error` frame; dropping it
    /// abandons the run.
    pub fn chat_stream(
        &self,
        query: impl Into<String>,
        history: Vec<ChatMessage>,
    ) -> UnboundedReceiverStream<ProgressEvent> {
        UnboundedReceiverStream::new(self.engine.run(query, history))
    }
}

/// Wire the full capability set against the given collaborators.
pub fn default_registry(
    model: Arc<dyn ChatModel>,
    query_backend: Arc<dyn QueryBackend>,
    search_backend: Arc<dyn SearchBackend>,
    code_runner: Arc<dyn CodeRunner>,
) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(DatabaseCapability::new(
        model.clone(),
        query_backend,
    )));
    registry.register(Arc::new(SearchCapability::new(
        model.clone(),
        search_backend,
    )));
    registry.register(Arc::new(AnalysisCapability::new(model.clone(), code_runner)));
    registry.register(Arc::new(DiagramCapability::new(model)));
    registry
}
