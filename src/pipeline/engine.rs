//! The execution engine: one state machine per request.
//!
//! States: `ROUTING → DISPATCH(head of queue) → … → COMPOSING → DONE`,
//! with `ERROR` terminal reachable on unrecoverable failure. Dispatch is
//! strictly sequential, one capability in flight at a time, so completed
//! results always match routing order and the progress stream is
//! trivially ordered. The engine's own bookkeeping never blocks; only the
//! routing call, handler execution, and composition suspend.
//!
//! A handler failure never halts the run; it becomes an error-status
//! result and the queue keeps draining. Only a composition failure (or an
//! engine invariant violation) is fatal.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::ai::client::ChatModel;
use crate::ai::types::ChatMessage;
use crate::capabilities::registry::{CapabilityRegistry, TaskResult};
use crate::capabilities::CapabilityId;
use crate::config::Config;
use crate::error::Error;
use crate::pipeline::composer::Composer;
use crate::pipeline::events::ProgressEvent;
use crate::pipeline::router::{Router, RoutingDecision};
use crate::pipeline::state::ExecutionState;

/// Final outcome of one run, derived purely from the completed result
/// list and the composer's output. Never holds raw handler payloads.
#[derive(Debug, Clone, Serialize)]
pub struct FinalResult {
    pub response: String,
    pub capabilities_used: Vec<CapabilityId>,
    pub has_errors: bool,
}

/// The pipeline engine. Cheap to clone; all shared pieces are behind
/// `Arc` and read-only, so concurrent runs share nothing mutable.
#[derive(Clone)]
pub struct PipelineEngine {
    registry: Arc<CapabilityRegistry>,
    router: Arc<Router>,
    composer: Arc<Composer>,
    history_window: usize,
    run_timeout: Duration,
}

impl PipelineEngine {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        model: Arc<dyn ChatModel>,
        config: &Config,
    ) -> Self {
        Self {
            registry,
            router: Arc::new(Router::new(model.clone())),
            composer: Arc::new(Composer::new(model)),
            history_window: config.history_window,
            run_timeout: config.run_timeout,
        }
    }

    /// Start a streaming run.
    ///
    /// The run executes as a spawned tokio task and emits one
    /// [`ProgressEvent`] per state transition. Dropping the receiver
    /// cancels the run: the engine notices the closed channel, abandons
    /// the queue, and discards partial results.
    pub fn run(
        &self,
        query: impl Into<String>,
        history: Vec<ChatMessage>,
    ) -> mpsc::UnboundedReceiver<ProgressEvent> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let engine = self.clone();
        let query = query.into();

        tokio::spawn(async move {
            match engine.run_inner(query, history, event_tx).await {
                Ok(_) => {}
                Err(Error::Cancelled) => debug!("run cancelled by consumer"),
                Err(e) => error!(error = %e, "pipeline run failed"),
            }
        });

        event_rx
    }

    /// Execute a run to completion and return the final result.
    ///
    /// Drives the same event sequence as [`run`](Self::run); the events
    /// are simply not observed.
    pub async fn run_collect(
        &self,
        query: &str,
        history: &[ChatMessage],
    ) -> Result<FinalResult, Error> {
        // The receiver must stay alive for the whole run so the engine
        // does not mistake the unobserved channel for a disconnect.
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        self.run_inner(query.to_string(), history.to_vec(), event_tx)
            .await
    }

    async fn run_inner(
        &self,
        query: String,
        history: Vec<ChatMessage>,
        event_tx: mpsc::UnboundedSender<ProgressEvent>,
    ) -> Result<FinalResult, Error> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline_run", run_id = %run_id);
        self.drive(query, history, event_tx).instrument(span).await
    }

    async fn drive(
        &self,
        query: String,
        history: Vec<ChatMessage>,
        event_tx: mpsc::UnboundedSender<ProgressEvent>,
    ) -> Result<FinalResult, Error> {
        let deadline = Instant::now() + self.run_timeout;

        let _ = event_tx.send(ProgressEvent::Thinking {
            message: "Analyzing your request...".to_string(),
        });

        // ── ROUTING ────────────────────────────────────────────────────
        let decision = self.router.route(&query, &history, &self.registry).await;

        let _ = event_tx.send(ProgressEvent::Routing {
            capabilities: decision.capabilities.clone(),
            message: routing_label(&decision),
        });

        let mut state = ExecutionState::new(query, &history, decision, self.history_window);

        // ── DISPATCH, one capability in flight ─────────────────────────
        while let Some(id) = state.pop_next() {
            if event_tx.is_closed() {
                return Err(Error::Cancelled);
            }

            let _ = event_tx.send(ProgressEvent::SpecialistStart {
                capability: id,
                message: format!("{} is working...", id.label()),
            });

            // The routing decision was validated against the registry, so
            // a miss here means the engine itself is broken.
            let Some(handler) = self.registry.get(id) else {
                let message = format!("validated capability '{id}' missing from registry");
                error!(capability = %id, "engine invariant violated");
                let _ = event_tx.send(ProgressEvent::Error {
                    message: message.clone(),
                });
                return Err(Error::Run(message));
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            let outcome = {
                let ctx = state.context();
                tokio::select! {
                    result = timeout(remaining, handler.execute(&ctx)) => Some(result),
                    _ = event_tx.closed() => None,
                }
            };

            match outcome {
                Some(Ok(result)) => {
                    info!(capability = %id, status = ?result.status, "capability finished");
                    state.record(result);
                    let _ = event_tx.send(ProgressEvent::SpecialistComplete { capability: id });
                }
                Some(Err(_elapsed)) => {
                    // Run deadline hit: abort this capability as an error
                    // result and go straight to composition with whatever
                    // results exist, abandoning the rest of the queue.
                    warn!(capability = %id, "run deadline exceeded during dispatch");
                    state.record(TaskResult::error(
                        id,
                        format!("The {} step ran out of time and was skipped.", id.label()),
                    ));
                    let _ = event_tx.send(ProgressEvent::SpecialistComplete { capability: id });
                    break;
                }
                None => {
                    debug!(capability = %id, "consumer disconnected mid-dispatch");
                    return Err(Error::Cancelled);
                }
            }
        }

        // ── COMPOSING ──────────────────────────────────────────────────
        let _ = event_tx.send(ProgressEvent::Synthesizing {
            message: "Integrating findings...".to_string(),
        });

        match self
            .composer
            .compose(state.query(), state.history(), state.results())
            .await
        {
            Ok(composition) => {
                let result = FinalResult {
                    response: composition.response,
                    capabilities_used: composition.capabilities_used,
                    has_errors: composition.has_errors,
                };
                let _ = event_tx.send(ProgressEvent::Complete {
                    response: result.response.clone(),
                    tool_calls: result
                        .capabilities_used
                        .iter()
                        .map(|id| id.as_str().to_string())
                        .collect(),
                    has_errors: result.has_errors,
                });
                Ok(result)
            }
            Err(e) => {
                let message = format!("Failed to generate a response: {e}");
                error!(error = %e, "composition failed");
                let _ = event_tx.send(ProgressEvent::Error {
                    message: message.clone(),
                });
                Err(Error::Run(message))
            }
        }
    }
}

fn routing_label(decision: &RoutingDecision) -> String {
    if decision.is_empty() {
        return "No specialist needed".to_string();
    }
    let labels: Vec<&str> = decision.capabilities.iter().map(|id| id.label()).collect();
    format!("Consulting: {}", labels.join(", "))
}
