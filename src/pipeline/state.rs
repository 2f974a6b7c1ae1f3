//! Per-run execution state.
//!
//! Owned exclusively by one run's engine task; never shared across
//! requests. The remaining queue is drained from the head, completed
//! results are append-only, and handlers only ever see a read-only view.

use std::collections::VecDeque;

use crate::ai::types::ChatMessage;
use crate::capabilities::registry::{CapabilityContext, TaskResult};
use crate::capabilities::CapabilityId;
use crate::pipeline::router::RoutingDecision;

pub struct ExecutionState {
    query: String,
    history: Vec<ChatMessage>,
    queue: VecDeque<CapabilityId>,
    results: Vec<TaskResult>,
}

impl ExecutionState {
    /// Create the state for one run. History is bounded here: only the
    /// trailing `history_window` exchanges survive, older messages are
    /// dropped outright.
    pub fn new(
        query: impl Into<String>,
        history: &[ChatMessage],
        decision: RoutingDecision,
        history_window: usize,
    ) -> Self {
        let keep = history_window.saturating_mul(2);
        let start = history.len().saturating_sub(keep);

        Self {
            query: query.into(),
            history: history[start..].to_vec(),
            queue: decision.capabilities.into(),
            results: Vec::new(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Pop the head of the remaining queue.
    pub fn pop_next(&mut self) -> Option<CapabilityId> {
        self.queue.pop_front()
    }

    /// Append a completed result. Results are never reordered or removed.
    pub fn record(&mut self, result: TaskResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[TaskResult] {
        &self.results
    }

    /// Read-only view handed to the handler currently in flight.
    pub fn context(&self) -> CapabilityContext<'_> {
        CapabilityContext {
            query: &self.query,
            history: &self.history,
            completed: &self.results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::registry::TaskResult;

    fn decision(ids: &[CapabilityId]) -> RoutingDecision {
        RoutingDecision {
            capabilities: ids.to_vec(),
        }
    }

    #[test]
    fn history_is_bounded_to_trailing_window() {
        let history: Vec<ChatMessage> = (0..10)
            .map(|i| ChatMessage::user(format!("message {i}")))
            .collect();

        let state = ExecutionState::new("q", &history, decision(&[]), 3);

        assert_eq!(state.history().len(), 6);
        assert_eq!(state.history()[0].content, "message 4");
        assert_eq!(state.history()[5].content, "message 9");
    }

    #[test]
    fn queue_drains_in_order() {
        let mut state = ExecutionState::new(
            "q",
            &[],
            decision(&[CapabilityId::Database, CapabilityId::Diagram]),
            3,
        );

        assert_eq!(state.pop_next(), Some(CapabilityId::Database));
        assert_eq!(state.pop_next(), Some(CapabilityId::Diagram));
        assert_eq!(state.pop_next(), None);
    }

    #[test]
    fn results_are_append_only_ordered() {
        let mut state = ExecutionState::new("q", &[], decision(&[]), 3);
        state.record(TaskResult::ok(CapabilityId::Database, "a"));
        state.record(TaskResult::error(CapabilityId::Search, "b"));

        let results = state.results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].capability, CapabilityId::Database);
        assert_eq!(results[1].capability, CapabilityId::Search);
    }

    #[test]
    fn context_exposes_only_completed_results() {
        let mut state = ExecutionState::new("what changed?", &[], decision(&[]), 3);
        state.record(TaskResult::ok(CapabilityId::Database, "found 3 records"));

        let ctx = state.context();
        assert_eq!(ctx.query, "what changed?");
        assert_eq!(ctx.completed.len(), 1);
    }
}
