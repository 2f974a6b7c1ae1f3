//! Capability registry and handler contract.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::CapabilityId;
use crate::ai::types::ChatMessage;

/// Outcome status of one capability run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Ok,
    Error,
}

/// One capability's sanitized outcome, the only data that crosses the
/// information firewall.
///
/// `summary` is natural language only. The single exception is a fenced
/// ```mermaid block when `has_diagram` is set; the composer embeds it
/// verbatim but never re-derives technical content from it.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub capability: CapabilityId,
    pub status: TaskStatus,
    pub summary: String,
    pub has_diagram: bool,
}

impl TaskResult {
    pub fn ok(capability: CapabilityId, summary: impl Into<String>) -> Self {
        Self {
            capability,
            status: TaskStatus::Ok,
            summary: summary.into(),
            has_diagram: false,
        }
    }

    /// Degraded-mode result. The summary should say what failed in plain
    /// terms; technical detail belongs in the log, not here.
    pub fn error(capability: CapabilityId, summary: impl Into<String>) -> Self {
        Self {
            capability,
            status: TaskStatus::Error,
            summary: summary.into(),
            has_diagram: false,
        }
    }

    pub fn with_diagram(mut self) -> Self {
        self.has_diagram = true;
        self
    }

    pub fn is_error(&self) -> bool {
        self.status == TaskStatus::Error
    }
}

/// Read-only view of the execution state handed to a handler.
///
/// `completed` holds only already-finished results, in dispatch order;
/// a handler must never depend on capabilities that have not run yet.
pub struct CapabilityContext<'a> {
    pub query: &'a str,
    pub history: &'a [ChatMessage],
    pub completed: &'a [TaskResult],
}

/// Contract every capability implements.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    fn id(&self) -> CapabilityId;

    /// Execute the capability. Infallible by signature: internal errors
    /// must degrade to an error-status result inside the handler.
    async fn execute(&self, ctx: &CapabilityContext<'_>) -> TaskResult;
}

/// Closed lookup table from identifier to handler.
///
/// Built once at startup, then wrapped in `Arc` and shared read-only
/// across concurrent runs. There is deliberately no way to mutate it
/// afterwards.
#[derive(Default)]
pub struct CapabilityRegistry {
    handlers: HashMap<CapabilityId, Arc<dyn CapabilityHandler>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own id. Last registration wins.
    pub fn register(&mut self, handler: Arc<dyn CapabilityHandler>) {
        let id = handler.id();
        if self.handlers.insert(id, handler).is_some() {
            tracing::warn!(capability = %id, "handler re-registered, replacing previous");
        }
    }

    pub fn get(&self, id: CapabilityId) -> Option<Arc<dyn CapabilityHandler>> {
        self.handlers.get(&id).cloned()
    }

    pub fn contains(&self, id: CapabilityId) -> bool {
        self.handlers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHandler(CapabilityId);

    #[async_trait]
    impl CapabilityHandler for NoopHandler {
        fn id(&self) -> CapabilityId {
            self.0
        }

        async fn execute(&self, _ctx: &CapabilityContext<'_>) -> TaskResult {
            TaskResult::ok(self.0, "nothing to report")
        }
    }

    #[test]
    fn registry_lookup_by_id() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(NoopHandler(CapabilityId::Database)));

        assert!(registry.contains(CapabilityId::Database));
        assert!(!registry.contains(CapabilityId::Diagram));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn re_registration_replaces() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(NoopHandler(CapabilityId::Search)));
        registry.register(Arc::new(NoopHandler(CapabilityId::Search)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn error_results_are_marked() {
        let result = TaskResult::error(CapabilityId::Database, "the datastore was unreachable");
        assert!(result.is_error());
        assert!(!result.has_diagram);
    }
}
