//! Capability system.
//!
//! A capability is a named, pluggable unit of work with a fixed contract
//! (`CapabilityHandler`). The set is closed: identifiers are a compile-time
//! enum, resolved once at startup into an immutable registry.
//!
//! Handler obligations:
//! 1. Catch every internal error and degrade to an `error`-status
//!    [`TaskResult`] rather than propagating.
//! 2. Sanitize before returning: raw rows, payloads, generated code, and
//!    stack traces never leave the handler (see `pipeline::sanitize`).
//! 3. Never touch the remaining queue or another capability's result.

pub mod analysis;
pub mod database;
pub mod diagram;
pub mod registry;
pub mod search;

pub use analysis::{AnalysisCapability, CodeRunner};
pub use database::{DatabaseCapability, QueryBackend};
pub use diagram::DiagramCapability;
pub use registry::{CapabilityContext, CapabilityHandler, CapabilityRegistry, TaskResult, TaskStatus};
pub use search::{SearchBackend, SearchCapability, SearchHit};

use serde::{Deserialize, Serialize};

/// Closed set of capability identifiers.
///
/// Adding one means registering a handler for it in `CapabilityRegistry`
/// and, if externally addressable, documenting its identifier string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityId {
    /// Structured data questions answered from the datastore.
    Database,
    /// External information search.
    Search,
    /// Statistical analysis via sandboxed code execution.
    Analysis,
    /// Diagram / visualization generation.
    Diagram,
}

impl CapabilityId {
    pub const ALL: [CapabilityId; 4] = [
        CapabilityId::Database,
        CapabilityId::Search,
        CapabilityId::Analysis,
        CapabilityId::Diagram,
    ];

    /// Wire identifier, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityId::Database => "database",
            CapabilityId::Search => "search",
            CapabilityId::Analysis => "analysis",
            CapabilityId::Diagram => "diagram",
        }
    }

    /// Human-readable label for progress frames and composition prompts.
    pub fn label(&self) -> &'static str {
        match self {
            CapabilityId::Database => "Database Analysis",
            CapabilityId::Search => "External Search",
            CapabilityId::Analysis => "Statistical Analysis",
            CapabilityId::Diagram => "Visualization",
        }
    }

    /// Parse a proposed identifier. Unknown names yield `None`; the
    /// router drops them with a warning instead of failing the run.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "database" => Some(CapabilityId::Database),
            "search" => Some(CapabilityId::Search),
            "analysis" => Some(CapabilityId::Analysis),
            "diagram" => Some(CapabilityId::Diagram),
            _ => None,
        }
    }
}

impl std::fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
