//! Progress event protocol.
//!
//! `ProgressEvent` is the single source of truth for everything the
//! engine emits. A streaming transport maps these frames 1:1 (e.g. SSE
//! `data:` lines); the synchronous surface drains them internally.
//!
//! For a validated routing decision `[c1, …, cn]` the sequence is fixed:
//!
//! ```text
//! thinking → routing → specialist_start(c1) → specialist_complete(c1)
//!          → … → specialist_start(cn) → specialist_complete(cn)
//!          → synthesizing → complete
//! ```
//!
//! With `n = 0` the two specialist frames per capability disappear. On a
//! fatal engine error the sequence truncates and a single `error` frame
//! replaces `synthesizing`/`complete`. Events are append-only and never
//! revised after emission.

use serde::Serialize;

use crate::capabilities::CapabilityId;

/// One frame of the streaming observability protocol.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// The engine accepted the request and is analyzing it.
    Thinking { message: String },

    /// Routing resolved. Carries the validated capability queue and a
    /// human-readable label for display.
    Routing {
        capabilities: Vec<CapabilityId>,
        message: String,
    },

    /// A capability was dispatched.
    SpecialistStart {
        capability: CapabilityId,
        message: String,
    },

    /// A capability finished (its result may still be error-status).
    SpecialistComplete { capability: CapabilityId },

    /// All capabilities drained; final composition is running.
    Synthesizing { message: String },

    /// Terminal success frame.
    Complete {
        response: String,
        tool_calls: Vec<String>,
        has_errors: bool,
    },

    /// Terminal failure frame.
    Error { message: String },
}

impl ProgressEvent {
    /// Wire name of the frame, for logging and tests.
    pub fn type_name(&self) -> &'static str {
        match self {
            ProgressEvent::Thinking { .. } => "thinking",
            ProgressEvent::Routing { .. } => "routing",
            ProgressEvent::SpecialistStart { .. } => "specialist_start",
            ProgressEvent::SpecialistComplete { .. } => "specialist_complete",
            ProgressEvent::Synthesizing { .. } => "synthesizing",
            ProgressEvent::Complete { .. } => "complete",
            ProgressEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_serialize_with_snake_case_tag() {
        let event = ProgressEvent::SpecialistStart {
            capability: CapabilityId::Search,
            message: "External Search is working".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "specialist_start");
        assert_eq!(json["capability"], "search");
    }

    #[test]
    fn complete_frame_carries_result_fields() {
        let event = ProgressEvent::Complete {
            response: "done".to_string(),
            tool_calls: vec!["database".to_string()],
            has_errors: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "complete");
        assert_eq!(json["tool_calls"][0], "database");
        assert_eq!(json["has_errors"], false);
    }
}
