//! Quorum: capability-routing and synthesis pipeline.
//!
//! One incoming request is classified into an ordered queue of
//! capabilities (database, search, analysis, diagram), each capability
//! runs exactly once in queue order, and a final composition stage turns
//! the accumulated summaries into a single user-facing response.
//!
//! ## Pipeline (the canonical execution loop)
//! - `PipelineEngine` - Routing, sequential dispatch, composition
//! - `ProgressEvent` - Event protocol between engine and consumers
//! - `Router` / `Composer` - The two model-backed pipeline stages
//!
//! ## Capabilities
//! - `CapabilityRegistry` - Closed set of handlers, immutable after startup
//! - `CapabilityHandler` - Contract every capability implements
//! - `TaskResult` - The only data that crosses out of a handler
//!
//! ## Information firewall
//! Handlers convert raw technical output (rows, search payloads, code,
//! stack traces) into natural-language summaries *before* returning.
//! The composer and callers only ever see summaries; see
//! `pipeline::sanitize` for the marker scan backing this contract.
//!
//! ```text
//!  request ──► Router ──► [c1, c2, …] ──► Engine ──► Composer ──► response
//!                                           │
//!                                           └──► ProgressEvent stream
//! ```

pub mod ai;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod service;

pub use ai::client::{ChatClient, ChatModel, CompletionOptions};
pub use ai::types::{ChatMessage, ChatRole};
pub use capabilities::registry::{
    CapabilityContext, CapabilityHandler, CapabilityRegistry, TaskResult, TaskStatus,
};
pub use capabilities::CapabilityId;
pub use config::Config;
pub use error::Error;
pub use pipeline::engine::{FinalResult, PipelineEngine};
pub use pipeline::events::ProgressEvent;
pub use pipeline::router::{Router, RoutingDecision};
pub use service::{AssistantService, ChatResponse};
