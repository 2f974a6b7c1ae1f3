//! The capability-routing execution pipeline.
//!
//! One request becomes one independent, ephemeral run:
//! `Router` resolves an ordered capability queue, `PipelineEngine` drains
//! it strictly one capability at a time, and `Composer` turns the
//! accumulated sanitized results into the final response. Every state
//! transition is mirrored as a [`events::ProgressEvent`].

pub mod composer;
pub mod engine;
pub mod events;
pub mod router;
pub mod sanitize;
pub mod state;

pub use composer::{Composer, Composition};
pub use engine::{FinalResult, PipelineEngine};
pub use events::ProgressEvent;
pub use router::{Router, RoutingDecision};
pub use state::ExecutionState;
