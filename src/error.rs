//! Crate-level error types.
//!
//! Most failure modes in the pipeline are recovered locally and never
//! surface as errors: routing falls back to a default capability and
//! handler failures degrade to error-status task results. Only startup
//! problems and a fatal run are worth a typed error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Required configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The run reached a terminal error: the composition stage failed or
    /// the engine violated one of its own invariants. Partial specialist
    /// results are discarded rather than surfaced half-formed.
    #[error("pipeline run failed: {0}")]
    Run(String),

    /// The progress consumer disconnected and the run was abandoned.
    #[error("pipeline run cancelled")]
    Cancelled,
}
