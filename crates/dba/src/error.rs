//! Strategy construction errors.

use thiserror::Error;

/// Configuration errors surfaced when a strategy is built.
///
/// Runtime problems (a malformed external action, for instance) are never
/// errors; strategies fall back and log instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DbaError {
    #[error("unknown DBA strategy '{name}' (available: {available})")]
    UnknownStrategy { name: String, available: String },

    #[error("starvation threshold must be positive and finite, got {0} ms")]
    InvalidStarvationThreshold(f64),

    #[error("grant limit must be positive and finite, got {0} bytes")]
    InvalidGrantLimit(f64),
}
