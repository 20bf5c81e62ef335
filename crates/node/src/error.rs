//! Node agent errors.

use ponsim_core::CoreError;
use ponsim_types::{NodeId, RequestError, RequestId, TrafficClass};
use thiserror::Error;

/// Errors from node configuration and node operations.
///
/// Buffer and queue overflow are not errors; they only bump drop counters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NodeError {
    #[error("{what} range for {class} is invalid: [{min}, {max}]")]
    InvalidRange {
        what: &'static str,
        class: TrafficClass,
        min: f64,
        max: f64,
    },

    #[error("request probability for {class} must be within [0, 1], got {value}")]
    InvalidProbability { class: TrafficClass, value: f64 },

    #[error("class weight ranges must allow a positive total weight")]
    ZeroWeights,

    #[error("arrival rate must be positive and finite, got {0}")]
    InvalidArrivalRate(f64),

    #[error("start offset must be non-negative and finite, got {0}")]
    InvalidStartOffset(f64),

    #[error("{0} capacity must be non-zero")]
    ZeroCapacity(&'static str),

    #[error("unknown traffic scenario '{name}' (available: {available})")]
    UnknownScenario { name: String, available: String },

    #[error("node {node}: request {id} is not in the buffer")]
    UnknownRequest { node: NodeId, id: RequestId },

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Core(#[from] CoreError),
}
