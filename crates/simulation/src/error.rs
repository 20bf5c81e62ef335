//! Errors raised while building or driving a simulation.

use ponsim_core::CoreError;
use ponsim_dba::DbaError;
use ponsim_node::NodeError;
use ponsim_types::NodeId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("a simulation needs at least one node")]
    NoNodes,

    #[error("guard time must be non-negative and finite, got {0} s")]
    InvalidGuardTime(f64),

    #[error("metrics sample interval must be positive and finite, got {0} s")]
    InvalidSampleInterval(f64),

    #[error("run length must be non-negative and finite, got {0} s")]
    InvalidDuration(f64),

    #[error("event addressed to unknown node {0}")]
    UnknownNode(NodeId),

    #[error("operation requires {expected} mode")]
    WrongMode { expected: &'static str },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Dba(#[from] DbaError),
}
