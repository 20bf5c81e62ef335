//! Errors raised by the experiment front end.

use ponsim_node::NodeError;
use ponsim_simulation::SimulationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("at least one ONU is required")]
    NoOnus,

    #[error("at least one replication is required")]
    NoReplications,

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error("latency histogram: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),

    #[error("latency histogram: {0}")]
    Record(#[from] hdrhistogram::RecordError),

    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}
