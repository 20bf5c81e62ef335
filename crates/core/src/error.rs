//! Errors raised by the clock primitives.

use thiserror::Error;

/// Invariant violations and invalid parameters in the simulation core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("event timestamp is not finite: {0}")]
    NonFiniteTimestamp(f64),

    #[error("event timestamp {timestamp} precedes the queue clock {now}")]
    TimestampInPast { timestamp: f64, now: f64 },

    #[error("channel capacity must be positive and finite, got {0} Mbps")]
    InvalidCapacity(f64),

    #[error("cycle duration must be positive and finite, got {0} s")]
    InvalidCycleDuration(f64),

    #[error("phase fractions must be non-negative and sum to 1, got {report}/{allocate}/{transmit}")]
    InvalidPhaseFractions {
        report: f64,
        allocate: f64,
        transmit: f64,
    },
}
