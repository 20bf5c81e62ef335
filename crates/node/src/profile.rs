//! Per-node traffic configuration.

use crate::buffer::DEFAULT_BUFFER_CAPACITY;
use crate::NodeError;
use ponsim_types::{ClassMap, TrafficClass};
use serde::{Deserialize, Serialize};

/// Inclusive `(min, max)` range.
pub type Range = (f64, f64);

/// Everything a node needs to generate and buffer traffic.
///
/// Built once at setup time and never read back from the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficProfile {
    /// Weight range per class; a fresh weight is drawn from each range on
    /// every arrival.
    pub class_weights: ClassMap<Range>,

    /// Packet/request size range per class, in megabytes.
    pub class_sizes_mb: ClassMap<Range>,

    /// Byte cap of each class queue (event mode).
    pub queue_caps_bytes: ClassMap<u64>,

    /// Probability that a request carries each class (cycle mode).
    pub request_probabilities: ClassMap<f64>,

    /// Requests the buffer can hold (cycle mode).
    pub buffer_capacity: usize,

    /// Mean arrivals per second.
    pub arrival_rate: f64,

    /// Service level agreement in Mbps.
    pub sla_mbps: f64,

    /// Time of the node's first possible arrival.
    pub start_offset: f64,
}

impl Default for TrafficProfile {
    fn default() -> Self {
        Self {
            class_weights: ClassMap::new((0.1, 0.3), (0.2, 0.4), (0.3, 0.6), (0.2, 0.5), (0.1, 0.2)),
            class_sizes_mb: ClassMap::new(
                (0.050, 0.100),
                (0.030, 0.070),
                (0.010, 0.025),
                (0.005, 0.015),
                (0.001, 0.005),
            ),
            queue_caps_bytes: ClassMap::new(
                512 * 1024,
                512 * 1024,
                1024 * 1024,
                1024 * 1024,
                256 * 1024,
            ),
            request_probabilities: ClassMap::new(0.5, 0.7, 0.8, 0.6, 0.9),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            arrival_rate: 10.0,
            sla_mbps: 100.0,
            start_offset: 0.0,
        }
    }
}

impl TrafficProfile {
    pub fn new(arrival_rate: f64) -> Self {
        Self {
            arrival_rate,
            ..Default::default()
        }
    }

    pub fn with_class_weights(mut self, weights: ClassMap<Range>) -> Self {
        self.class_weights = weights;
        self
    }

    pub fn with_class_sizes_mb(mut self, sizes: ClassMap<Range>) -> Self {
        self.class_sizes_mb = sizes;
        self
    }

    pub fn with_queue_caps_bytes(mut self, caps: ClassMap<u64>) -> Self {
        self.queue_caps_bytes = caps;
        self
    }

    pub fn with_request_probabilities(mut self, probabilities: ClassMap<f64>) -> Self {
        self.request_probabilities = probabilities;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_arrival_rate(mut self, rate: f64) -> Self {
        self.arrival_rate = rate;
        self
    }

    pub fn with_sla_mbps(mut self, sla: f64) -> Self {
        self.sla_mbps = sla;
        self
    }

    pub fn with_start_offset(mut self, offset: f64) -> Self {
        self.start_offset = offset;
        self
    }

    /// Check every parameter, failing on the first bad one.
    pub fn validate(&self) -> Result<(), NodeError> {
        for (class, range) in self.class_weights.iter() {
            check_range("weight", class, *range)?;
        }
        if self.class_weights.values().map(|(_, max)| max).sum::<f64>() <= 0.0 {
            return Err(NodeError::ZeroWeights);
        }
        for (class, range) in self.class_sizes_mb.iter() {
            check_range("size", class, *range)?;
        }
        for (class, p) in self.request_probabilities.iter() {
            if !(0.0..=1.0).contains(p) {
                return Err(NodeError::InvalidProbability { class, value: *p });
            }
        }
        if self.queue_caps_bytes.values().any(|cap| *cap == 0) {
            return Err(NodeError::ZeroCapacity("queue"));
        }
        if self.buffer_capacity == 0 {
            return Err(NodeError::ZeroCapacity("buffer"));
        }
        if !(self.arrival_rate.is_finite() && self.arrival_rate > 0.0) {
            return Err(NodeError::InvalidArrivalRate(self.arrival_rate));
        }
        if !(self.start_offset.is_finite() && self.start_offset >= 0.0) {
            return Err(NodeError::InvalidStartOffset(self.start_offset));
        }
        Ok(())
    }
}

fn check_range(what: &'static str, class: TrafficClass, (min, max): Range) -> Result<(), NodeError> {
    if min.is_finite() && max.is_finite() && min >= 0.0 && min <= max {
        Ok(())
    } else {
        Err(NodeError::InvalidRange {
            what,
            class,
            min,
            max,
        })
    }
}
