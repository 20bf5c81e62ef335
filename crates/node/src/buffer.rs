//! Count-bounded request buffer for cycle-stepped nodes.

use ponsim_types::{Request, RequestId};
use serde::Serialize;

/// Default number of requests a node can hold.
pub const DEFAULT_BUFFER_CAPACITY: usize = 512;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BufferStats {
    pub capacity: usize,
    pub occupancy: usize,
    pub utilization: f64,
    pub arrivals: u64,
    pub dropped: u64,
    pub successful_insertions: u64,
    pub loss_rate: f64,
}

/// Requests waiting at a node, oldest first.
#[derive(Debug, Clone)]
pub struct RequestBuffer {
    capacity: usize,
    requests: Vec<Request>,
    arrivals: u64,
    dropped: u64,
}

impl Default for RequestBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl RequestBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            requests: Vec::new(),
            arrivals: 0,
            dropped: 0,
        }
    }

    /// Append a new arrival. Returns `false` if the buffer was full.
    pub fn push(&mut self, request: Request) -> bool {
        self.arrivals += 1;
        if self.requests.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        self.requests.push(request);
        true
    }

    /// Put a partially sent request back at the head of the buffer.
    ///
    /// Not an arrival, so the arrival counters are untouched. Returns
    /// `false` if there is no room.
    pub fn requeue_front(&mut self, request: Request) -> bool {
        if self.requests.len() >= self.capacity {
            return false;
        }
        self.requests.insert(0, request);
        true
    }

    pub fn remove(&mut self, id: RequestId) -> Option<Request> {
        let index = self.requests.iter().position(|r| r.id() == id)?;
        Some(self.requests.remove(index))
    }

    pub fn get(&self, id: RequestId) -> Option<&Request> {
        self.requests.iter().find(|r| r.id() == id)
    }

    /// Earliest-created request; ties go to the one buffered first.
    pub fn oldest(&self) -> Option<&Request> {
        self.requests
            .iter()
            .reduce(|best, r| if r.created_at() < best.created_at() { r } else { best })
    }

    /// Request carrying the most urgent class; ties go to the one buffered first.
    pub fn highest_priority(&self) -> Option<&Request> {
        self.requests.iter().reduce(|best, r| {
            if r.priority_rank() < best.priority_rank() {
                r
            } else {
                best
            }
        })
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.requests.len() as f64 / self.capacity as f64
    }

    pub fn stats(&self) -> BufferStats {
        let loss_rate = if self.arrivals > 0 {
            self.dropped as f64 / self.arrivals as f64
        } else {
            0.0
        };
        BufferStats {
            capacity: self.capacity,
            occupancy: self.requests.len(),
            utilization: self.utilization(),
            arrivals: self.arrivals,
            dropped: self.dropped,
            successful_insertions: self.arrivals - self.dropped,
            loss_rate,
        }
    }

    pub fn reset_stats(&mut self) {
        self.arrivals = 0;
        self.dropped = 0;
    }
}
