//! Strict class priority with starvation promotion.

use crate::strategy::{requesting_nodes, BandwidthMap, DbaStrategy, PendingRequests};
use crate::DbaError;
use ponsim_types::Request;
use std::cmp::Ordering;

/// Default wait after which a request jumps ahead of every class.
pub const DEFAULT_STARVATION_THRESHOLD_MS: f64 = 100.0;

/// Rank given to a starved request; beats every class rank.
const STARVED_RANK: u32 = 0;

/// Serves the most urgent class first, unless something has waited too long.
///
/// A request that has waited at least the starvation threshold is promoted
/// to rank 0; among promoted requests the oldest wins.
#[derive(Debug, Clone, Copy)]
pub struct PriorityStrategy {
    /// Seconds.
    starvation_threshold: f64,
}

impl Default for PriorityStrategy {
    fn default() -> Self {
        Self {
            starvation_threshold: DEFAULT_STARVATION_THRESHOLD_MS / 1000.0,
        }
    }
}

impl PriorityStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the starvation threshold, given in milliseconds.
    pub fn with_starvation_threshold_ms(mut self, threshold_ms: f64) -> Result<Self, DbaError> {
        if !(threshold_ms.is_finite() && threshold_ms > 0.0) {
            return Err(DbaError::InvalidStarvationThreshold(threshold_ms));
        }
        self.starvation_threshold = threshold_ms / 1000.0;
        Ok(self)
    }

    /// Starvation threshold in seconds.
    pub fn starvation_threshold(&self) -> f64 {
        self.starvation_threshold
    }

    /// Rank used for ordering at `clock`: 0 if starved, else the class rank.
    pub fn effective_rank(&self, request: &Request, clock: f64) -> u32 {
        if clock - request.created_at() >= self.starvation_threshold {
            STARVED_RANK
        } else {
            request.priority_rank()
        }
    }

    fn compare(&self, a: &Request, b: &Request, clock: f64) -> Ordering {
        self.effective_rank(a, clock)
            .cmp(&self.effective_rank(b, clock))
            .then_with(|| a.created_at().total_cmp(&b.created_at()))
            .then_with(|| a.id().cmp(&b.id()))
    }
}

impl DbaStrategy for PriorityStrategy {
    fn name(&self) -> &'static str {
        "Priority"
    }

    /// Bulk path: the first requesting node takes everything it asked for.
    fn allocate_bandwidth(
        &self,
        demand: &BandwidthMap,
        capacity: f64,
        _hint: Option<&[f64]>,
    ) -> BandwidthMap {
        requesting_nodes(demand)
            .next()
            .map(|(node, mb)| (node, mb.min(capacity.max(0.0))))
            .into_iter()
            .collect()
    }

    fn select_next_request<'a>(
        &self,
        available: &'a PendingRequests,
        clock: f64,
    ) -> Option<&'a Request> {
        available
            .values()
            .flatten()
            .min_by(|a, b| self.compare(a, b, clock))
    }

    fn bounds_selection(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ponsim_types::{ClassMap, NodeId, RequestId, TrafficClass, EMPTY_RANK};

    fn request(node: u32, class: TrafficClass, created_at: f64) -> Request {
        let mut traffic = ClassMap::splat(0.0);
        traffic[class] = 0.01;
        Request::new(RequestId::new(NodeId(node), 0), traffic, created_at)
    }

    fn pending(requests: Vec<Request>) -> PendingRequests {
        let mut map = PendingRequests::new();
        for req in requests {
            map.entry(req.node_id()).or_default().push(req);
        }
        map
    }

    #[test]
    fn test_priority_beats_age_until_starvation() {
        let a = request(0, TrafficClass::Medium, 0.0);
        let b = request(1, TrafficClass::Highest, 0.05);
        let available = pending(vec![a, b]);
        let strategy = PriorityStrategy::new();

        let early = strategy.select_next_request(&available, 0.06).unwrap();
        assert_eq!(early.node_id(), NodeId(1), "highest class wins before starvation");

        let late = strategy.select_next_request(&available, 0.2).unwrap();
        assert_eq!(late.node_id(), NodeId(0), "starved request is promoted");
    }

    #[test]
    fn test_threshold_boundary_counts_as_starved() {
        let strategy = PriorityStrategy::new();
        let req = request(0, TrafficClass::Lowest, 1.0);

        assert_eq!(strategy.effective_rank(&req, 1.05), 5);
        assert_eq!(strategy.effective_rank(&req, 1.0 + strategy.starvation_threshold()), 0);
    }

    #[test]
    fn test_empty_requests_rank_last() {
        let strategy = PriorityStrategy::new();
        let empty = Request::new(RequestId::new(NodeId(0), 0), ClassMap::splat(0.0), 0.0);
        let low = request(1, TrafficClass::Lowest, 0.01);
        assert_eq!(strategy.effective_rank(&empty, 0.02), EMPTY_RANK);

        let available = pending(vec![empty, low]);
        let picked = strategy.select_next_request(&available, 0.02).unwrap();
        assert_eq!(picked.node_id(), NodeId(1));
    }

    #[test]
    fn test_custom_threshold() {
        let strategy = PriorityStrategy::new().with_starvation_threshold_ms(10.0).unwrap();
        assert!((strategy.starvation_threshold() - 0.01).abs() < 1e-12);
        assert!(PriorityStrategy::new().with_starvation_threshold_ms(0.0).is_err());
    }
}
