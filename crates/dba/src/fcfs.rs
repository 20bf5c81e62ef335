//! First-come-first-served.

use crate::strategy::{requesting_nodes, BandwidthMap, DbaStrategy, PendingRequests};
use ponsim_types::Request;

/// Serves the globally oldest request first.
///
/// Ties on `created_at` go to the lower request id (node, then sequence),
/// so the choice never depends on how the caller iterates nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FcfsStrategy;

impl FcfsStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl DbaStrategy for FcfsStrategy {
    fn name(&self) -> &'static str {
        "FCFS"
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
        _clock: f64,
    ) -> Option<&'a Request> {
        available.values().flatten().min_by(|a, b| {
            a.created_at()
                .total_cmp(&b.created_at())
                .then_with(|| a.id().cmp(&b.id()))
        })
    }

    fn bounds_selection(&self) -> bool {
        false
    }
}
