//! The allocation policy seam.

use ponsim_types::{NodeId, Request};
use std::collections::BTreeMap;

/// Per-node demand or grant, in megabytes.
///
/// Keyed by node id so every strategy walks nodes in ascending id order.
pub type BandwidthMap = BTreeMap<NodeId, f64>;

/// Buffered requests per node, oldest first within each node.
pub type PendingRequests = BTreeMap<NodeId, Vec<Request>>;

/// A dynamic bandwidth allocation policy.
///
/// Strategies are pure: neither method mutates the strategy or its inputs.
/// A variant must give at least one of the two methods real meaning. The
/// event-stepped orchestrator only calls [`allocate_bandwidth`]; the
/// cycle-stepped scheduler calls both.
///
/// [`allocate_bandwidth`]: DbaStrategy::allocate_bandwidth
pub trait DbaStrategy: Send {
    /// Human-readable strategy name.
    fn name(&self) -> &'static str;

    /// Split `capacity` among the nodes in `demand`.
    ///
    /// `hint` carries an externally supplied action vector (one weight per
    /// requesting node, in ascending node-id order). Strategies that have no
    /// use for it ignore it.
    fn allocate_bandwidth(
        &self,
        demand: &BandwidthMap,
        capacity: f64,
        hint: Option<&[f64]>,
    ) -> BandwidthMap;

    /// Pick the next request to put on the wire, given the clock.
    ///
    /// Defaults to the head of the first non-empty node list.
    fn select_next_request<'a>(
        &self,
        available: &'a PendingRequests,
        _clock: f64,
    ) -> Option<&'a Request> {
        available.values().find_map(|requests| requests.first())
    }

    /// Whether per-node allocations cap what the selection may send.
    ///
    /// Strategies whose policy *is* the selection return `false`.
    fn bounds_selection(&self) -> bool {
        true
    }
}

/// Nodes that currently have something to send.
pub(crate) fn requesting_nodes(demand: &BandwidthMap) -> impl Iterator<Item = (NodeId, f64)> + '_ {
    demand
        .iter()
        .filter(|(_, mb)| **mb > 0.0)
        .map(|(node, mb)| (*node, *mb))
}

/// Equal share of `capacity` across requesting nodes, capped at each demand.
pub fn equal_share(demand: &BandwidthMap, capacity: f64) -> BandwidthMap {
    let count = requesting_nodes(demand).count();
    if count == 0 || capacity <= 0.0 {
        return BandwidthMap::new();
    }
    let share = capacity / count as f64;
    requesting_nodes(demand)
        .map(|(node, mb)| (node, mb.min(share)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ponsim_types::{ClassMap, RequestId};

    struct FirstOnly;

    impl DbaStrategy for FirstOnly {
        fn name(&self) -> &'static str {
            "first-only"
        }

        fn allocate_bandwidth(
            &self,
            demand: &BandwidthMap,
            capacity: f64,
            _hint: Option<&[f64]>,
        ) -> BandwidthMap {
            equal_share(demand, capacity)
        }
    }

    #[test]
    fn test_default_selection_takes_first_available() {
        let mut pending = PendingRequests::new();
        pending.insert(NodeId(0), Vec::new());
        pending.insert(
            NodeId(1),
            vec![Request::new(
                RequestId::new(NodeId(1), 4),
                ClassMap::splat(0.001),
                0.0,
            )],
        );

        let picked = FirstOnly.select_next_request(&pending, 1.0).unwrap();
        assert_eq!(picked.id(), RequestId::new(NodeId(1), 4));
        assert!(FirstOnly.bounds_selection());
        assert!(FirstOnly.select_next_request(&PendingRequests::new(), 0.0).is_none());
    }

    #[test]
    fn test_equal_share_skips_idle_nodes() {
        let demand: BandwidthMap = [(NodeId(0), 5.0), (NodeId(1), 0.0), (NodeId(2), 50.0)]
            .into_iter()
            .collect();
        let grants = equal_share(&demand, 20.0);

        assert_eq!(grants.len(), 2);
        assert_eq!(grants[&NodeId(0)], 5.0);
        assert_eq!(grants[&NodeId(2)], 10.0);
    }
}
