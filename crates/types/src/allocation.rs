//! Per-cycle scheduling outcomes.

use crate::{NodeId, TrafficClass, TrafficUnitId};
use serde::{Deserialize, Serialize};

/// Channel time handed to one node within one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub node_id: NodeId,
    /// Class the slot was issued for, if it carried a single class.
    pub class: Option<TrafficClass>,
    /// Data carried by the slot, in megabytes.
    pub bandwidth_mb: f64,
    pub slot_start: f64,
    pub slot_duration: f64,
    /// Packets or requests carried in the slot.
    pub units: Vec<TrafficUnitId>,
}

impl Allocation {
    /// End of the slot, excluding any guard interval.
    pub fn slot_end(&self) -> f64 {
        self.slot_start + self.slot_duration
    }
}

/// Everything one polling cycle decided.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleResult {
    pub cycle_number: u64,
    pub cycle_start: f64,
    pub cycle_duration: f64,
    pub allocations: Vec<Allocation>,
    /// Sum of `bandwidth_mb` over all allocations.
    pub total_bandwidth_mb: f64,
    /// Units selected for transmission this cycle.
    pub units_processed: u64,
    pub successful: u64,
    pub failed: u64,
    /// Units sent only partially because the slot ran out.
    pub fragmented: u64,
    /// Channel time used by the cycle's slots.
    pub busy_time: f64,
}

impl CycleResult {
    /// Create an empty result for a cycle.
    pub fn new(cycle_number: u64, cycle_start: f64, cycle_duration: f64) -> Self {
        Self {
            cycle_number,
            cycle_start,
            cycle_duration,
            ..Default::default()
        }
    }

    /// Append an allocation and fold it into the totals.
    pub fn push(&mut self, allocation: Allocation) {
        self.total_bandwidth_mb += allocation.bandwidth_mb;
        self.busy_time += allocation.slot_duration;
        self.units_processed += allocation.units.len() as u64;
        self.allocations.push(allocation);
    }

    /// Number of distinct nodes that received channel time.
    pub fn nodes_served(&self) -> usize {
        let mut nodes: Vec<NodeId> = self.allocations.iter().map(|a| a.node_id).collect();
        nodes.sort();
        nodes.dedup();
        nodes.len()
    }
}
