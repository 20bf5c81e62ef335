//! Head-end orchestrator for the event-stepped mode.

use crate::SimulationError;
use ponsim_core::{Channel, CycleTimeManager, EventPayload, EventQueue, TransmissionRecord};
use ponsim_dba::{BandwidthMap, DbaStrategy};
use ponsim_node::Onu;
use ponsim_types::{bytes_to_mb, mb_to_bytes, ClassMap, NodeId, TrafficClass};
use serde::Serialize;
use tracing::{debug, trace};

/// Where the head-end is within a polling cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OltState {
    #[default]
    Idle,
    Collecting,
    Allocating,
    Granting,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OltStats {
    pub cycles_executed: u64,
    /// Non-empty reports received.
    pub reports_collected: u64,
    pub grants_assigned: u64,
    pub total_grant_bytes: u64,
    /// Completed grants that carried data.
    pub successful_transmissions: u64,
    /// Completed grants that carried nothing.
    pub failed_transmissions: u64,
    /// Mean per-cycle utilization of the transmission phase, in percent.
    pub average_utilization: f64,
    #[serde(skip)]
    utilization_samples: u64,
}

/// One class grant decided in a cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Grant {
    node_id: NodeId,
    class: TrafficClass,
    bytes: u64,
}

/// The optical line terminal: polls every node once per cycle, asks the
/// DBA strategy for per-node grants and serializes them on the channel.
///
/// The head-end never looks inside node queues; it only sees per-class
/// byte reports. Given the same reports it always issues the same grants.
pub struct Olt {
    strategy: Box<dyn DbaStrategy>,
    channel: Channel,
    cycles: CycleTimeManager,
    guard_time: f64,
    next_poll_time: f64,
    /// End of the last grant plus its guard interval.
    guarded_until: f64,
    action: Option<Vec<f64>>,
    state: OltState,
    stats: OltStats,
}

impl std::fmt::Debug for Olt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Olt")
            .field("strategy", &self.strategy.name())
            .field("next_poll_time", &self.next_poll_time)
            .field("guarded_until", &self.guarded_until)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Olt {
    /// The first cycle starts at time zero.
    pub fn new(
        strategy: Box<dyn DbaStrategy>,
        channel: Channel,
        cycles: CycleTimeManager,
        guard_time: f64,
    ) -> Self {
        Self {
            strategy,
            channel,
            cycles,
            guard_time,
            next_poll_time: 0.0,
            guarded_until: 0.0,
            action: None,
            state: OltState::Idle,
            stats: OltStats::default(),
        }
    }

    /// Swap the DBA strategy; takes effect from the next cycle.
    pub fn set_dba_algorithm(&mut self, strategy: Box<dyn DbaStrategy>) {
        debug!(from = self.strategy.name(), to = strategy.name(), "DBA strategy replaced");
        self.strategy = strategy;
    }

    /// Action vector handed to the strategy as an allocation hint.
    pub fn set_action(&mut self, action: Option<Vec<f64>>) {
        self.action = action;
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn state(&self) -> OltState {
        self.state
    }

    pub fn stats(&self) -> OltStats {
        self.stats
    }

    pub fn reset_statistics(&mut self) {
        self.stats = OltStats::default();
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn cycles(&self) -> &CycleTimeManager {
        &self.cycles
    }

    pub fn next_poll_time(&self) -> f64 {
        self.next_poll_time
    }

    /// Run every cycle whose start is at or before `now`.
    ///
    /// Call before each event is processed. Missed cycles are caught up one
    /// by one on the fixed grid. Returns the number of cycles run.
    pub fn poll_if_due(
        &mut self,
        onus: &mut [Onu],
        queue: &mut EventQueue,
        now: f64,
    ) -> Result<u64, SimulationError> {
        let mut executed = 0;
        while now >= self.next_poll_time {
            let cycle_start = self.next_poll_time;
            let cycle_number = self.cycles.cycles_issued();
            // Advance first so a failed cycle is not retried forever
            self.next_poll_time = self.cycles.next_cycle_start(now);
            let outcome = self.run_cycle(onus, queue, cycle_number, cycle_start);
            self.state = OltState::Idle;
            outcome?;
            executed += 1;
        }
        Ok(executed)
    }

    fn run_cycle(
        &mut self,
        onus: &mut [Onu],
        queue: &mut EventQueue,
        cycle_number: u64,
        cycle_start: f64,
    ) -> Result<(), SimulationError> {
        self.stats.cycles_executed += 1;

        self.state = OltState::Collecting;
        let reports = self.collect(onus);
        if reports.is_empty() {
            return Ok(());
        }

        self.state = OltState::Allocating;
        let grants = self.allocate(&reports);

        self.state = OltState::Granting;
        let records = self.issue_grants(onus, &grants, cycle_number, cycle_start)?;

        debug!(
            cycle = cycle_number,
            reports = reports.len(),
            grants = records.len(),
            "Cycle executed"
        );

        for record in records {
            let completes_at = record.slot_end + self.guard_time;
            queue.schedule(
                completes_at,
                record.node_id,
                EventPayload::TransmissionComplete(record),
            )?;
        }
        Ok(())
    }

    /// Per-class byte reports of every node with something queued.
    fn collect(&mut self, onus: &mut [Onu]) -> Vec<(NodeId, ClassMap<u64>)> {
        let mut reports = Vec::new();
        for onu in onus.iter_mut() {
            let report = onu.report();
            if !report.is_zero() {
                reports.push((onu.id(), report));
            }
        }
        self.stats.reports_collected += reports.len() as u64;
        reports
    }

    /// Ask the strategy for per-node megabytes, then split each node's grant
    /// over its classes in strict priority order.
    ///
    /// The result is ordered by class priority across the whole network;
    /// within a class, by node id.
    fn allocate(&self, reports: &[(NodeId, ClassMap<u64>)]) -> Vec<Grant> {
        let demand: BandwidthMap = reports
            .iter()
            .map(|(node, report)| (*node, bytes_to_mb(report.total())))
            .collect();
        let allocation = self.strategy.allocate_bandwidth(
            &demand,
            self.channel.capacity_mbps(),
            self.action.as_deref(),
        );

        let mut grants = Vec::new();
        for (node_id, report) in reports {
            let granted_mb = allocation.get(node_id).copied().unwrap_or(0.0);
            let mut remaining = mb_to_bytes(granted_mb);
            for class in TrafficClass::ALL {
                if remaining == 0 {
                    break;
                }
                let bytes = report[class].min(remaining);
                if bytes > 0 {
                    grants.push(Grant {
                        node_id: *node_id,
                        class,
                        bytes,
                    });
                    remaining -= bytes;
                }
            }
        }
        grants.sort_by_key(|grant| grant.class.rank());
        grants
    }

    /// Reserve back-to-back slots for `grants` and pull the packets out of
    /// the node queues right away.
    fn issue_grants(
        &mut self,
        onus: &mut [Onu],
        grants: &[Grant],
        cycle_number: u64,
        cycle_start: f64,
    ) -> Result<Vec<TransmissionRecord>, SimulationError> {
        let transmit = self.cycles.phases(cycle_start).transmit;
        let mut cursor = transmit.start.max(self.guarded_until);
        let mut busy = 0.0;
        let mut records = Vec::with_capacity(grants.len());

        for grant in grants {
            let onu = onus
                .get_mut(grant.node_id.index())
                .ok_or(SimulationError::UnknownNode(grant.node_id))?;

            let slot = self
                .channel
                .grant(grant.node_id, grant.class, bytes_to_mb(grant.bytes), cursor);
            let (packets, transmitted_bytes) = onu.transmit(grant.class, grant.bytes);

            cursor = slot.end + self.guard_time;
            self.guarded_until = cursor;
            busy += slot.duration();
            self.stats.grants_assigned += 1;
            self.stats.total_grant_bytes += grant.bytes;

            trace!(
                cycle = cycle_number,
                node = %grant.node_id,
                class = %grant.class,
                grant_bytes = grant.bytes,
                transmitted_bytes,
                start = slot.start,
                end = slot.end,
                "Grant issued"
            );

            records.push(TransmissionRecord {
                node_id: grant.node_id,
                class: grant.class,
                packets,
                transmitted_bytes,
                grant_bytes: grant.bytes,
                slot_start: slot.start,
                slot_end: slot.end,
                slot_duration: slot.duration(),
                cycle_number,
                cycle_utilization: None,
            });
        }

        if let Some(last) = records.last_mut() {
            let window = self.cycles.transmit_window();
            last.cycle_utilization = Some((busy / window * 100.0).min(100.0));
        }
        Ok(records)
    }

    /// Account for a grant whose slot and guard interval have ended.
    pub fn handle_completion(&mut self, record: &TransmissionRecord) {
        if record.is_empty() {
            self.stats.failed_transmissions += 1;
        } else {
            self.stats.successful_transmissions += 1;
        }
        if let Some(sample) = record.cycle_utilization {
            let n = self.stats.utilization_samples as f64;
            self.stats.average_utilization = (self.stats.average_utilization * n + sample) / (n + 1.0);
            self.stats.utilization_samples += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ponsim_core::Event;
    use ponsim_dba::{build_strategy, LimitedStrategy, RlStrategy, StaticPolicy};
    use ponsim_node::TrafficProfile;

    fn olt(dba: &str) -> Olt {
        Olt::new(
            build_strategy(dba).unwrap(),
            Channel::new(1024.0).unwrap(),
            CycleTimeManager::default(),
            2e-6,
        )
    }

    /// Nodes with traffic queued before the first poll.
    fn loaded_onus(queue: &mut EventQueue, count: u32, arrivals: usize) -> Vec<Onu> {
        let mut onus: Vec<Onu> = (0..count)
            .map(|i| Onu::new(NodeId(i), TrafficProfile::new(1000.0), 10 + i as u64).unwrap())
            .collect();
        for onu in onus.iter_mut() {
            for _ in 0..arrivals {
                onu.on_packet_generated(queue, 0.0).unwrap();
            }
        }
        queue.clear();
        onus
    }

    fn drain(queue: &mut EventQueue) -> Vec<Event> {
        std::iter::from_fn(|| queue.pop_next()).collect()
    }

    fn records(events: &[Event]) -> Vec<&TransmissionRecord> {
        events
            .iter()
            .filter_map(|e| match &e.payload {
                EventPayload::TransmissionComplete(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_poll_catches_up_missed_cycles() {
        let mut queue = EventQueue::new();
        let mut onus = loaded_onus(&mut queue, 1, 0);
        let mut olt = olt("fcfs");

        // Cycles at 0, T, 2T and 3T are all due at 3.5T
        let ran = olt
            .poll_if_due(&mut onus, &mut queue, 3.5 * 125e-6)
            .unwrap();
        assert_eq!(ran, 4);
        assert_eq!(olt.next_poll_time(), 4.0 * 125e-6);
        assert_eq!(olt.stats().cycles_executed, 4);
        assert_eq!(olt.state(), OltState::Idle);

        // Nothing new is due before the next grid point
        assert_eq!(olt.poll_if_due(&mut onus, &mut queue, 4.0 * 125e-6 - 1e-9).unwrap(), 0);
    }

    #[test]
    fn test_idle_nodes_get_no_grants() {
        let mut queue = EventQueue::new();
        let mut onus = loaded_onus(&mut queue, 3, 0);
        let mut olt = olt("fcfs");

        olt.poll_if_due(&mut onus, &mut queue, 0.0).unwrap();

        assert!(queue.is_empty());
        assert_eq!(olt.stats().reports_collected, 0);
        assert_eq!(olt.stats().grants_assigned, 0);
    }

    #[test]
    fn test_grants_are_serialized_with_guard() {
        let mut queue = EventQueue::new();
        let mut onus = loaded_onus(&mut queue, 3, 8);
        let mut olt = olt("gated");

        olt.poll_if_due(&mut onus, &mut queue, 0.0).unwrap();
        let events = drain(&mut queue);
        let records = records(&events);
        assert!(!records.is_empty());

        // First grant starts with the transmission phase
        assert!((records[0].slot_start - 50e-6).abs() < 1e-12);
        for pair in records.windows(2) {
            assert!(pair[1].slot_start >= pair[0].slot_end + 2e-6 - 1e-15);
        }
        for (event, record) in events.iter().zip(records.iter()) {
            assert!((event.timestamp - (record.slot_end + 2e-6)).abs() < 1e-15);
        }
    }

    #[test]
    fn test_grants_ordered_by_class_priority() {
        let mut queue = EventQueue::new();
        let mut onus = loaded_onus(&mut queue, 4, 10);
        let mut olt = olt("gated");

        olt.poll_if_due(&mut onus, &mut queue, 0.0).unwrap();
        let events = drain(&mut queue);
        let ranks: Vec<u32> = records(&events).iter().map(|r| r.class.rank()).collect();

        let mut sorted = ranks.clone();
        sorted.sort();
        assert_eq!(ranks, sorted);
    }

    #[test]
    fn test_strict_priority_within_node() {
        let mut queue = EventQueue::new();
        let mut onus = loaded_onus(&mut queue, 1, 20);
        let demand: ClassMap<u64> = ClassMap::from_fn(|class| onus[0].queue(class).occupied_bytes());

        // A 64 KiB cap covers the most urgent non-empty class first
        let mut olt = Olt::new(
            Box::new(LimitedStrategy::new().with_max_grant_bytes(64 * 1024).unwrap()),
            Channel::new(1024.0).unwrap(),
            CycleTimeManager::default(),
            2e-6,
        );
        olt.poll_if_due(&mut onus, &mut queue, 0.0).unwrap();
        let events = drain(&mut queue);
        let records = records(&events);

        let first_class = TrafficClass::ALL
            .into_iter()
            .find(|class| demand[*class] > 0)
            .unwrap();
        assert_eq!(records[0].class, first_class);
        let granted: u64 = records.iter().map(|r| r.grant_bytes).sum();
        assert!(granted <= 64 * 1024);
    }

    #[test]
    fn test_later_cycle_waits_for_guarded_channel() {
        let mut queue = EventQueue::new();
        let mut onus = loaded_onus(&mut queue, 2, 30);
        let mut olt = olt("gated");

        olt.poll_if_due(&mut onus, &mut queue, 0.0).unwrap();
        let first = drain(&mut queue);
        let last_end = records(&first).last().map(|r| r.slot_end).unwrap();

        queue.clear();
        for onu in onus.iter_mut() {
            onu.on_packet_generated(&mut queue, 125e-6).unwrap();
        }
        queue.clear();
        olt.poll_if_due(&mut onus, &mut queue, 125e-6).unwrap();
        let second = drain(&mut queue);

        // The second cycle's first grant honours the first cycle's guard
        let start = records(&second)[0].slot_start;
        assert!(start >= last_end + 2e-6 - 1e-15);
    }

    #[test]
    fn test_completion_statistics() {
        let mut queue = EventQueue::new();
        let mut onus = loaded_onus(&mut queue, 2, 5);
        let mut olt = olt("gated");

        olt.poll_if_due(&mut onus, &mut queue, 0.0).unwrap();
        let events = drain(&mut queue);
        for record in records(&events) {
            olt.handle_completion(record);
        }

        let stats = olt.stats();
        assert_eq!(stats.successful_transmissions, stats.grants_assigned);
        assert!(stats.average_utilization > 0.0);
        assert!(stats.average_utilization <= 100.0);

        olt.reset_statistics();
        assert_eq!(olt.stats(), OltStats::default());
    }

    #[test]
    fn test_action_hint_reaches_strategy() {
        let mut queue = EventQueue::new();
        let mut onus = loaded_onus(&mut queue, 2, 5);
        let mut olt = olt("fcfs");
        olt.set_dba_algorithm(Box::new(RlStrategy::new().with_policy(StaticPolicy(vec![1.0, 1.0]))));
        assert_eq!(olt.strategy_name(), "RL-DBA");

        // All weight on the second node
        olt.set_action(Some(vec![0.0, 1.0]));
        olt.poll_if_due(&mut onus, &mut queue, 0.0).unwrap();
        let events = drain(&mut queue);

        assert!(records(&events).iter().all(|r| r.node_id == NodeId(1)));
    }
}
