//! Synchronous, one-cycle-per-step scheduling.

use crate::metrics::MetricsCollector;
use crate::SimulationError;
use ponsim_core::{Channel, CycleTimeManager};
use ponsim_dba::{BandwidthMap, DbaStrategy, PendingRequests};
use ponsim_node::{CycleOnu, FragmentPolicy, Transmission};
use ponsim_types::{Allocation, CycleResult, NodeId, Request, RequestId, TrafficUnitId};
use tracing::{debug, warn};

/// Slack allowed when comparing a request against a node's remaining grant.
const BUDGET_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SchedulerStats {
    pub cycles_executed: u64,
    pub requests_sent: u64,
    /// Requests skipped because their node's grant ran out.
    pub requests_deferred: u64,
    pub fragments: u64,
    /// Transmissions that failed and were skipped.
    pub faults: u64,
}

/// Runs fixed-length polling cycles over [`CycleOnu`] nodes.
///
/// Each cycle polls every node at the end of the report phase, asks the
/// strategy for per-node grants, then lets the strategy pick requests one by
/// one until the transmission phase is full or nothing is left. Every request
/// goes through the same [`Channel`] the event-stepped head-end uses.
pub struct CycleScheduler {
    nodes: Vec<CycleOnu>,
    strategy: Box<dyn DbaStrategy>,
    channel: Channel,
    cycles: CycleTimeManager,
    guard_time: f64,
    fragment_policy: FragmentPolicy,
    action: Option<Vec<f64>>,
    clock: f64,
    stats: SchedulerStats,
}

impl std::fmt::Debug for CycleScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleScheduler")
            .field("nodes", &self.nodes.len())
            .field("strategy", &self.strategy.name())
            .field("clock", &self.clock)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl CycleScheduler {
    pub fn new(
        nodes: Vec<CycleOnu>,
        strategy: Box<dyn DbaStrategy>,
        channel: Channel,
        cycles: CycleTimeManager,
        guard_time: f64,
        fragment_policy: FragmentPolicy,
    ) -> Self {
        Self {
            nodes,
            strategy,
            channel,
            cycles,
            guard_time,
            fragment_policy,
            action: None,
            clock: 0.0,
            stats: SchedulerStats::default(),
        }
    }

    pub fn set_dba_algorithm(&mut self, strategy: Box<dyn DbaStrategy>) {
        self.strategy = strategy;
    }

    pub fn set_action(&mut self, action: Option<Vec<f64>>) {
        self.action = action;
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Start of the next cycle.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn nodes(&self) -> &[CycleOnu] {
        &self.nodes
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn cycles(&self) -> &CycleTimeManager {
        &self.cycles
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Execute one cycle starting at [`clock`](Self::clock).
    pub fn step(&mut self, metrics: &mut MetricsCollector) -> CycleResult {
        let cycle_number = self.cycles.cycles_issued();
        let cycle_start = self.clock;
        let phases = self.cycles.phases(cycle_start);
        let mut result = CycleResult::new(cycle_number, cycle_start, self.cycles.cycle_duration());

        let mut pending = self.collect(phases.report.end);
        if !pending.is_empty() {
            let budgets = self.allocate(&pending);
            let mut cursor = phases.transmit.start.max(self.channel.busy_until());
            self.transmit(
                &mut pending,
                budgets,
                &mut cursor,
                phases.transmit.end,
                metrics,
                &mut result,
            );

            let window = self.cycles.transmit_window();
            metrics.record_utilization((result.busy_time / window * 100.0).min(100.0));
        } else {
            metrics.record_utilization(0.0);
        }

        debug!(
            cycle = cycle_number,
            allocations = result.allocations.len(),
            sent_mb = result.total_bandwidth_mb,
            "Cycle executed"
        );

        self.stats.cycles_executed += 1;
        self.clock = self.cycles.next_cycle_start(cycle_start);
        result
    }

    /// Run `floor(time / cycle_duration)` cycles and return how many ran.
    pub fn run_for(&mut self, time: f64, metrics: &mut MetricsCollector) -> u64 {
        let cycles = (time / self.cycles.cycle_duration()).floor() as u64;
        for _ in 0..cycles {
            self.step(metrics);
        }
        cycles
    }

    /// Poll every node; nodes with an empty buffer are left out.
    fn collect(&mut self, report_time: f64) -> PendingRequests {
        let mut pending = PendingRequests::new();
        for node in self.nodes.iter_mut() {
            let id = node.id();
            let requests = node.report(report_time);
            if !requests.is_empty() {
                pending.insert(id, requests.to_vec());
            }
        }
        pending
    }

    /// Per-node grants in MB, or `None` when the strategy's selection is
    /// not capped by them.
    fn allocate(&self, pending: &PendingRequests) -> Option<BandwidthMap> {
        let demand: BandwidthMap = pending
            .iter()
            .map(|(node, requests)| (*node, requests.iter().map(Request::total_traffic_mb).sum()))
            .collect();
        let grants = self.strategy.allocate_bandwidth(
            &demand,
            self.channel.capacity_mbps(),
            self.action.as_deref(),
        );
        self.strategy.bounds_selection().then_some(grants)
    }

    fn transmit(
        &mut self,
        pending: &mut PendingRequests,
        mut budgets: Option<BandwidthMap>,
        cursor: &mut f64,
        window_end: f64,
        metrics: &mut MetricsCollector,
        result: &mut CycleResult,
    ) {
        while *cursor < window_end {
            let Some(selected) = self.strategy.select_next_request(pending, *cursor) else {
                break;
            };
            let node_id = selected.node_id();
            let request_id = selected.id();
            let size_mb = selected.total_traffic_mb();
            take_request(pending, node_id, request_id);

            if let Some(budgets) = budgets.as_mut() {
                let budget = budgets.get(&node_id).copied().unwrap_or(0.0);
                if size_mb > budget + BUDGET_TOLERANCE {
                    // Oldest-first within the node: once one does not fit, stop
                    let skipped = pending.remove(&node_id).map_or(0, |rest| rest.len()) + 1;
                    self.stats.requests_deferred += skipped as u64;
                    continue;
                }
                budgets.insert(node_id, budget - size_mb);
            }

            let available = window_end - *cursor;
            match self.send(node_id, request_id, available, *cursor) {
                Ok(tx) => {
                    let slot = tx.outcome.slot;
                    let sent_mb = tx.outcome.sent_mb;
                    if slot.duration() > 0.0 {
                        *cursor = slot.end + self.guard_time;
                    }
                    if tx.outcome.is_fragmented() {
                        result.fragmented += 1;
                        self.stats.fragments += 1;
                    }
                    if sent_mb > 0.0 {
                        result.successful += 1;
                    } else {
                        result.failed += 1;
                    }
                    self.stats.requests_sent += 1;
                    metrics.record_request(&tx.request, sent_mb, slot.duration());
                    result.push(Allocation {
                        node_id,
                        class: tx.request.dominant_class(),
                        bandwidth_mb: sent_mb,
                        slot_start: slot.start,
                        slot_duration: slot.duration(),
                        units: vec![TrafficUnitId::Request(request_id)],
                    });
                }
                Err(err) => {
                    self.stats.faults += 1;
                    warn!(
                        node = %node_id,
                        request = %request_id,
                        error = %err,
                        "Transmission failed, skipping request"
                    );
                }
            }
        }
    }

    fn send(
        &mut self,
        node_id: NodeId,
        request_id: RequestId,
        slot_duration: f64,
        earliest_start: f64,
    ) -> Result<Transmission, SimulationError> {
        let node = self
            .nodes
            .get_mut(node_id.index())
            .ok_or(SimulationError::UnknownNode(node_id))?;
        let tx = node.transmit(
            request_id,
            &mut self.channel,
            slot_duration,
            earliest_start,
            self.fragment_policy,
        )?;
        Ok(tx)
    }
}

/// Remove one request from the pending snapshot, dropping emptied nodes.
fn take_request(pending: &mut PendingRequests, node_id: NodeId, request_id: RequestId) {
    if let Some(requests) = pending.get_mut(&node_id) {
        requests.retain(|r| r.id() != request_id);
        if requests.is_empty() {
            pending.remove(&node_id);
        }
    }
}
