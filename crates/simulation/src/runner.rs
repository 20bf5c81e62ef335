//! Unified simulation runner.

use crate::config::{OverflowPolicy, ResourceLimits, SimulationConfig, SimulationMode};
use crate::cycle_scheduler::CycleScheduler;
use crate::metrics::{MetricsCollector, NodeBufferLevel};
use crate::observer::CycleObserver;
use crate::olt::Olt;
use crate::results::{
    NodeCounters, NodeStatistics, RunSummary, SimulationResults, SimulationStats,
};
use crate::SimulationError;
use ponsim_core::{Channel, CycleTimeManager, Event, EventPayload, EventQueue};
use ponsim_dba::{build_strategy_with, parse_strategy, DbaStrategy};
use ponsim_node::{derive_seeds, CycleOnu, Onu};
use ponsim_types::{bytes_to_mb, CycleResult, NodeId, Request};
use tracing::{info, warn};

/// How far a call to [`SimulationRunner::run`] advances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunLength {
    /// A number of polling cycles.
    Steps(u64),
    /// Simulated seconds.
    Duration(f64),
}

struct EventEngine {
    olt: Olt,
    onus: Vec<Onu>,
    queue: EventQueue,
}

enum Engine {
    Cycles(CycleScheduler),
    Events(EventEngine),
}

#[derive(Debug, Default)]
struct RunCounters {
    events_processed: u64,
    faults: u64,
    warnings: u64,
    over_queue_limit: bool,
    abort_reason: Option<String>,
}

/// Drives either stepping mode and reports one result shape.
///
/// Given the same configuration (seed included) a run is reproducible
/// event for event. Runs are single-threaded; nothing here blocks.
///
/// ```text
/// cycles:  step ──► CycleScheduler::step ──► CycleResult
/// events:  peek ──► Olt::poll_if_due ──► pop ──► Onu / completion
/// ```
pub struct SimulationRunner {
    config: SimulationConfig,
    engine: Engine,
    metrics: MetricsCollector,
    observer: Option<Box<dyn CycleObserver>>,
    simulation_time: f64,
    counters: RunCounters,
    initialized: bool,
}

impl std::fmt::Debug for SimulationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationRunner")
            .field("mode", &self.config.mode)
            .field("nodes", &self.config.num_nodes())
            .field("simulation_time", &self.simulation_time)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl SimulationRunner {
    /// Build every component from `config`, failing fast on bad settings.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;

        let strategy = build_strategy_with(parse_strategy(&config.dba)?, &config.dba_options)?;
        let channel =
            Channel::new(config.capacity_mbps)?.with_log_capacity(config.slot_log_capacity);
        let cycles = CycleTimeManager::new(config.cycle_duration)?
            .with_phase_fractions(config.phase_fractions)?;
        let seeds = derive_seeds(config.seed, config.num_nodes());

        let engine = match config.mode {
            SimulationMode::Cycles => {
                let nodes = config
                    .profiles
                    .iter()
                    .zip(seeds)
                    .enumerate()
                    .map(|(i, (profile, seed))| {
                        CycleOnu::new(NodeId::from_index(i), profile.clone(), seed)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Engine::Cycles(CycleScheduler::new(
                    nodes,
                    strategy,
                    channel,
                    cycles,
                    config.guard_time,
                    config.fragment_policy,
                ))
            }
            SimulationMode::Events => {
                let mut onus = config
                    .profiles
                    .iter()
                    .zip(seeds)
                    .enumerate()
                    .map(|(i, (profile, seed))| Onu::new(NodeId::from_index(i), profile.clone(), seed))
                    .collect::<Result<Vec<_>, _>>()?;
                let mut queue = EventQueue::new();
                for onu in onus.iter_mut() {
                    onu.schedule_first_arrival(&mut queue, 0.0)?;
                }
                Engine::Events(EventEngine {
                    olt: Olt::new(strategy, channel, cycles, config.guard_time),
                    onus,
                    queue,
                })
            }
        };

        info!(
            mode = %config.mode,
            nodes = config.num_nodes(),
            dba = %config.dba,
            seed = config.seed,
            capacity_mbps = config.capacity_mbps,
            "Simulation initialized"
        );

        let metrics = MetricsCollector::new(&config.limits, config.sample_interval);
        Ok(Self {
            config,
            engine,
            metrics,
            observer: None,
            simulation_time: 0.0,
            counters: RunCounters::default(),
            initialized: false,
        })
    }

    pub fn with_observer(mut self, observer: impl CycleObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn set_observer(&mut self, observer: Box<dyn CycleObserver>) {
        self.observer = Some(observer);
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn mode(&self) -> SimulationMode {
        self.config.mode
    }

    /// Simulated time reached so far.
    pub fn simulation_time(&self) -> f64 {
        self.simulation_time
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// The event-mode head-end, if this runner drives events.
    pub fn olt(&self) -> Option<&Olt> {
        match &self.engine {
            Engine::Events(engine) => Some(&engine.olt),
            Engine::Cycles(_) => None,
        }
    }

    /// The cycle-mode scheduler, if this runner steps cycles.
    pub fn scheduler(&self) -> Option<&CycleScheduler> {
        match &self.engine {
            Engine::Cycles(scheduler) => Some(scheduler),
            Engine::Events(_) => None,
        }
    }

    /// Replace the DBA strategy mid-run.
    pub fn set_dba_algorithm(&mut self, strategy: Box<dyn DbaStrategy>) {
        match &mut self.engine {
            Engine::Cycles(scheduler) => scheduler.set_dba_algorithm(strategy),
            Engine::Events(engine) => engine.olt.set_dba_algorithm(strategy),
        }
    }

    /// Action vector passed to the strategy on every following cycle.
    pub fn set_action(&mut self, action: Option<Vec<f64>>) {
        match &mut self.engine {
            Engine::Cycles(scheduler) => scheduler.set_action(action),
            Engine::Events(engine) => engine.olt.set_action(action),
        }
    }

    /// Execute a single cycle. Cycles mode only.
    pub fn step(&mut self) -> Result<CycleResult, SimulationError> {
        if !matches!(self.engine, Engine::Cycles(_)) {
            return Err(SimulationError::WrongMode { expected: "cycles" });
        }
        self.notify_init();
        self.run_cycles(1)
            .pop()
            .ok_or(SimulationError::WrongMode { expected: "cycles" })
    }

    /// Advance the simulation by `length` and return the results so far.
    ///
    /// Per-event failures are logged, counted and skipped; they never end
    /// the run. Only a breached event-queue cap under
    /// [`OverflowPolicy::Abort`] stops a run early.
    pub fn run(&mut self, length: RunLength) -> Result<SimulationResults, SimulationError> {
        let cycle_duration = self.config.cycle_duration;
        let duration = match length {
            RunLength::Duration(d) if d.is_finite() && d >= 0.0 => d,
            RunLength::Duration(d) => return Err(SimulationError::InvalidDuration(d)),
            RunLength::Steps(n) => n as f64 * cycle_duration,
        };

        self.notify_init();
        info!(mode = %self.config.mode, duration, "Simulation started");

        match self.engine {
            Engine::Cycles(_) => {
                let steps = match length {
                    RunLength::Steps(n) => n,
                    RunLength::Duration(d) => (d / cycle_duration).floor() as u64,
                };
                self.run_cycles(steps);
            }
            Engine::Events(_) => {
                let target = self.simulation_time + duration;
                self.run_events(target);
            }
        }

        let results = self.results();
        info!(
            simulation_time = results.simulation_stats.simulation_time,
            cycles = results.simulation_stats.total_steps,
            events = results.simulation_stats.events_processed,
            delivered = results.simulation_stats.successful_requests,
            aborted = results.summary.aborted,
            "Simulation finished"
        );
        if let Some(observer) = self.observer.as_mut() {
            observer.on_simulation_end(&results);
        }
        Ok(results)
    }

    fn notify_init(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        if let Some(observer) = self.observer.as_mut() {
            observer.on_init();
        }
    }

    fn run_cycles(&mut self, steps: u64) -> Vec<CycleResult> {
        let Engine::Cycles(scheduler) = &mut self.engine else {
            return Vec::new();
        };
        // Only the single-step API keeps results around
        let keep = steps == 1;
        let mut kept = Vec::new();

        for _ in 0..steps {
            let cycle_start = scheduler.clock();
            let cycle_number = scheduler.cycles().cycles_issued();
            if let Some(observer) = self.observer.as_mut() {
                observer.on_cycle_start(cycle_number, cycle_start);
            }

            let result = scheduler.step(&mut self.metrics);
            self.simulation_time = scheduler.clock();

            if self.metrics.snapshot_due(cycle_start) {
                let levels = cycle_buffer_levels(scheduler.nodes());
                self.metrics.record_snapshot(cycle_start, levels, 0);
            }
            if let Some(observer) = self.observer.as_mut() {
                observer.on_cycle_end(&result);
            }
            if keep {
                kept.push(result);
            }
        }
        kept
    }

    fn run_events(&mut self, target: f64) {
        let Engine::Events(engine) = &mut self.engine else {
            return;
        };
        let limits = self.config.limits;

        loop {
            let next = engine.queue.peek_time();
            if next > target {
                break;
            }

            if limits.check_interval > 0
                && self.counters.events_processed % limits.check_interval == 0
                && !check_queue_limit(&mut self.counters, &limits, engine.queue.len())
            {
                break;
            }

            if let Err(err) = engine.olt.poll_if_due(&mut engine.onus, &mut engine.queue, next) {
                self.counters.faults += 1;
                warn!(time = next, error = %err, "Polling cycle failed");
            }

            let Some(event) = engine.queue.pop_next() else {
                break;
            };
            let now = event.timestamp;
            self.simulation_time = now;
            if let Err(err) = process_event(engine, &mut self.metrics, event) {
                self.counters.faults += 1;
                warn!(time = now, error = %err, "Event processing failed, skipping event");
            }
            self.counters.events_processed += 1;

            if self.metrics.snapshot_due(now) {
                let levels = event_buffer_levels(&engine.onus);
                self.metrics.record_snapshot(now, levels, engine.queue.len());
            }
        }

        if self.counters.abort_reason.is_none() {
            // Cycles between the last event and the target still run
            if let Err(err) = engine.olt.poll_if_due(&mut engine.onus, &mut engine.queue, target) {
                self.counters.faults += 1;
                warn!(time = target, error = %err, "Polling cycle failed");
            }
            self.simulation_time = self.simulation_time.max(target);
        }
    }

    /// Results of everything run so far.
    pub fn results(&self) -> SimulationResults {
        let mut summary = RunSummary {
            mode: self.config.mode,
            dba: self.config.dba.clone(),
            seed: self.config.seed,
            events_processed: self.counters.events_processed,
            faults: self.counters.faults,
            warnings: self.counters.warnings,
            aborted: self.counters.abort_reason.is_some(),
            abort_reason: self.counters.abort_reason.clone(),
            metric_evictions: self.metrics.storage().evictions,
            samples_evicted: self.metrics.storage().samples_evicted,
            snapshots_evicted: self.metrics.storage().snapshots_evicted,
            ..Default::default()
        };

        let total_requests;
        let olt_stats;
        let link_stats;
        let node_stats: Vec<NodeStatistics>;
        match &self.engine {
            Engine::Events(engine) => {
                total_requests = engine.onus.iter().map(|o| o.stats().packets_generated).sum();
                summary.units_dropped = engine.onus.iter().map(|o| o.stats().packets_dropped).sum();
                summary.cycles_executed = engine.olt.stats().cycles_executed;
                summary.events_remaining = engine.queue.len();
                olt_stats = Some(engine.olt.stats());
                link_stats = engine.olt.channel().stats();
                node_stats = engine
                    .onus
                    .iter()
                    .map(|onu| NodeStatistics {
                        node_id: onu.id(),
                        sla_mbps: onu.profile().sla_mbps,
                        counters: NodeCounters::Events {
                            stats: onu.stats(),
                            queues: onu.queue_stats(),
                        },
                    })
                    .collect();
            }
            Engine::Cycles(scheduler) => {
                let nodes = scheduler.nodes();
                total_requests = nodes.iter().map(|n| n.stats().requests_generated).sum();
                summary.units_dropped = nodes.iter().map(|n| n.stats().requests_lost).sum();
                summary.cycles_executed = scheduler.stats().cycles_executed;
                summary.fragments = scheduler.stats().fragments;
                summary.faults += scheduler.stats().faults;
                olt_stats = None;
                link_stats = scheduler.channel().stats();
                node_stats = nodes
                    .iter()
                    .map(|node| NodeStatistics {
                        node_id: node.id(),
                        sla_mbps: node.profile().sla_mbps,
                        counters: NodeCounters::Cycles {
                            stats: node.stats(),
                            buffer: node.buffer_stats(),
                        },
                    })
                    .collect();
            }
        }

        let successful_requests = self.metrics.delivered();
        let simulation_stats = SimulationStats {
            total_steps: summary.cycles_executed,
            simulation_time: self.simulation_time,
            total_requests,
            successful_requests,
            success_rate: successful_requests as f64 / total_requests.max(1) as f64 * 100.0,
            events_processed: self.counters.events_processed,
        };

        SimulationResults {
            simulation_stats,
            performance_metrics: self.metrics.performance(self.simulation_time),
            episode_metrics: self.metrics.episode(),
            summary,
            olt_stats,
            link_stats,
            node_stats,
        }
    }
}

fn process_event(
    engine: &mut EventEngine,
    metrics: &mut MetricsCollector,
    event: Event,
) -> Result<(), SimulationError> {
    match event.payload {
        EventPayload::PacketGenerated => {
            let onu = engine
                .onus
                .get_mut(event.node_id.index())
                .ok_or(SimulationError::UnknownNode(event.node_id))?;
            onu.on_packet_generated(&mut engine.queue, event.timestamp)?;
        }
        EventPayload::TransmissionComplete(record) => {
            engine.olt.handle_completion(&record);
            metrics.record_completion(event.timestamp, &record);
        }
    }
    Ok(())
}

/// Returns false when the run must stop.
fn check_queue_limit(counters: &mut RunCounters, limits: &ResourceLimits, queued: usize) -> bool {
    if queued <= limits.max_queued_events {
        counters.over_queue_limit = false;
        return true;
    }
    match limits.overflow_policy {
        OverflowPolicy::Abort => {
            let reason = format!(
                "event queue holds {queued} events, limit is {}",
                limits.max_queued_events
            );
            warn!(queued, limit = limits.max_queued_events, "Event queue limit breached, aborting run");
            counters.abort_reason = Some(reason);
            false
        }
        OverflowPolicy::Continue => {
            if !counters.over_queue_limit {
                counters.warnings += 1;
                warn!(queued, limit = limits.max_queued_events, "Event queue limit breached, continuing");
            }
            counters.over_queue_limit = true;
            true
        }
    }
}

fn event_buffer_levels(onus: &[Onu]) -> Vec<NodeBufferLevel> {
    onus.iter()
        .map(|onu| NodeBufferLevel {
            node_id: onu.id(),
            used_mb: bytes_to_mb(onu.buffered_bytes()),
            utilization_percent: onu.buffer_occupancy() * 100.0,
        })
        .collect()
}

fn cycle_buffer_levels(nodes: &[CycleOnu]) -> Vec<NodeBufferLevel> {
    nodes
        .iter()
        .map(|node| NodeBufferLevel {
            node_id: node.id(),
            used_mb: node.buffer().requests().iter().map(Request::total_traffic_mb).sum(),
            utilization_percent: node.buffer_occupancy() * 100.0,
        })
        .collect()
}
