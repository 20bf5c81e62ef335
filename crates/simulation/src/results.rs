//! The result shape shared by both stepping modes.

use crate::config::SimulationMode;
use crate::metrics::{
    BufferSnapshot, DelaySample, QueueLengthSample, ThroughputSample, WindowThroughput,
};
use crate::olt::OltStats;
use ponsim_core::LinkStats;
use ponsim_node::{BufferStats, CycleOnuStats, OnuStats, QueueStats};
use ponsim_types::{ClassMap, NodeId};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SimulationStats {
    /// Polling cycles executed.
    pub total_steps: u64,
    /// Simulated seconds covered by the run.
    pub simulation_time: f64,
    /// Packets or requests generated by the nodes.
    pub total_requests: u64,
    /// Packets or requests delivered.
    pub successful_requests: u64,
    /// `successful / total`, in percent.
    pub success_rate: f64,
    pub events_processed: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    /// Seconds.
    pub mean_delay: f64,
    pub p95_delay: f64,
    pub jitter_ipdv_mean: f64,
    /// Megabytes per second over the whole run.
    pub mean_throughput: f64,
    /// Mean per-cycle utilization of the transmission phase, in percent.
    pub network_utilization: f64,
    /// Megabytes delivered.
    pub total_capacity_served: f64,
    pub jain_fairness_per_node: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EpisodeMetrics {
    pub delays: Vec<DelaySample>,
    pub throughputs: Vec<ThroughputSample>,
    pub throughput_time_series: Vec<WindowThroughput>,
    pub buffer_levels_history: Vec<BufferSnapshot>,
    pub event_queue_history: Vec<QueueLengthSample>,
    pub total_transmitted_mb: f64,
}

/// Run bookkeeping: how the run went, not what it measured.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub mode: SimulationMode,
    pub dba: String,
    pub seed: u64,
    pub events_processed: u64,
    pub events_remaining: usize,
    pub cycles_executed: u64,
    /// Events or requests whose processing failed and was skipped.
    pub faults: u64,
    /// Resource limits breached without stopping the run.
    pub warnings: u64,
    pub aborted: bool,
    pub abort_reason: Option<String>,
    pub metric_evictions: u64,
    pub samples_evicted: u64,
    pub snapshots_evicted: u64,
    /// Packets or requests dropped on full queues or buffers.
    pub units_dropped: u64,
    /// Requests that did not fit their slot.
    pub fragments: u64,
}

/// Per-node counters for the mode that ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NodeCounters {
    Events {
        stats: OnuStats,
        queues: ClassMap<QueueStats>,
    },
    Cycles {
        stats: CycleOnuStats,
        buffer: BufferStats,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeStatistics {
    pub node_id: NodeId,
    pub sla_mbps: f64,
    #[serde(flatten)]
    pub counters: NodeCounters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResults {
    pub simulation_stats: SimulationStats,
    pub performance_metrics: PerformanceMetrics,
    pub episode_metrics: EpisodeMetrics,
    pub summary: RunSummary,
    /// Events mode only.
    pub olt_stats: Option<OltStats>,
    pub link_stats: LinkStats,
    pub node_stats: Vec<NodeStatistics>,
}
