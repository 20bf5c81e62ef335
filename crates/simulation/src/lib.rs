//! Deterministic PON simulation runner.
//!
//! Drives a passive optical network where one head-end (OLT) polls many
//! nodes (ONUs) and hands out upstream transmission time with a pluggable
//! DBA strategy. Given the same seed, it produces identical results every
//! run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  SimulationRunner                       │
//! │                                                         │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │  events: EventQueue (BTreeMap<EventKey, Event>)    │ │
//! │  │          ordered by time, then sequence            │ │
//! │  │  cycles: CycleScheduler on a fixed time grid       │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │  Olt / CycleScheduler: report ─► allocate ─► grant │ │
//! │  │  DbaStrategy decides how much and in what order    │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │  Channel: non-overlapping slots ─► completions     │ │
//! │  │  MetricsCollector: bounded samples ─► results      │ │
//! │  └────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod config;
mod cycle_scheduler;
mod error;
mod metrics;
mod observer;
mod olt;
mod results;
mod runner;

pub use config::{
    OverflowPolicy, ResourceLimits, SimulationConfig, SimulationMode, DEFAULT_CAPACITY_MBPS,
    DEFAULT_GUARD_TIME, DEFAULT_SAMPLE_INTERVAL,
};
pub use cycle_scheduler::{CycleScheduler, SchedulerStats};
pub use error::SimulationError;
pub use metrics::{
    BufferSnapshot, DelaySample, MetricsCollector, NodeBufferLevel, QueueLengthSample,
    StorageStats, ThroughputSample, WindowThroughput,
};
pub use observer::CycleObserver;
pub use olt::{Olt, OltState, OltStats};
pub use results::{
    EpisodeMetrics, NodeCounters, NodeStatistics, PerformanceMetrics, RunSummary,
    SimulationResults, SimulationStats,
};
pub use runner::{RunLength, SimulationRunner};
