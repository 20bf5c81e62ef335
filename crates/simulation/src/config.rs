//! Run configuration.

use crate::SimulationError;
use ponsim_core::{PhaseFractions, DEFAULT_CYCLE_DURATION, DEFAULT_SLOT_LOG_CAPACITY};
use ponsim_dba::DbaOptions;
use ponsim_node::{FragmentPolicy, TrafficProfile};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, EnumVariantNames};

/// Default upstream capacity in Mbps.
pub const DEFAULT_CAPACITY_MBPS: f64 = 1024.0;

/// Default guard interval between consecutive grants: 2 microseconds.
pub const DEFAULT_GUARD_TIME: f64 = 2e-6;

/// Default spacing of buffer and queue-length snapshots.
pub const DEFAULT_SAMPLE_INTERVAL: f64 = 0.1;

/// How the simulation clock advances.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
    EnumVariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SimulationMode {
    /// One fixed-length polling cycle per step, no event queue.
    Cycles,
    /// Discrete events drained in timestamp order.
    #[default]
    Events,
}

/// What the event loop does when the queued-event cap is breached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Stop the run and record why.
    #[default]
    Abort,
    /// Keep running and record a warning.
    Continue,
}

/// Soft caps on memory held during a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_queued_events: usize,
    /// Cap on stored delay and throughput samples; the oldest half is
    /// evicted when it is reached.
    pub max_metric_samples: usize,
    pub max_buffer_history: usize,
    /// Events processed between two limit checks.
    pub check_interval: u64,
    pub overflow_policy: OverflowPolicy,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_queued_events: 1_000_000,
            max_metric_samples: 100_000,
            max_buffer_history: 50_000,
            check_interval: 1_000,
            overflow_policy: OverflowPolicy::Abort,
        }
    }
}

/// Everything needed to build a [`SimulationRunner`](crate::SimulationRunner).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub mode: SimulationMode,
    /// One profile per node; node ids follow the vector order.
    pub profiles: Vec<TrafficProfile>,
    pub capacity_mbps: f64,
    pub guard_time: f64,
    pub cycle_duration: f64,
    pub phase_fractions: PhaseFractions,
    pub dba: String,
    pub dba_options: DbaOptions,
    /// Master seed; every node derives its own stream from it.
    pub seed: u64,
    /// Cycle mode only.
    pub fragment_policy: FragmentPolicy,
    pub sample_interval: f64,
    pub slot_log_capacity: usize,
    pub limits: ResourceLimits,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mode: SimulationMode::default(),
            profiles: Vec::new(),
            capacity_mbps: DEFAULT_CAPACITY_MBPS,
            guard_time: DEFAULT_GUARD_TIME,
            cycle_duration: DEFAULT_CYCLE_DURATION,
            phase_fractions: PhaseFractions::default(),
            dba: "fcfs".to_string(),
            dba_options: DbaOptions::default(),
            seed: 12345,
            fragment_policy: FragmentPolicy::default(),
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            slot_log_capacity: DEFAULT_SLOT_LOG_CAPACITY,
            limits: ResourceLimits::default(),
        }
    }
}

impl SimulationConfig {
    /// Create a configuration for `mode` with the given node profiles.
    pub fn new(mode: SimulationMode, profiles: Vec<TrafficProfile>) -> Self {
        Self {
            mode,
            profiles,
            ..Default::default()
        }
    }

    pub fn with_capacity_mbps(mut self, capacity_mbps: f64) -> Self {
        self.capacity_mbps = capacity_mbps;
        self
    }

    pub fn with_guard_time(mut self, guard_time: f64) -> Self {
        self.guard_time = guard_time;
        self
    }

    pub fn with_cycle_duration(mut self, cycle_duration: f64) -> Self {
        self.cycle_duration = cycle_duration;
        self
    }

    pub fn with_phase_fractions(mut self, phases: PhaseFractions) -> Self {
        self.phase_fractions = phases;
        self
    }

    /// Select the DBA strategy by registry name.
    pub fn with_dba(mut self, name: impl Into<String>) -> Self {
        self.dba = name.into();
        self
    }

    pub fn with_dba_options(mut self, options: DbaOptions) -> Self {
        self.dba_options = options;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_fragment_policy(mut self, policy: FragmentPolicy) -> Self {
        self.fragment_policy = policy;
        self
    }

    pub fn with_sample_interval(mut self, interval: f64) -> Self {
        self.sample_interval = interval;
        self
    }

    pub fn with_slot_log_capacity(mut self, capacity: usize) -> Self {
        self.slot_log_capacity = capacity;
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn num_nodes(&self) -> usize {
        self.profiles.len()
    }

    /// Check the parameters the runner does not validate itself.
    ///
    /// Capacity, cycle and phase parameters are checked by the clock
    /// primitives, profiles by the nodes and the DBA name by the registry,
    /// all when the runner is built.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.profiles.is_empty() {
            return Err(SimulationError::NoNodes);
        }
        if !(self.guard_time.is_finite() && self.guard_time >= 0.0) {
            return Err(SimulationError::InvalidGuardTime(self.guard_time));
        }
        if !(self.sample_interval.is_finite() && self.sample_interval > 0.0) {
            return Err(SimulationError::InvalidSampleInterval(self.sample_interval));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.capacity_mbps, 1024.0);
        assert_eq!(config.guard_time, 2e-6);
        assert_eq!(config.cycle_duration, 125e-6);
        assert_eq!(config.dba, "fcfs");
        assert_eq!(config.limits.max_queued_events, 1_000_000);
        assert_eq!(config.limits.overflow_policy, OverflowPolicy::Abort);
    }

    #[test]
    fn test_validate() {
        assert_eq!(
            SimulationConfig::default().validate(),
            Err(SimulationError::NoNodes)
        );

        let config = SimulationConfig::new(SimulationMode::Cycles, vec![TrafficProfile::default()]);
        assert!(config.validate().is_ok());
        assert!(config.clone().with_guard_time(-1.0).validate().is_err());
        assert!(config.with_sample_interval(0.0).validate().is_err());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(SimulationMode::from_str("cycles").unwrap(), SimulationMode::Cycles);
        assert_eq!(SimulationMode::from_str("EVENTS").unwrap(), SimulationMode::Events);
        assert!(SimulationMode::from_str("hybrid").is_err());
        assert_eq!(SimulationMode::Cycles.to_string(), "cycles");
    }
}
