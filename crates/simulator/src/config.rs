//! Configuration types for the simulator.

use crate::SimulatorError;
use ponsim_node::{FragmentPolicy, TrafficProfile, TrafficScenario};
use ponsim_simulation::{ResourceLimits, SimulationConfig, SimulationMode, DEFAULT_CAPACITY_MBPS};

/// SLA of the first ONU; each following ONU gets [`SLA_STEP_MBPS`] more.
pub const BASE_SLA_MBPS: f64 = 50.0;

pub const SLA_STEP_MBPS: f64 = 25.0;

/// Upper bound on any ONU's arrival rate, in arrivals per second.
pub const MAX_ARRIVAL_RATE: f64 = 50.0;

/// Gap between the first possible arrivals of consecutive ONUs.
pub const ARRIVAL_STAGGER: f64 = 1e-3;

/// Configuration for a batch of replicated runs.
#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    /// Number of ONUs on the tree.
    pub num_onus: usize,

    /// Traffic scenario preset name.
    pub scenario: String,

    pub mode: SimulationMode,

    /// DBA strategy name.
    pub dba: String,

    /// Upstream capacity in Mbps.
    pub capacity_mbps: f64,

    pub fragment_policy: FragmentPolicy,

    /// Seed of the first replication; the others derive theirs from it.
    pub seed: u64,

    /// Independent runs, executed in parallel.
    pub replications: usize,

    pub limits: ResourceLimits,
}

impl SimulatorConfig {
    /// Create a new simulator configuration.
    pub fn new(num_onus: usize, scenario: impl Into<String>) -> Self {
        Self {
            num_onus,
            scenario: scenario.into(),
            mode: SimulationMode::Events,
            dba: "fcfs".to_string(),
            capacity_mbps: DEFAULT_CAPACITY_MBPS,
            fragment_policy: FragmentPolicy::default(),
            seed: 12345,
            replications: 1,
            limits: ResourceLimits::default(),
        }
    }

    pub fn with_mode(mut self, mode: SimulationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_dba(mut self, dba: impl Into<String>) -> Self {
        self.dba = dba.into();
        self
    }

    pub fn with_capacity_mbps(mut self, capacity_mbps: f64) -> Self {
        self.capacity_mbps = capacity_mbps;
        self
    }

    pub fn with_fragment_policy(mut self, policy: FragmentPolicy) -> Self {
        self.fragment_policy = policy;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_replications(mut self, replications: usize) -> Self {
        self.replications = replications;
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// SLA of the ONU at `index`.
    pub fn sla_for(index: usize) -> f64 {
        BASE_SLA_MBPS + SLA_STEP_MBPS * index as f64
    }

    /// Check the settings that only the front end owns.
    pub fn validate(&self) -> Result<(), SimulatorError> {
        if self.num_onus == 0 {
            return Err(SimulatorError::NoOnus);
        }
        if self.replications == 0 {
            return Err(SimulatorError::NoReplications);
        }
        TrafficScenario::from_name(&self.scenario)?;
        Ok(())
    }

    /// One traffic profile per ONU, built from the scenario preset.
    pub fn build_profiles(&self) -> Result<Vec<TrafficProfile>, SimulatorError> {
        let scenario = TrafficScenario::from_name(&self.scenario)?;
        Ok((0..self.num_onus)
            .map(|i| {
                let sla = Self::sla_for(i);
                let rate = scenario.arrival_rate_for(sla).min(MAX_ARRIVAL_RATE);
                scenario
                    .profile_for(sla)
                    .with_arrival_rate(rate)
                    .with_start_offset(i as f64 * ARRIVAL_STAGGER)
            })
            .collect())
    }

    /// Convert to a [`SimulationConfig`] for one run with `seed`.
    pub fn to_simulation_config(&self, seed: u64) -> Result<SimulationConfig, SimulatorError> {
        self.validate()?;
        Ok(SimulationConfig::new(self.mode, self.build_profiles()?)
            .with_dba(self.dba.clone())
            .with_capacity_mbps(self.capacity_mbps)
            .with_fragment_policy(self.fragment_policy)
            .with_seed(seed)
            .with_limits(self.limits))
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self::new(4, "residential_medium")
    }
}
