//! Fixed-period polling cycles.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default polling cycle: 125 microseconds.
pub const DEFAULT_CYCLE_DURATION: f64 = 125e-6;

/// Cycle start times kept for inspection.
const MAX_RECORDED_STARTS: usize = 10_000;

const FRACTION_TOLERANCE: f64 = 1e-9;

/// How a cycle is split between reporting, allocation and transmission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseFractions {
    pub report: f64,
    pub allocate: f64,
    pub transmit: f64,
}

impl PhaseFractions {
    pub fn new(report: f64, allocate: f64, transmit: f64) -> Result<Self, CoreError> {
        let fractions = Self {
            report,
            allocate,
            transmit,
        };
        fractions.validate()?;
        Ok(fractions)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let parts = [self.report, self.allocate, self.transmit];
        let valid = parts.iter().all(|p| p.is_finite() && *p >= 0.0)
            && (parts.iter().sum::<f64>() - 1.0).abs() < FRACTION_TOLERANCE;
        if valid {
            Ok(())
        } else {
            Err(CoreError::InvalidPhaseFractions {
                report: self.report,
                allocate: self.allocate,
                transmit: self.transmit,
            })
        }
    }
}

impl Default for PhaseFractions {
    fn default() -> Self {
        Self {
            report: 0.32,
            allocate: 0.08,
            transmit: 0.60,
        }
    }
}

/// A half-open window `[start, end)` on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseWindow {
    pub start: f64,
    pub end: f64,
}

impl PhaseWindow {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }
}

/// Absolute phase windows of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CyclePhases {
    pub report: PhaseWindow,
    pub allocate: PhaseWindow,
    pub transmit: PhaseWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleStatistics {
    pub total_cycles: u64,
    pub cycle_duration: f64,
    pub cycles_per_second: f64,
    /// Start of the most recently issued cycle, zero before the first.
    pub last_cycle_time: f64,
}

/// Hands out cycle boundaries on a strictly periodic grid.
///
/// The n-th call to [`next_cycle_start`](Self::next_cycle_start) returns
/// `n * cycle_duration` whatever time the caller observed, so a caller that
/// falls behind catches up cycle by cycle instead of re-synchronising.
#[derive(Debug, Clone)]
pub struct CycleTimeManager {
    cycle_duration: f64,
    phases: PhaseFractions,
    issued: u64,
    starts: VecDeque<f64>,
}

impl Default for CycleTimeManager {
    fn default() -> Self {
        Self {
            cycle_duration: DEFAULT_CYCLE_DURATION,
            phases: PhaseFractions::default(),
            issued: 0,
            starts: VecDeque::new(),
        }
    }
}

impl CycleTimeManager {
    pub fn new(cycle_duration: f64) -> Result<Self, CoreError> {
        if !(cycle_duration.is_finite() && cycle_duration > 0.0) {
            return Err(CoreError::InvalidCycleDuration(cycle_duration));
        }
        Ok(Self {
            cycle_duration,
            ..Default::default()
        })
    }

    pub fn with_phase_fractions(mut self, phases: PhaseFractions) -> Result<Self, CoreError> {
        phases.validate()?;
        self.phases = phases;
        Ok(self)
    }

    pub fn cycle_duration(&self) -> f64 {
        self.cycle_duration
    }

    pub fn phase_fractions(&self) -> PhaseFractions {
        self.phases
    }

    /// Start of the next cycle on the fixed grid. The argument is ignored.
    pub fn next_cycle_start(&mut self, _now: f64) -> f64 {
        self.issued += 1;
        let start = self.issued as f64 * self.cycle_duration;
        if self.starts.len() >= MAX_RECORDED_STARTS {
            self.starts.pop_front();
        }
        self.starts.push_back(start);
        start
    }

    /// Phase windows of the cycle beginning at `cycle_start`.
    pub fn phases(&self, cycle_start: f64) -> CyclePhases {
        let report_end = cycle_start + self.phases.report * self.cycle_duration;
        let allocate_end = report_end + self.phases.allocate * self.cycle_duration;
        CyclePhases {
            report: PhaseWindow {
                start: cycle_start,
                end: report_end,
            },
            allocate: PhaseWindow {
                start: report_end,
                end: allocate_end,
            },
            transmit: PhaseWindow {
                start: allocate_end,
                end: cycle_start + self.cycle_duration,
            },
        }
    }

    /// Length of the transmission phase.
    pub fn transmit_window(&self) -> f64 {
        self.phases.transmit * self.cycle_duration
    }

    /// Index of the cycle containing `t`.
    pub fn cycle_number_at(&self, t: f64) -> u64 {
        if t <= 0.0 {
            return 0;
        }
        (t / self.cycle_duration).floor() as u64
    }

    pub fn is_in_transmission_phase(&self, t: f64) -> bool {
        let start = self.cycle_number_at(t) as f64 * self.cycle_duration;
        self.phases(start).transmit.contains(t)
    }

    /// Cycles issued so far.
    pub fn cycles_issued(&self) -> u64 {
        self.issued
    }

    /// Recently issued cycle starts, oldest first.
    pub fn recorded_starts(&self) -> &VecDeque<f64> {
        &self.starts
    }

    pub fn statistics(&self) -> CycleStatistics {
        CycleStatistics {
            total_cycles: self.issued,
            cycle_duration: self.cycle_duration,
            cycles_per_second: 1.0 / self.cycle_duration,
            last_cycle_time: self.starts.back().copied().unwrap_or(0.0),
        }
    }

    pub fn reset(&mut self) {
        self.issued = 0;
        self.starts.clear();
    }
}
