//! Hooks for watching a run from outside.

use crate::SimulationResults;
use ponsim_types::CycleResult;

/// Receives callbacks while a [`SimulationRunner`](crate::SimulationRunner)
/// steps through cycles. Every method defaults to doing nothing.
///
/// In events mode only `on_init` and `on_simulation_end` fire, since cycles
/// run inline ahead of events rather than as steps.
pub trait CycleObserver {
    fn on_init(&mut self) {}

    fn on_cycle_start(&mut self, _cycle_number: u64, _cycle_time: f64) {}

    fn on_cycle_end(&mut self, _result: &CycleResult) {}

    fn on_simulation_end(&mut self, _results: &SimulationResults) {}
}
