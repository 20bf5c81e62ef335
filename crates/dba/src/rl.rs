//! Externally driven allocation.
//!
//! The learning side lives outside this crate. All it has to provide is an
//! [`ActionPolicy`] that turns demand into one weight per requesting node.

use crate::strategy::{equal_share, BandwidthMap, DbaStrategy};
use tracing::{debug, warn};

/// Source of action vectors, e.g. a trained agent behind some runtime.
pub trait ActionPolicy: Send {
    /// One non-negative weight per node in `demand`, in ascending id order.
    /// `None` means "no opinion this round".
    fn action(&self, demand: &BandwidthMap, capacity: f64) -> Option<Vec<f64>>;
}

/// A fixed action vector, mostly useful for tests and replays.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticPolicy(pub Vec<f64>);

impl ActionPolicy for StaticPolicy {
    fn action(&self, _demand: &BandwidthMap, _capacity: f64) -> Option<Vec<f64>> {
        Some(self.0.clone())
    }
}

/// Splits capacity by weights from an external policy.
///
/// An explicit hint passed to `allocate_bandwidth` wins over the injected
/// policy. Missing or malformed actions fall back to an equal share.
#[derive(Default)]
pub struct RlStrategy {
    policy: Option<Box<dyn ActionPolicy>>,
}

impl RlStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: impl ActionPolicy + 'static) -> Self {
        self.policy = Some(Box::new(policy));
        self
    }

    pub fn set_policy(&mut self, policy: Box<dyn ActionPolicy>) {
        self.policy = Some(policy);
    }

    pub fn has_policy(&self) -> bool {
        self.policy.is_some()
    }
}

impl std::fmt::Debug for RlStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RlStrategy")
            .field("has_policy", &self.has_policy())
            .finish()
    }
}

fn is_well_formed(action: &[f64], nodes: usize) -> bool {
    action.len() == nodes && action.iter().all(|w| w.is_finite() && *w >= 0.0)
}

impl DbaStrategy for RlStrategy {
    fn name(&self) -> &'static str {
        "RL-DBA"
    }

    fn allocate_bandwidth(
        &self,
        demand: &BandwidthMap,
        capacity: f64,
        hint: Option<&[f64]>,
    ) -> BandwidthMap {
        let action = match hint {
            Some(weights) => Some(weights.to_vec()),
            None => self
                .policy
                .as_ref()
                .and_then(|policy| policy.action(demand, capacity)),
        };

        let Some(action) = action else {
            debug!(nodes = demand.len(), "No action available, using equal share");
            return equal_share(demand, capacity);
        };

        if !is_well_formed(&action, demand.len()) {
            warn!(
                action_len = action.len(),
                nodes = demand.len(),
                "Action format not recognized, using equal share"
            );
            return equal_share(demand, capacity);
        }

        let sum: f64 = action.iter().sum();
        let norm = if sum > 0.0 { sum } else { 1.0 };

        demand
            .iter()
            .zip(action.iter())
            .map(|((node, mb), weight)| (*node, mb.min(weight / norm * capacity)))
            .collect()
    }
}
