//! Strategy lookup by name.

use crate::discipline::{GatedStrategy, IpactStrategy, LimitedStrategy, DEFAULT_MAX_GRANT_BYTES};
use crate::fcfs::FcfsStrategy;
use crate::priority::{PriorityStrategy, DEFAULT_STARVATION_THRESHOLD_MS};
use crate::rl::RlStrategy;
use crate::strategy::DbaStrategy;
use crate::DbaError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString, EnumVariantNames, VariantNames};

/// Every strategy the registry can build.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumVariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StrategyKind {
    Fcfs,
    Priority,
    Rl,
    Limited,
    Gated,
    Ipact,
}

/// Tunables shared by the strategies that have any.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DbaOptions {
    pub starvation_threshold_ms: f64,
    pub max_grant_bytes: u64,
    /// IPACT only.
    pub min_grant_bytes: u64,
    /// Cap for gated service; `None` grants the full report.
    pub gated_limit_bytes: Option<u64>,
}

impl Default for DbaOptions {
    fn default() -> Self {
        Self {
            starvation_threshold_ms: DEFAULT_STARVATION_THRESHOLD_MS,
            max_grant_bytes: DEFAULT_MAX_GRANT_BYTES,
            min_grant_bytes: 0,
            gated_limit_bytes: None,
        }
    }
}

/// Names accepted by [`build_strategy`].
pub fn available_strategies() -> &'static [&'static str] {
    StrategyKind::VARIANTS
}

/// Resolve a strategy name, failing fast on anything unknown.
pub fn parse_strategy(name: &str) -> Result<StrategyKind, DbaError> {
    StrategyKind::from_str(name.trim()).map_err(|_| DbaError::UnknownStrategy {
        name: name.to_string(),
        available: available_strategies().join(", "),
    })
}

/// Build a strategy by name with default options.
pub fn build_strategy(name: &str) -> Result<Box<dyn DbaStrategy>, DbaError> {
    build_strategy_with(parse_strategy(name)?, &DbaOptions::default())
}

/// Build a strategy of `kind` configured by `options`.
pub fn build_strategy_with(
    kind: StrategyKind,
    options: &DbaOptions,
) -> Result<Box<dyn DbaStrategy>, DbaError> {
    let strategy: Box<dyn DbaStrategy> = match kind {
        StrategyKind::Fcfs => Box::new(FcfsStrategy::new()),
        StrategyKind::Priority => Box::new(
            PriorityStrategy::new().with_starvation_threshold_ms(options.starvation_threshold_ms)?,
        ),
        StrategyKind::Rl => Box::new(RlStrategy::new()),
        StrategyKind::Limited => {
            Box::new(LimitedStrategy::new().with_max_grant_bytes(options.max_grant_bytes)?)
        }
        StrategyKind::Gated => match options.gated_limit_bytes {
            Some(limit) => Box::new(GatedStrategy::new().with_max_grant_bytes(limit)?),
            None => Box::new(GatedStrategy::new()),
        },
        StrategyKind::Ipact => Box::new(
            IpactStrategy::new()
                .with_max_grant_bytes(options.max_grant_bytes)?
                .with_min_grant_bytes(options.min_grant_bytes),
        ),
    };
    Ok(strategy)
}
