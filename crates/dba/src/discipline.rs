//! Classic polling service disciplines.
//!
//! All three visit requesting nodes in ascending id order and stop when the
//! capacity handed to them runs out.

use crate::strategy::{requesting_nodes, BandwidthMap, DbaStrategy};
use crate::DbaError;
use ponsim_types::{bytes_to_mb, units::BYTES_PER_MB};

/// Default per-cycle grant cap. Large enough for the biggest packet a
/// default traffic profile generates.
pub const DEFAULT_MAX_GRANT_BYTES: u64 = 128 * 1024;

fn grant_limit_mb(bytes: u64) -> Result<f64, DbaError> {
    if bytes == 0 {
        return Err(DbaError::InvalidGrantLimit(0.0));
    }
    Ok(bytes_to_mb(bytes))
}

fn serve_in_order(
    demand: &BandwidthMap,
    capacity: f64,
    size: impl Fn(f64) -> f64,
) -> BandwidthMap {
    let mut remaining = capacity.max(0.0);
    let mut grants = BandwidthMap::new();
    for (node, mb) in requesting_nodes(demand) {
        if remaining <= 0.0 {
            break;
        }
        let granted = size(mb).min(remaining);
        remaining -= granted;
        grants.insert(node, granted);
    }
    grants
}

/// Each node gets what it asked for, up to a fixed cap.
#[derive(Debug, Clone, Copy)]
pub struct LimitedStrategy {
    max_grant_mb: f64,
}

impl Default for LimitedStrategy {
    fn default() -> Self {
        Self {
            max_grant_mb: bytes_to_mb(DEFAULT_MAX_GRANT_BYTES),
        }
    }
}

impl LimitedStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_grant_bytes(mut self, bytes: u64) -> Result<Self, DbaError> {
        self.max_grant_mb = grant_limit_mb(bytes)?;
        Ok(self)
    }

    pub fn max_grant_bytes(&self) -> u64 {
        (self.max_grant_mb * BYTES_PER_MB as f64) as u64
    }
}

impl DbaStrategy for LimitedStrategy {
    fn name(&self) -> &'static str {
        "Limited"
    }

    fn allocate_bandwidth(
        &self,
        demand: &BandwidthMap,
        capacity: f64,
        _hint: Option<&[f64]>,
    ) -> BandwidthMap {
        serve_in_order(demand, capacity, |mb| mb.min(self.max_grant_mb))
    }
}

/// Each node gets exactly what it reported, optionally capped.
#[derive(Debug, Clone, Copy, Default)]
pub struct GatedStrategy {
    max_grant_mb: Option<f64>,
}

impl GatedStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_grant_bytes(mut self, bytes: u64) -> Result<Self, DbaError> {
        self.max_grant_mb = Some(grant_limit_mb(bytes)?);
        Ok(self)
    }
}

impl DbaStrategy for GatedStrategy {
    fn name(&self) -> &'static str {
        "Gated"
    }

    fn allocate_bandwidth(
        &self,
        demand: &BandwidthMap,
        capacity: f64,
        _hint: Option<&[f64]>,
    ) -> BandwidthMap {
        serve_in_order(demand, capacity, |mb| match self.max_grant_mb {
            Some(limit) => mb.min(limit),
            None => mb,
        })
    }
}

/// Interleaved polling with a grant cap and an optional floor.
///
/// The floor keeps nodes with tiny requests from waiting on a cap-sized
/// window; it may grant more than was asked.
#[derive(Debug, Clone, Copy)]
pub struct IpactStrategy {
    max_grant_mb: f64,
    min_grant_mb: f64,
}

impl Default for IpactStrategy {
    fn default() -> Self {
        Self {
            max_grant_mb: bytes_to_mb(DEFAULT_MAX_GRANT_BYTES),
            min_grant_mb: 0.0,
        }
    }
}

impl IpactStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_grant_bytes(mut self, bytes: u64) -> Result<Self, DbaError> {
        self.max_grant_mb = grant_limit_mb(bytes)?;
        Ok(self)
    }

    pub fn with_min_grant_bytes(mut self, bytes: u64) -> Self {
        self.min_grant_mb = bytes_to_mb(bytes);
        self
    }
}

impl DbaStrategy for IpactStrategy {
    fn name(&self) -> &'static str {
        "IPACT"
    }

    fn allocate_bandwidth(
        &self,
        demand: &BandwidthMap,
        capacity: f64,
        _hint: Option<&[f64]>,
    ) -> BandwidthMap {
        serve_in_order(demand, capacity, |mb| {
            mb.min(self.max_grant_mb).max(self.min_grant_mb)
        })
    }
}
