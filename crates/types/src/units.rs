//! Size and rate conversions.
//!
//! Sizes are tracked in bytes on the node side and in megabytes (2^20 bytes)
//! on the allocation side. Rates are in megabits per second.

/// Bytes in one megabyte.
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Convert a byte count to megabytes.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB as f64
}

/// Convert megabytes to whole bytes, truncating any fractional byte.
///
/// Negative and non-finite inputs convert to zero.
pub fn mb_to_bytes(mb: f64) -> u64 {
    if mb.is_finite() && mb > 0.0 {
        (mb * BYTES_PER_MB as f64) as u64
    } else {
        0
    }
}

/// Megabytes carried per second by a link of `capacity_mbps`.
pub fn mbps_to_mb_per_sec(capacity_mbps: f64) -> f64 {
    capacity_mbps / 8.0
}
