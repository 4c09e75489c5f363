//! Failure tracking and the multiplicative backoff applied to transient
//! fetch/parse failures.

/// Consecutive failures at which a feed is permanently removed.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Backed-off intervals never exceed 24 hours.
pub const MAX_BACKOFF_INTERVAL_MS: i64 = 86_400_000;

/// Per-feed runtime failure state; evicted on the first successful cycle.
/// The original refresh is not restored automatically after eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureState {
    pub consecutive_failures: u32,
    pub original_refresh_ms: i64,
}

/// `min(original × 2^(failures − 1), 24h)`, saturating on overflow.
pub fn backoff_interval_ms(original_refresh_ms: i64, consecutive_failures: u32) -> i64 {
    let doublings = consecutive_failures.saturating_sub(1).min(62);
    original_refresh_ms
        .saturating_mul(1i64 << doublings)
        .min(MAX_BACKOFF_INTERVAL_MS)
}
