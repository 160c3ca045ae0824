//! Reconnect delay calculation.
//!
//! The exponential part is deterministic and separately testable; jitter
//! is applied on top by [`reconnect_delay`].

use std::time::Duration;

use rand::Rng;

use interpmon_config::StreamConfig;

/// Deterministic exponential delay for a 1-based attempt number:
/// `min(base * 2^(attempt-1), max_delay)`.
pub fn base_delay_ms(attempt: u32, base_ms: u64, max_ms: u64) -> u64 {
    // Shift saturates well before u64 overflow for any realistic attempt.
    let exp = attempt.saturating_sub(1).min(32);
    base_ms.saturating_mul(1u64 << exp).min(max_ms)
}

/// Delay before reconnect attempt `attempt` (1-based), with symmetric
/// jitter: `base_delay * (1 ± jitter)`.
pub fn reconnect_delay(attempt: u32, cfg: &StreamConfig) -> Duration {
    let base = base_delay_ms(attempt, cfg.base_delay_ms, cfg.max_delay_ms) as f64;
    let factor = 1.0 + rand::rng().random_range(-cfg.jitter..=cfg.jitter);
    Duration::from_millis((base * factor).max(0.0) as u64)
}
