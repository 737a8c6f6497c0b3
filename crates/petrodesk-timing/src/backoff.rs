//! Exponential backoff with jitter.
//!
//! When several tabs are woken by the same `REFRESH_IN_PROGRESS` signal they
//! would otherwise retry in lockstep. Each delay is spread by ±25% so the
//! retries land at different instants (thundering-herd mitigation, same idea
//! as the scheduler's initial jitter).

use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// Backoff parameters for refresh retries.
///
/// ```text
/// base   = retry_after * 1000 ms   (or base_delay when no hint)
/// capped = min(base * 2^attempt, max_delay)
/// delay  = floor(capped + capped * jitter_ratio * U(-1, 1))
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Base delay when the server gave no retry hint. Default: 500 ms.
    pub base_delay: Duration,
    /// Upper bound on the pre-jitter delay. Default: 5 s.
    pub max_delay: Duration,
    /// How many retries follow the first attempt. Default: 3.
    pub max_retries: u32,
    /// Jitter as a fraction of the capped delay (0.0–1.0). Default: 0.25.
    pub jitter_ratio: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(5_000),
            max_retries: 3,
            jitter_ratio: 0.25,
        }
    }
}

impl BackoffPolicy {
    /// Clamp out-of-range values so the policy is safe to use.
    ///
    /// - `jitter_ratio` clamped to `0.0..=1.0` (NaN becomes 0).
    /// - `base_delay` forced ≤ `max_delay`.
    pub fn validated(mut self) -> Self {
        if self.jitter_ratio.is_nan() {
            self.jitter_ratio = 0.0;
        }
        self.jitter_ratio = self.jitter_ratio.clamp(0.0, 1.0);
        if self.base_delay > self.max_delay {
            warn!(
                base_ms = self.base_delay.as_millis() as u64,
                max_ms = self.max_delay.as_millis() as u64,
                "backoff base delay exceeds max delay, clamping"
            );
            self.base_delay = self.max_delay;
        }
        self
    }

    /// The delay before jitter: `min(base * 2^attempt, max_delay)`.
    ///
    /// `retry_after_secs` is the server's hint; when present it replaces
    /// `base_delay` as the base.
    pub fn capped(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        let base_ms = match retry_after_secs {
            Some(secs) => secs.saturating_mul(1_000),
            None => self.base_delay.as_millis() as u64,
        };
        let exp_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
        let max_ms = self.max_delay.as_millis() as u64;
        Duration::from_millis(exp_ms.min(max_ms))
    }

    /// The jittered delay for `attempt` using the thread-local RNG.
    pub fn delay(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        self.delay_with_rng(attempt, retry_after_secs, &mut rand::rng())
    }

    /// The jittered delay for `attempt`, drawing jitter from `rng`.
    ///
    /// Always within `[capped * (1 - jitter_ratio), capped * (1 + jitter_ratio)]`.
    pub fn delay_with_rng<R: Rng>(
        &self,
        attempt: u32,
        retry_after_secs: Option<u64>,
        rng: &mut R,
    ) -> Duration {
        let capped_ms = self.capped(attempt, retry_after_secs).as_millis() as f64;
        let factor: f64 = if self.jitter_ratio > 0.0 {
            rng.random_range(-1.0..=1.0)
        } else {
            0.0
        };
        let jitter_ms = capped_ms * self.jitter_ratio * factor;
        Duration::from_millis((capped_ms + jitter_ms).max(0.0).floor() as u64)
    }
}
