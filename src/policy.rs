//! Retry budget and backoff delay calculation.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How many additional attempts are allowed after the first.
///
/// `Count(n)` permits `n + 1` total attempts. Negative counts are
/// representable so that misconfiguration surfaces as an explicit
/// [`crate::RetryError::NegativeRetries`] before the first attempt rather
/// than silently clamping. `Unlimited` relies on the time budget,
/// `should_retry`, or an abort to terminate the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Retries {
    Count(i64),
    Unlimited,
}

impl Default for Retries {
    fn default() -> Self {
        Retries::Count(10)
    }
}

impl Retries {
    /// Total attempts allowed, or `None` for an unbounded loop.
    pub(crate) fn max_attempts(self) -> Option<u64> {
        match self {
            Retries::Count(n) => Some(n.max(0) as u64 + 1),
            Retries::Unlimited => None,
        }
    }

    /// Budget remaining once `attempt` (1-based) has failed.
    pub(crate) fn left_after(self, attempt: u64) -> Retries {
        match self {
            Retries::Count(n) => Retries::Count(n.saturating_sub(attempt as i64 - 1)),
            Retries::Unlimited => Retries::Unlimited,
        }
    }
}

/// Exponential backoff parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Backoff {
    /// Multiplier base: the delay before attempt `n + 1` grows as
    /// `min_timeout * factor^(n-1)`.
    pub factor: f64,
    /// Base delay before the first retry. Floored at 1ms.
    pub min_timeout: Duration,
    /// Upper clamp on any single delay.
    pub max_timeout: Duration,
    /// Scale each delay by a fresh uniform sample from `[1, 2)` so
    /// simultaneous callers do not retry in lockstep.
    pub randomize: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            factor: 2.0,
            min_timeout: Duration::from_millis(1000),
            max_timeout: Duration::MAX,
            randomize: false,
        }
    }
}

impl Backoff {
    /// Delay to wait after `attempt` (1-based) has failed.
    ///
    /// Degenerate factors (zero, negative, below one) never push the result
    /// under `min_timeout`; they degrade to a constant `min_timeout` delay.
    /// `max_timeout` caps the result and wins over that floor.
    pub fn delay_for(&self, attempt: u64) -> Duration {
        let floor_ms = (self.min_timeout.as_millis() as u64).max(1);
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u64) as i32;
        let mut ms = floor_ms as f64 * self.factor.powi(exponent);
        if self.randomize {
            ms *= rand::rng().random_range(1.0..2.0);
        }
        let delay = if ms.is_finite() {
            // Saturating float-to-int cast; negative products land on the floor.
            Duration::from_millis((ms.round() as u64).max(floor_ms))
        } else {
            Duration::MAX
        };
        delay.min(self.max_timeout)
    }
}
