/// Reconnect backoff policy (SPEC_FULL.md §9 resolved open question, §11).
///
/// Exponential backoff with full jitter: `base * factor^attempt`, clamped to
/// `cap`, then a uniform random delay is drawn in `[0, clamped)`. Attempt `0`
/// is the first retry after an initial failure.
use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub factor: f64,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            factor: 2.0,
            cap: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    /// Upper bound of the delay window for `attempt` (0-indexed), before jitter.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let scaled = self.base.as_secs_f64() * self.factor.powi(attempt as i32);
        let capped = scaled.min(self.cap.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Draws a jittered delay for `attempt` using `rng`.
    pub fn delay_with(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let ceiling = self.ceiling(attempt);
        if ceiling.is_zero() {
            return ceiling;
        }
        let jittered_secs = rng.gen_range(0.0..ceiling.as_secs_f64());
        Duration::from_secs_f64(jittered_secs)
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, &mut rand::thread_rng())
    }
}
