//! Bootstrap retry backoff.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff schedule for credential bootstrap retries.
///
/// The base delay doubles per attempt up to a fixed ceiling, then up to
/// `jitter_frac` of the computed delay is added at random so that many
/// capture sessions do not retry against the daemon in lockstep.
#[derive(Debug, Clone)]
pub struct BootstrapBackoff {
    /// First-attempt delay.
    pub base: Duration,
    /// Ceiling for the pre-jitter delay.
    pub max: Duration,
    /// Fraction of the delay added as random jitter (0.0..=1.0).
    pub jitter_frac: f64,
}

impl BootstrapBackoff {
    /// Creates a schedule with the given base and ceiling.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            jitter_frac: 0.3,
        }
    }

    /// The pre-jitter delay for a 1-based attempt number.
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        let doubled = self
            .base
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        doubled.min(self.max)
    }

    /// The full delay for a 1-based attempt number, jitter included.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_for_attempt(attempt);
        if self.jitter_frac <= 0.0 {
            return base;
        }
        let jitter = base.mul_f64(rand::thread_rng().gen_range(0.0..self.jitter_frac));
        base + jitter
    }
}

impl Default for BootstrapBackoff {
    /// The bootstrap schedule: 2 s base, 300 s ceiling, 30 % jitter.
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(300))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_then_cap() {
        let backoff = BootstrapBackoff::default();

        assert_eq!(backoff.base_delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(backoff.base_delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(backoff.base_delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(backoff.base_delay_for_attempt(8), Duration::from_secs(256));
        assert_eq!(backoff.base_delay_for_attempt(9), Duration::from_secs(300));
        assert_eq!(backoff.base_delay_for_attempt(40), Duration::from_secs(300));
    }

    #[test]
    fn test_delays_are_non_decreasing() {
        let backoff = BootstrapBackoff::default();
        let mut prev = Duration::ZERO;
        for attempt in 1..=20 {
            let delay = backoff.base_delay_for_attempt(attempt);
            assert!(delay >= prev, "attempt {attempt} regressed");
            prev = delay;
        }
    }

    #[test]
    fn test_jittered_delay_bounded_by_ceiling_times_jitter() {
        let backoff = BootstrapBackoff::default();
        let bound = backoff.max.mul_f64(1.0 + backoff.jitter_frac);
        for attempt in 1..=12 {
            for _ in 0..50 {
                let delay = backoff.delay_for_attempt(attempt);
                assert!(delay >= backoff.base_delay_for_attempt(attempt));
                assert!(delay <= bound, "attempt {attempt} exceeded jitter bound");
            }
        }
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let backoff = BootstrapBackoff::default();
        assert_eq!(backoff.base_delay_for_attempt(u32::MAX), backoff.max);
    }
}
