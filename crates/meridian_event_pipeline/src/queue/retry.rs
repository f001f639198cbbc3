//! Retry policy for queued jobs.

use std::time::Duration;

/// Immutable retry policy attached to a queue at creation time.
///
/// A job executes at most `max_attempts` times. After a failed attempt `n`
/// (zero-indexed) the job is re-queued with a delay of
/// `base_delay * multiplier^n`, so delays grow strictly for multipliers
/// above 1. Once attempts are exhausted the job is terminally failed and is
/// never retried again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Creates a policy with the standard doubling backoff.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier: 2.0,
        }
    }

    /// Delay before re-running a job whose zero-indexed attempt `attempt`
    /// just failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        self.base_delay.mul_f64(factor.max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_per_attempt() {
        let policy = RetryPolicy::new(4, Duration::from_secs(2));
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2), Duration::from_secs(8));
    }

    #[test]
    fn test_delays_strictly_increase() {
        let policy = RetryPolicy::default();
        let mut previous = Duration::ZERO;
        for attempt in 0..5 {
            let delay = policy.delay_for(attempt);
            assert!(delay > previous, "attempt {attempt} did not increase");
            previous = delay;
        }
    }
}
