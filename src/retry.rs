//! Send-time retry policy — bounded exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Bounded exponential backoff for transient provider failures.
///
/// The policy is supplied by the caller at client construction and only
/// covers transient errors; credential and scope problems are surfaced
/// immediately without another attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay, before jitter.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based: 1 is the first
    /// retry). Doubles per attempt, capped at `max_delay`, plus up to
    /// 10% random jitter.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let raw = self.base_delay.saturating_mul(1 << exp);
        let capped = raw.min(self.max_delay);

        let jitter_budget = capped.as_millis() as u64 / 10;
        let jitter = if jitter_budget == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_budget)
        };
        capped + Duration::from_millis(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_five_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
    }

    #[test]
    fn none_allows_a_single_attempt() {
        let policy = RetryPolicy::none();
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn delays_double_per_attempt() {
        let policy = RetryPolicy::default();

        let first = policy.delay_before(1);
        assert!(first >= Duration::from_millis(500));
        assert!(first <= Duration::from_millis(550));

        let second = policy.delay_before(2);
        assert!(second >= Duration::from_millis(1000));
        assert!(second <= Duration::from_millis(1100));

        let third = policy.delay_before(3);
        assert!(third >= Duration::from_millis(2000));
        assert!(third <= Duration::from_millis(2200));
    }

    #[test]
    fn delays_are_capped() {
        let policy = RetryPolicy::default();
        // 500ms * 2^9 would be 256s without the cap.
        let late = policy.delay_before(10);
        assert!(late >= Duration::from_secs(8));
        assert!(late <= Duration::from_millis(8800));
    }

    #[test]
    fn huge_attempt_numbers_do_not_overflow() {
        let policy = RetryPolicy::default();
        let delay = policy.delay_before(u32::MAX);
        assert!(delay <= Duration::from_millis(8800));
    }

    #[test]
    fn zero_base_delay_yields_zero() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        };
        assert_eq!(policy.delay_before(1), Duration::ZERO);
    }
}
