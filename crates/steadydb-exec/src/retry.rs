//! Retry policy engine.
//!
//! The policy is pure data plus a delay function; the executor owns the
//! driving loop and all mutable attempt state, so the algorithm here stays
//! unit-testable in isolation from any I/O.

use std::time::Duration;

use rand::Rng;

/// Retry configuration for single-shot command execution.
///
/// Immutable once attached to an executor. When no policy is configured the
/// default applies: a fixed one-second delay with no exponential growth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry (and every retry, without backoff).
    pub base_delay: Duration,
    /// Upper clamp on the computed delay.
    pub max_delay: Duration,
    /// Whether the delay doubles on each successive retry.
    pub exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            exponential_backoff: false,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default delays and the given retry budget.
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Set the base delay.
    #[must_use]
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the delay clamp.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable exponential backoff.
    #[must_use]
    pub fn exponential_backoff(mut self, enabled: bool) -> Self {
        self.exponential_backoff = enabled;
        self
    }

    /// Delay to wait before retry number `attempt` (1-indexed), without
    /// jitter.
    ///
    /// With backoff enabled the delay doubles per retry, saturating, and is
    /// clamped to `max_delay`. Without backoff it is always `base_delay`
    /// (clamped). Monotonically non-decreasing in `attempt`.
    #[must_use]
    pub fn delay_before_jitter(&self, attempt: u32) -> Duration {
        let base = duration_to_millis(self.base_delay).max(1);
        let cap = duration_to_millis(self.max_delay).max(base);

        let mut delay = base;
        if self.exponential_backoff {
            for _ in 1..attempt.max(1) {
                delay = delay.saturating_mul(2).min(cap);
            }
        }
        Duration::from_millis(delay.min(cap))
    }

    /// Delay to wait before retry number `attempt` (1-indexed), with a
    /// uniform jitter of up to 10% added.
    ///
    /// Jitter keeps concurrent callers that failed together from retrying in
    /// lockstep. The result never exceeds `max_delay` by more than 10%.
    #[must_use]
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_before_jitter(attempt);
        let jitter_cap = duration_to_millis(delay) / 10;
        if jitter_cap == 0 {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(0..=jitter_cap);
        delay + Duration::from_millis(jitter)
    }

    /// Whether the budget still allows a retry after `attempt` tries.
    #[must_use]
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_is_fixed_one_second() {
        let policy = RetryPolicy::default();
        assert!(!policy.exponential_backoff);
        for attempt in 1..=10 {
            assert_eq!(
                policy.delay_before_jitter(attempt),
                Duration::from_secs(1),
                "attempt {attempt}"
            );
        }
    }

    #[test]
    fn test_exponential_doubling_and_clamp() {
        let policy = RetryPolicy::new(10)
            .base_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(450))
            .exponential_backoff(true);

        assert_eq!(policy.delay_before_jitter(1), Duration::from_millis(100));
        assert_eq!(policy.delay_before_jitter(2), Duration::from_millis(200));
        assert_eq!(policy.delay_before_jitter(3), Duration::from_millis(400));
        assert_eq!(policy.delay_before_jitter(4), Duration::from_millis(450));
        assert_eq!(policy.delay_before_jitter(64), Duration::from_millis(450));
    }

    #[test]
    fn test_allows_retry_budget() {
        let policy = RetryPolicy::new(2);
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
    }

    proptest! {
        #[test]
        fn prop_backoff_monotone_and_bounded(
            base_ms in 1u64..10_000,
            max_ms in 1u64..60_000,
            attempt in 1u32..64,
        ) {
            let policy = RetryPolicy::new(8)
                .base_delay(Duration::from_millis(base_ms))
                .max_delay(Duration::from_millis(max_ms))
                .exponential_backoff(true);

            let this = policy.delay_before_jitter(attempt);
            let next = policy.delay_before_jitter(attempt + 1);
            prop_assert!(next >= this);

            let cap = policy.max_delay.max(policy.base_delay);
            prop_assert!(this <= cap);
        }

        #[test]
        fn prop_jitter_within_ten_percent(attempt in 1u32..32) {
            let policy = RetryPolicy::new(8)
                .base_delay(Duration::from_millis(50))
                .max_delay(Duration::from_millis(2_000))
                .exponential_backoff(true);

            let bare = policy.delay_before_jitter(attempt);
            let jittered = policy.next_delay(attempt);
            prop_assert!(jittered >= bare);
            prop_assert!(jittered <= bare + bare / 10);
        }
    }
}
