//! Call policy: per-call timeout and retry/backoff parameters.
//!
//! [`CallPolicy`] controls how [`ResilientCaller`](crate::use_cases::resilient_caller::ResilientCaller)
//! reaches a backend. Defaults match the OpenRouter client: 120 s per call,
//! 3 attempts, 1 s base backoff doubling up to 30 s, 25 % jitter.

use std::time::Duration;

/// Timeout and retry parameters for a single backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallPolicy {
    /// Upper bound for one attempt (for streaming: the whole stream).
    pub per_call_timeout: Duration,
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles with every further retry.
    pub backoff_base: Duration,
    /// Ceiling for computed backoff and for server-provided retry delays.
    pub max_retry_delay: Duration,
    /// Maximum random jitter as a fraction of the computed delay.
    pub jitter_ratio: f64,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            per_call_timeout: Duration::from_secs(120),
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(30),
            jitter_ratio: 0.25,
        }
    }
}

impl CallPolicy {
    // ==================== Builder Methods ====================

    pub fn with_per_call_timeout(mut self, timeout: Duration) -> Self {
        self.per_call_timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_max_retry_delay(mut self, ceiling: Duration) -> Self {
        self.max_retry_delay = ceiling;
        self
    }

    // ==================== Backoff ====================

    /// Delay after the `retry`-th failed attempt (0-based), before jitter:
    /// `min(base * 2^retry, max_retry_delay)`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.backoff_base
            .saturating_mul(factor)
            .min(self.max_retry_delay)
    }

    /// Backoff plus jitter. `unit` is a sample from `[0, 1)`.
    pub fn jittered_delay(&self, retry: u32, unit: f64) -> Duration {
        let delay = self.backoff_delay(retry);
        delay + delay.mul_f64(self.jitter_ratio * unit.clamp(0.0, 1.0))
    }

    /// A server-provided retry delay, capped at `max_retry_delay`.
    pub fn server_delay(&self, delay: Duration) -> Duration {
        delay.min(self.max_retry_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let policy = CallPolicy::default();
        assert_eq!(policy.per_call_timeout, Duration::from_secs(120));
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_base, Duration::from_secs(1));
        assert_eq!(policy.max_retry_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_doubles_until_ceiling() {
        let policy = CallPolicy::default();
        assert_eq!(policy.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(4), Duration::from_secs(16));
        assert_eq!(policy.backoff_delay(5), Duration::from_secs(30));
        assert_eq!(policy.backoff_delay(40), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_is_bounded() {
        let policy = CallPolicy::default();
        assert_eq!(policy.jittered_delay(1, 0.0), Duration::from_secs(2));
        assert_eq!(policy.jittered_delay(1, 1.0), Duration::from_millis(2500));
        assert_eq!(policy.jittered_delay(1, 7.0), Duration::from_millis(2500));
    }

    #[test]
    fn test_server_delay_is_capped() {
        let policy = CallPolicy::default();
        assert_eq!(policy.server_delay(Duration::from_secs(7)), Duration::from_secs(7));
        assert_eq!(policy.server_delay(Duration::from_secs(60)), Duration::from_secs(30));
    }

    #[test]
    fn test_at_least_one_attempt() {
        assert_eq!(CallPolicy::default().with_max_attempts(0).max_attempts, 1);
    }
}
