//! Retry policy and the failure decision function.

use std::time::Duration;

use rand::Rng;

use super::error::ErrorKind;

/// Backoff policy for failed records.
///
/// The delay governs when *this record* becomes claimable again; global
/// throughput is bounded separately by the rate limiter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Multiplier for exponential backoff.
    pub multiplier: f64,

    /// Random jitter fraction in `[0, 1]` added on top of the computed
    /// delay to de-synchronize retries across records.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next retry given the number of attempts already made.
    ///
    /// Exponential: `base_delay * multiplier^(attempts - 1)`, plus jitter.
    /// With the defaults: attempt 1 -> ~2s, attempt 2 -> ~4s, attempt 3 -> ~8s.
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base = self.base_delay.as_secs_f64()
            * self.multiplier.powi(attempts.saturating_sub(1) as i32);
        let jittered = if self.jitter > 0.0 {
            base * (1.0 + rand::thread_rng().gen_range(0.0..=self.jitter))
        } else {
            base
        };
        Duration::from_secs_f64(jittered)
    }
}

/// The next action for a record whose attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Revert to claimable after `delay`.
    Retry { delay: Duration },

    /// Terminal skip; `classification` is what gets persisted to
    /// `last_error` for audit.
    Skip { classification: ErrorKind },
}

/// Decide what happens to a record after a failed attempt.
///
/// Pure function of `(error, attempts, max_attempts)`:
/// - non-retryable errors skip immediately, regardless of remaining budget;
/// - retryable errors retry with backoff while budget remains;
/// - a retryable error on the final attempt skips with `RetryExhausted`.
pub fn decide(
    policy: &RetryPolicy,
    error: ErrorKind,
    attempts: u32,
    max_attempts: u32,
) -> Decision {
    if !error.is_retryable() {
        return Decision::Skip {
            classification: error,
        };
    }
    if attempts >= max_attempts {
        return Decision::Skip {
            classification: ErrorKind::RetryExhausted,
        };
    }
    Decision::Retry {
        delay: policy.next_delay(attempts),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn no_jitter() -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    #[test]
    fn backoff_grows_exponentially() {
        let policy = no_jitter();
        assert_eq!(policy.next_delay(1), Duration::from_secs(2));
        assert_eq!(policy.next_delay(2), Duration::from_secs(4));
        assert_eq!(policy.next_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: 0.5,
        };
        for _ in 0..50 {
            let d = policy.next_delay(1);
            assert!(d >= Duration::from_secs(2));
            assert!(d <= Duration::from_secs(3));
        }
    }

    #[rstest]
    #[case(ErrorKind::NetworkError, 1, 3)]
    #[case(ErrorKind::Timeout, 2, 3)]
    #[case(ErrorKind::RateLimited, 1, 3)]
    #[case(ErrorKind::InvalidArtifact, 1, 3)]
    fn retryable_with_budget_retries(
        #[case] error: ErrorKind,
        #[case] attempts: u32,
        #[case] max: u32,
    ) {
        let decision = decide(&no_jitter(), error, attempts, max);
        assert!(matches!(decision, Decision::Retry { .. }));
    }

    #[rstest]
    #[case(ErrorKind::NotFound)]
    #[case(ErrorKind::NoArtifactFound)]
    fn non_retryable_skips_despite_budget(#[case] error: ErrorKind) {
        let decision = decide(&no_jitter(), error, 1, 3);
        assert_eq!(
            decision,
            Decision::Skip {
                classification: error
            }
        );
    }

    #[test]
    fn exhausted_budget_skips_with_retry_exhausted() {
        let decision = decide(&no_jitter(), ErrorKind::NetworkError, 3, 3);
        assert_eq!(
            decision,
            Decision::Skip {
                classification: ErrorKind::RetryExhausted
            }
        );
    }

    #[test]
    fn retry_delay_follows_attempt_count() {
        let policy = no_jitter();
        match decide(&policy, ErrorKind::Timeout, 2, 5) {
            Decision::Retry { delay } => assert_eq!(delay, Duration::from_secs(4)),
            other => panic!("expected retry, got {other:?}"),
        }
    }
}
