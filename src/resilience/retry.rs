//! Bounded retries with exponential backoff and jitter.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::circuit_breaker::{CircuitBreaker, CircuitOpenError};

/// Errors that know whether trying again could help.
pub trait Transient {
    /// Timeouts, connection failures and 5xx/429 responses.
    fn is_transient(&self) -> bool;
}

/// Attempt budget and backoff of one class of operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_jitter() -> bool {
    true
}

impl RetryPolicy {
    /// Verification is cheap and idempotent: retry quickly.
    pub fn verification() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
            jitter: true,
        }
    }

    /// Settlement touches the chain: fewer attempts, longer pauses.
    pub fn settlement() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 500,
            max_delay_ms: 5_000,
            jitter: true,
        }
    }

    /// Pause before attempt `retry + 1`, where `retry` counts from 1.
    ///
    /// `base * 2^(retry-1)`, capped at `max_delay_ms`. With jitter the pause is
    /// drawn uniformly from the upper half of that value.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(20);
        let delay = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        let delay = if self.jitter && delay > 1 {
            rand::rng().random_range(delay / 2..=delay)
        } else {
            delay
        };
        Duration::from_millis(delay)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),
    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },
    #[error(transparent)]
    Permanent(E),
}

/// Runs `operation` under `breaker`, retrying transient failures per `policy`.
///
/// Each attempt asks the breaker for admission first, so an open breaker ends
/// the loop without I/O. Non-transient errors return at once: they prove the
/// service is reachable and count as a success for the breaker.
pub async fn retry_with_breaker<T, E, F, Fut>(
    policy: &RetryPolicy,
    breaker: &CircuitBreaker,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    E: Transient + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        breaker.try_acquire()?;
        match operation(attempt).await {
            Ok(value) => {
                breaker.record_success();
                return Ok(value);
            }
            Err(err) if !err.is_transient() => {
                breaker.record_success();
                return Err(RetryError::Permanent(err));
            }
            Err(err) => {
                breaker.record_failure();
                if attempt >= max_attempts {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    service = breaker.service(),
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitBreakerConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("flaky")]
        Flaky,
        #[error("rejected")]
        Rejected,
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, TestError::Flaky)
        }
    }

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("test", CircuitBreakerConfig::default())
    }

    #[test]
    fn test_backoff_without_jitter() {
        let policy = RetryPolicy {
            jitter: false,
            ..RetryPolicy::verification()
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(10), Duration::from_millis(2_000));
    }

    #[test]
    fn test_backoff_jitter_bounds() {
        let policy = RetryPolicy::settlement();
        for _ in 0..50 {
            let delay = policy.backoff(2);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(1_000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_with_breaker(&RetryPolicy::verification(), &breaker(), |_| async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(TestError::Flaky)
            } else {
                Ok("done")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempt_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> =
            retry_with_breaker(&RetryPolicy::settlement(), &breaker(), |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Flaky)
            })
            .await;
        assert!(matches!(
            result,
            Err(RetryError::Exhausted {
                attempts: 2,
                last: TestError::Flaky
            })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let breaker = breaker();
        let result: Result<(), _> =
            retry_with_breaker(&RetryPolicy::verification(), &breaker, |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Rejected)
            })
            .await;
        assert!(matches!(result, Err(RetryError::Permanent(TestError::Rejected))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.snapshot().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_open_breaker_skips_operation() {
        let breaker = breaker();
        for _ in 0..5 {
            breaker.record_failure();
        }
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = retry_with_breaker::<(), TestError, _, _>(
            &RetryPolicy::verification(),
            &breaker,
            |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .await
        .map_err(|e| match e {
            RetryError::CircuitOpen(_) => TestError::Rejected,
            _ => TestError::Flaky,
        });
        assert!(matches!(result, Err(TestError::Rejected)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_across_calls_open_breaker() {
        let breaker = breaker();
        let policy = RetryPolicy {
            max_attempts: 5,
            ..RetryPolicy::verification()
        };
        let result: Result<(), _> =
            retry_with_breaker(&policy, &breaker, |_| async { Err(TestError::Flaky) }).await;
        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 5, .. })));

        let result: Result<(), _> =
            retry_with_breaker(&policy, &breaker, |_| async { Err(TestError::Flaky) }).await;
        assert!(matches!(result, Err(RetryError::CircuitOpen(_))));
    }
}
