//! Bounded retry for remote calls.
//!
//! [`with_retry`] wraps any fallible async operation. Callers only ever see
//! the final outcome: a success on a later attempt looks exactly like a
//! success on the first one, and exhaustion returns the last error unchanged.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use studio_protocol::config_models::RetryConfig;

/// How many times to attempt a call and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,

    /// Delay before the second attempt. `Duration::ZERO` retries immediately.
    pub initial_backoff: Duration,

    /// Growth factor for the delay after each further failure.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    /// One retry, no delay.
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_backoff: Duration::ZERO,
            multiplier: 2.0,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.backoff_multiplier,
        }
    }
}

impl RetryPolicy {
    /// A single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to use after `current`. Never shrinks below `current`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let next_ms = (current.as_millis() as f64 * self.multiplier.max(1.0)) as u64;
        Duration::from_millis(next_ms)
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` is reached.
///
/// `operation` names the call in log output only.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let max_attempts = policy.attempts();
    let mut delay = policy.initial_backoff;
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                tracing::debug!(operation, attempt, error = %e, "Retries exhausted");
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Remote call failed, retrying",
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                    delay = policy.next_delay(delay);
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_with_retry_success_after_one_failure() {
        let calls = AtomicU32::new(0);

        let result: Result<&str, String> = with_retry(&RetryPolicy::default(), "flaky", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("connection reset".to_string())
            } else {
                Ok("image")
            }
        })
        .await;

        assert_eq!(result, Ok("image"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retry_returns_last_error() {
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = with_retry(&RetryPolicy::default(), "broken", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Err(format!("failure {n}"))
        })
        .await;

        assert_eq!(result, Err("failure 2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retry_immediate_success_calls_once() {
        let calls = AtomicU32::new(0);

        let result: Result<u8, String> = with_retry(&RetryPolicy::default(), "ok", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };

        let result: Result<(), String> = with_retry(&policy, "zero", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("nope".to_string())
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_honours_configured_bound() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(1),
            multiplier: 2.0,
        };

        let result: Result<(), String> = with_retry(&policy, "bounded", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("still down".to_string())
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_next_delay_grows() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.next_delay(Duration::from_millis(100)),
            Duration::from_millis(200)
        );

        let shrinking = RetryPolicy {
            multiplier: 0.5,
            ..RetryPolicy::default()
        };
        assert_eq!(
            shrinking.next_delay(Duration::from_millis(100)),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_policy_from_config() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_backoff_ms: 300,
            backoff_multiplier: 1.5,
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(300));
        assert_eq!(policy.multiplier, 1.5);
    }
}
