//! Retry logic with fixed backoff.
//!
//! Transient failures from external collaborators (the memory service) are
//! retried a fixed number of times with a constant sleep between attempts.
//! Callers pass a predicate so permanent failures stop the loop early.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first (minimum 1).
    pub max_attempts: u32,

    /// Delay between consecutive attempts.
    #[serde(with = "duration_millis")]
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, backoff: Duration::from_millis(500) }
    }
}

impl RetryConfig {
    /// Create a config with a single attempt (fail fast).
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, backoff: Duration::ZERO }
    }

    /// Create a config with the given attempt count and backoff.
    pub fn fixed(max_attempts: u32, backoff: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), backoff }
    }

    /// Retries without sleeping, for tests and tight loops.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, Duration::ZERO)
    }

    /// Delay before the given attempt number (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.backoff
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Result of a retry operation.
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// The final result (success or last error).
    pub result: Result<T, E>,

    /// Number of attempts made.
    pub attempts: u32,

    /// Total time spent (including delays).
    pub total_time: Duration,
}

impl<T, E> RetryResult<T, E> {
    /// Check if the operation succeeded.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Whether more than one attempt was needed.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Get the result.
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Retry an async operation while `should_retry` accepts the error.
///
/// An error the predicate refuses ends the loop immediately.
pub async fn retry_async<T, E, F, Fut, P>(
    config: &RetryConfig,
    should_retry: P,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let max_attempts = config.attempts();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let result = operation().await;

        match result {
            Err(ref e) if attempts < max_attempts && should_retry(e) => {
                tracing::debug!(attempt = attempts, error = %e, "Attempt failed, retrying");
                tokio::time::sleep(config.delay_for_attempt(attempts + 1)).await;
            }
            result => {
                return RetryResult { result, attempts, total_time: start.elapsed() };
            }
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.backoff, Duration::from_millis(500));
    }

    #[test]
    fn test_fixed_backoff() {
        let config = RetryConfig::fixed(4, Duration::from_millis(250));

        assert_eq!(config.delay_for_attempt(1), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(250));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let config = RetryConfig { max_attempts: 0, backoff: Duration::ZERO };
        let result = retry_async(&config, |_| true, || async { Err::<(), _>("nope") }).await;
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let result =
            retry_async(&RetryConfig::immediate(3), |_| true, || async { Ok::<_, &str>("success") })
                .await;

        assert!(result.is_ok());
        assert_eq!(result.attempts, 1);
        assert!(!result.was_retried());
    }

    #[tokio::test]
    async fn test_retry_all_failures() {
        let config = RetryConfig::immediate(2);
        let result = retry_async(&config, |_| true, || async { Err::<(), _>("persistent error") }).await;

        assert!(!result.is_ok());
        assert_eq!(result.attempts, 2);
        assert!(result.was_retried());
    }

    #[tokio::test]
    async fn test_refused_error_stops_retrying() {
        let mut calls = 0;
        let result = retry_async(
            &RetryConfig::immediate(5),
            |e: &&str| *e != "rejected",
            || {
                calls += 1;
                async { Err::<(), _>("rejected") }
            },
        )
        .await;

        assert_eq!(result.attempts, 1);
        assert_eq!(calls, 1);
        assert_eq!(result.into_result(), Err("rejected"));
    }

    #[tokio::test]
    async fn test_retry_async_success_after_failures() {
        let mut calls = 0;
        let result = retry_async(&RetryConfig::immediate(3), |_| true, || {
            calls += 1;
            let ok = calls >= 2;
            async move {
                if ok {
                    Ok(calls)
                } else {
                    Err("connection refused")
                }
            }
        })
        .await;

        assert_eq!(result.attempts, 2);
        assert_eq!(result.into_result(), Ok(2));
    }

    #[test]
    fn test_config_serde_millis() {
        let config = RetryConfig::fixed(2, Duration::from_millis(1500));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("1500"));

        let back: RetryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
