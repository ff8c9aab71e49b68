//! Timeout and retry policy for remote calls.
//!
//! Every network-bound call (embedding API, language model API) goes through
//! [`RetryPolicy::run`], which bounds each attempt with a timeout and retries
//! transient failures with exponential backoff.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Bounded retry with exponential backoff and a per-attempt timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    #[serde(rename = "maxAttempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt, in milliseconds
    #[serde(rename = "initialBackoffMs", default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for a single backoff delay, in milliseconds
    #[serde(rename = "maxBackoffMs", default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Timeout applied to each attempt, in seconds
    #[serde(rename = "timeoutSecs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RetryPolicy {
    /// A policy that performs exactly one attempt.
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            timeout_secs: timeout.as_secs().max(1),
            ..Self::default()
        }
    }

    /// Per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Backoff before attempt `attempt + 1`, where `attempt` is 1-based.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        let delay = self.initial_backoff_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out.
    ///
    /// An attempt exceeding the timeout is turned into an error with
    /// `on_timeout` and treated like any other error: retried only when the
    /// produced error reports itself as transient.
    pub async fn run<T, F, Fut, E>(&self, operation: &str, on_timeout: E, mut call: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
        E: Fn(String) -> AppError,
    {
        let attempts = self.max_attempts.max(1);
        let timeout = self.timeout();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = match tokio::time::timeout(timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(on_timeout(format!(
                    "{} timed out after {}s",
                    operation,
                    timeout.as_secs()
                ))),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!("{} succeeded on attempt {}", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < attempts => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        "{} failed (attempt {}/{}), retrying in {}ms: {}",
                        operation,
                        attempt,
                        attempts,
                        delay.as_millis(),
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if err.is_transient() {
                        tracing::error!("{} failed after {} attempts: {}", operation, attempt, err);
                    }
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            initial_backoff_ms: 100,
            max_backoff_ms: 350,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
        assert_eq!(policy.backoff(40), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run("test call", AppError::llm_transient, || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(AppError::llm_transient("rate limited"))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = fast_policy(5)
            .run("test call", AppError::llm_transient, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::llm_permanent("invalid api key"))
            })
            .await;

        assert!(matches!(
            result,
            Err(AppError::LlmInvocation {
                kind: crate::error::FailureKind::Permanent,
                ..
            })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = fast_policy(4)
            .run("test call", AppError::llm_transient, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::llm_transient("503"))
            })
            .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_timeout_uses_supplied_error() {
        let policy = RetryPolicy {
            max_attempts: 1,
            initial_backoff_ms: 1,
            max_backoff_ms: 1,
            timeout_secs: 1,
        };
        let result: AppResult<()> = policy
            .run(
                "slow call",
                |msg| AppError::embedding(crate::error::FailureKind::Transient, msg),
                || async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                },
            )
            .await;

        match result {
            Err(AppError::EmbeddingService { message, .. }) => {
                assert!(message.contains("timed out"))
            }
            other => panic!("expected embedding timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_no_retry_policy() {
        let policy = RetryPolicy::no_retry(Duration::from_secs(10));
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.timeout(), Duration::from_secs(10));
    }
}
