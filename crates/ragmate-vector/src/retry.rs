//! Explicit retry layer over the transport.
//!
//! Retries only transport failures that are worth retrying: 429, 5xx, and
//! network-level errors (status 0). Validation and consistency errors pass
//! straight through, as do other 4xx. Exponential backoff doubles the base
//! delay per attempt.

use ragmate_core::error::Result;
use ragmate_core::config::RetryConfig;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries. Used where a repeated side effect would
    /// not be idempotent.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }

    /// Run `op`, retrying retryable failures with exponential backoff.
    pub async fn run<T, F, Fut>(&self, what: &str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.base_delay * 2u32.saturating_pow(attempt - 1);
                    tracing::warn!(
                        "{what} failed (attempt {attempt}/{}): {err} — retrying in {delay:?}",
                        self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragmate_core::error::RagmateError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_rate_limit_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = policy()
            .run("op", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(RagmateError::Transport {
                        status: 429,
                        body: "rate limited".into(),
                    })
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fails_fast_on_client_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = policy()
            .run("op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RagmateError::Transport {
                    status: 404,
                    body: "not found".into(),
                })
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = policy()
            .run("op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RagmateError::network("connection refused"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn validation_errors_pass_through() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = policy()
            .run("op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RagmateError::Validation("bad input".into()))
            })
            .await;
        assert!(matches!(result, Err(RagmateError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
