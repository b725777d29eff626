//! Caller-level retry.
//!
//! The client performs exactly one network call per request. Retrying is the
//! caller's decision and is expressed by wrapping a whole call in
//! [`RetryConfig::run`]. Only errors for which
//! [`HttpClientError::is_retryable`] holds are retried: transport failures,
//! 408, 429 and 5xx statuses.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

use crate::{HttpClientError, Result};

/// How many times a call is attempted and how long to wait in between.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Wait between attempts.
    pub backoff: BackoffStrategy,
    /// No new attempt starts once this much time has passed since the first.
    pub deadline: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::exponential(3, Duration::from_millis(100))
    }
}

impl RetryConfig {
    /// Doubling delays starting at `initial_delay`, capped at 30 seconds.
    pub fn exponential(max_attempts: u32, initial_delay: Duration) -> Self {
        Self::with_backoff(
            max_attempts,
            BackoffStrategy::Exponential {
                initial: initial_delay,
                max: Duration::from_secs(30),
                multiplier: 2.0,
            },
        )
    }

    /// Delays growing by `step` per attempt, capped at 30 seconds.
    pub fn linear(max_attempts: u32, step: Duration) -> Self {
        Self::with_backoff(
            max_attempts,
            BackoffStrategy::Linear {
                delay: step,
                max: Duration::from_secs(30),
            },
        )
    }

    /// The same `delay` before every retry.
    pub fn constant(max_attempts: u32, delay: Duration) -> Self {
        Self::with_backoff(max_attempts, BackoffStrategy::Constant(delay))
    }

    /// Retry straight away.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::with_backoff(max_attempts, BackoffStrategy::None)
    }

    fn with_backoff(max_attempts: u32, backoff: BackoffStrategy) -> Self {
        Self {
            max_attempts,
            backoff,
            deadline: Some(Duration::from_secs(60)),
        }
    }

    /// Stop retrying once `deadline` has elapsed since the first attempt.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Run a whole call, re-invoking it while it fails with a retryable error.
    ///
    /// `operation` is called once per attempt, so every attempt goes through
    /// the full client pipeline again. The last error is returned once the
    /// attempts or the deadline are used up.
    ///
    /// ```rust,no_run
    /// use courier_http::{HttpClient, HttpClientConfig, RetryConfig};
    /// use std::time::Duration;
    ///
    /// # async fn run() -> courier_http::Result<()> {
    /// let client = HttpClient::new(HttpClientConfig::default())?;
    /// let retry = RetryConfig::exponential(3, Duration::from_millis(100));
    ///
    /// let users = retry
    ///     .run(|| client.get::<serde_json::Value>("https://api.example.com/users", None))
    ///     .await?;
    /// # let _ = users;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let past_deadline = self.deadline.is_some_and(|d| start.elapsed() >= d);
            if past_deadline || attempt + 1 >= self.max_attempts || !error.is_retryable() {
                return Err(error);
            }

            let delay = self.backoff.delay_for_attempt(attempt);
            warn!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Delay schedule between attempts.
#[derive(Debug, Clone)]
pub enum BackoffStrategy {
    /// No wait.
    None,
    /// Fixed wait.
    Constant(Duration),
    /// `delay * (attempt + 1)`, capped at `max`.
    Linear {
        /// Growth per attempt.
        delay: Duration,
        /// Cap.
        max: Duration,
    },
    /// `initial * multiplier^attempt`, capped at `max`.
    Exponential {
        /// First wait.
        initial: Duration,
        /// Cap.
        max: Duration,
        /// Growth factor.
        multiplier: f64,
    },
}

impl BackoffStrategy {
    /// Wait before retry number `attempt + 1` (`attempt` counts from 0).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Constant(d) => *d,
            Self::Linear { delay, max } => delay.saturating_mul(attempt + 1).min(*max),
            Self::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let factor = multiplier.powi(attempt as i32);
                let millis = (initial.as_millis() as f64 * factor) as u64;
                Duration::from_millis(millis).min(*max)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn status(status: u16) -> HttpClientError {
        HttpClientError::Status {
            status,
            message: "failed".to_string(),
            data: None,
        }
    }

    #[test]
    fn test_exponential_backoff() {
        let strategy = BackoffStrategy::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_millis(500),
            multiplier: 2.0,
        };

        assert_eq!(strategy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(strategy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(strategy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(strategy.delay_for_attempt(3), Duration::from_millis(500));
    }

    #[test]
    fn test_linear_constructor() {
        let config = RetryConfig::linear(4, Duration::from_millis(100));

        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.backoff.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.backoff.delay_for_attempt(2), Duration::from_millis(300));
        assert_eq!(config.backoff.delay_for_attempt(1000), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_run_retries_until_success() {
        let attempts = AtomicU32::new(0);
        let result = RetryConfig::immediate(3)
            .run(|| async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(status(503))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_returns_last_error_when_exhausted() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = RetryConfig::immediate(2)
            .run(|| async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                Err(status(if n == 0 { 502 } else { 503 }))
            })
            .await;

        assert_eq!(result.unwrap_err().status(), 503);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_retries_transport_failures() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = RetryConfig::immediate(3)
            .run(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(HttpClientError::Transport {
                    message: "connection refused".to_string(),
                    source: None,
                })
            })
            .await;

        assert_eq!(result.unwrap_err().status(), 0);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_does_not_retry_client_errors() {
        for error in [
            status(404),
            HttpClientError::LogicalFailure {
                status: 200,
                code: Some(9999),
                message: "bad input".to_string(),
                envelope: serde_json::Value::Null,
            },
        ] {
            let attempts = AtomicU32::new(0);
            let mut error = Some(error);
            let result: Result<()> = RetryConfig::immediate(5)
                .run(|| {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    let error = error.take().unwrap_or_else(|| status(503));
                    async move { Err(error) }
                })
                .await;

            assert!(result.is_err());
            assert_eq!(attempts.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_waits_between_attempts() {
        let start = Instant::now();
        let result: Result<()> = RetryConfig::constant(3, Duration::from_secs(1))
            .run(|| async { Err(status(429)) })
            .await;

        assert_eq!(result.unwrap_err().status(), 429);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(2) && waited < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_retrying() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = RetryConfig::constant(10, Duration::from_secs(1))
            .with_deadline(Duration::from_millis(2500))
            .run(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(status(500))
            })
            .await;

        assert!(result.is_err());
        // Failures at 0s, 1s and 2s are retried; the one at 3s is past the deadline.
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }
}
