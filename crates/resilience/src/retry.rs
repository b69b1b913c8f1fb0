//! Bounded exponential backoff for boundary calls.
//!
//! The delay before retry `n` (0-based) is
//! `min(maxIntervalMs, initialIntervalMs * backoffExponent^n)`. A failed attempt
//! is retried only while the time since the first attempt is below
//! `maxElapsedTimeMs` and the failure is retryable. The last wait is shortened
//! so no attempt starts after the budget runs out.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{ErrorClass, Retryable};

/// Configuration for retry behavior.
///
/// Field names serialize in camelCase (`initialIntervalMs`, `maxIntervalMs`,
/// `backoffExponent`, `maxElapsedTimeMs`, `retryOnConnectionError`,
/// `requestTimeoutMs`, `jitter`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    /// Delay before the first retry, in milliseconds.
    pub initial_interval_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_interval_ms: u64,
    /// Growth factor applied per retry.
    pub backoff_exponent: f64,
    /// Total time budget measured from the first attempt, in milliseconds.
    pub max_elapsed_time_ms: u64,
    /// Whether connection-level failures (including timeouts) are retried.
    pub retry_on_connection_error: bool,
    /// Per-attempt timeout. `None` leaves attempts unbounded.
    pub request_timeout_ms: Option<u64>,
    /// Add 0-50% random jitter to every delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 500,
            max_interval_ms: 10_000,
            backoff_exponent: 1.8,
            max_elapsed_time_ms: 25_000,
            retry_on_connection_error: true,
            request_timeout_ms: Some(30_000),
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Set the delay before the first retry.
    pub fn with_initial_interval(mut self, delay: Duration) -> Self {
        self.initial_interval_ms = delay.as_millis() as u64;
        self
    }

    /// Set the cap for a single delay.
    pub fn with_max_interval(mut self, delay: Duration) -> Self {
        self.max_interval_ms = delay.as_millis() as u64;
        self
    }

    /// Set the backoff growth factor.
    pub fn with_backoff_exponent(mut self, exponent: f64) -> Self {
        self.backoff_exponent = exponent;
        self
    }

    /// Set the total elapsed-time budget.
    pub fn with_max_elapsed_time(mut self, budget: Duration) -> Self {
        self.max_elapsed_time_ms = budget.as_millis() as u64;
        self
    }

    /// Enable or disable retries on connection-level failures.
    pub fn with_retry_on_connection_error(mut self, enabled: bool) -> Self {
        self.retry_on_connection_error = enabled;
        self
    }

    /// Set (or clear) the per-attempt timeout.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total elapsed-time budget.
    pub fn max_elapsed_time(&self) -> Duration {
        Duration::from_millis(self.max_elapsed_time_ms)
    }

    /// Per-attempt timeout, if any.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

/// Terminal failure of a retried operation.
///
/// Both variants keep the last error the operation produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetryError<E> {
    /// The operation failed with an error that must not be retried.
    #[error("{error} (non-retryable, attempt {attempts})")]
    NonRetryable {
        /// The error as produced by the operation.
        error: E,
        /// Attempts made, including the failing one.
        attempts: u32,
    },

    /// Every attempt failed and the elapsed-time budget is spent.
    #[error("{last} (gave up after {attempts} attempts in {}ms)", .elapsed.as_millis())]
    Exhausted {
        /// Error from the final attempt.
        last: E,
        /// Attempts made.
        attempts: u32,
        /// Time between the first attempt and giving up.
        elapsed: Duration,
    },
}

impl<E> RetryError<E> {
    /// The last error observed.
    pub fn last_error(&self) -> &E {
        match self {
            RetryError::NonRetryable { error, .. } => error,
            RetryError::Exhausted { last, .. } => last,
        }
    }

    /// Consumes the wrapper and returns the last error observed.
    pub fn into_last_error(self) -> E {
        match self {
            RetryError::NonRetryable { error, .. } => error,
            RetryError::Exhausted { last, .. } => last,
        }
    }

    /// Attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::NonRetryable { attempts, .. } | RetryError::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    /// True when the budget ran out rather than hitting a permanent error.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }
}

/// Result of a retried operation plus bookkeeping.
#[derive(Debug, Clone)]
pub struct RetryReport<T, E> {
    /// The final result.
    pub result: Result<T, RetryError<E>>,
    /// Number of attempts made (1 = no retries needed).
    pub attempts: u32,
    /// Total duration spent on all attempts and delays.
    pub total_duration: Duration,
}

impl<T, E> RetryReport<T, E> {
    /// Whether the operation ultimately succeeded.
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    /// Convert to a standard Result.
    pub fn into_result(self) -> Result<T, RetryError<E>> {
        self.result
    }
}

/// Wraps an operation with bounded exponential backoff.
///
/// The policy holds no mutable state, so one instance can be shared by any
/// number of concurrent callers. The wrapped operation must be safe to repeat.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Delay before retry number `retry` (0-based), without jitter.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let initial = self.config.initial_interval_ms as f64;
        let cap = self.config.max_interval_ms as f64;
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let raw = initial * self.config.backoff_exponent.powi(exponent);
        let millis = if raw.is_finite() { raw.min(cap) } else { cap };
        Duration::from_millis(millis.max(0.0) as u64)
    }

    /// Whether failures of `class` are retried under this policy.
    pub fn is_retryable(&self, class: ErrorClass) -> bool {
        match class {
            ErrorClass::Connection => self.config.retry_on_connection_error,
            ErrorClass::RateLimited | ErrorClass::Service => true,
            ErrorClass::Permanent => false,
        }
    }

    /// Executes `operation` until it succeeds, fails permanently, or the
    /// elapsed-time budget is spent.
    ///
    /// `operation` receives the 0-based attempt number.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        E: Retryable + Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_report(operation).await.into_result()
    }

    /// Like [`execute`](Self::execute) but also reports attempts and duration.
    pub async fn execute_with_report<T, E, F, Fut>(&self, mut operation: F) -> RetryReport<T, E>
    where
        E: Retryable + Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let budget = self.config.max_elapsed_time();
        let mut attempt: u32 = 0;

        loop {
            let outcome = match self.config.request_timeout() {
                Some(limit) => match tokio::time::timeout(limit, operation(attempt)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(E::timed_out(limit)),
                },
                None => operation(attempt).await,
            };
            let attempts = attempt + 1;

            let error = match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempts, elapsed_ms = start.elapsed().as_millis() as u64, "retry_recovered");
                    }
                    return RetryReport {
                        result: Ok(value),
                        attempts,
                        total_duration: start.elapsed(),
                    };
                }
                Err(error) => error,
            };

            let class = error.error_class();
            if !self.is_retryable(class) {
                warn!(attempts, error = %error, class = ?class, "retry_non_retryable");
                return RetryReport {
                    result: Err(RetryError::NonRetryable { error, attempts }),
                    attempts,
                    total_duration: start.elapsed(),
                };
            }

            let elapsed = start.elapsed();
            if elapsed >= budget {
                warn!(
                    attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %error,
                    "retry_budget_exhausted"
                );
                return RetryReport {
                    result: Err(RetryError::Exhausted {
                        last: error,
                        attempts,
                        elapsed,
                    }),
                    attempts,
                    total_duration: elapsed,
                };
            }

            let delay = self.jittered(self.backoff_delay(attempt)).min(budget - elapsed);
            warn!(
                attempt,
                error = %error,
                class = ?class,
                delay_ms = delay.as_millis() as u64,
                "retry_attempt_failed"
            );
            tokio::time::sleep(delay).await;
            attempt = attempt.saturating_add(1);
        }
    }

    /// Adds up to 50% jitter, never past `maxIntervalMs`.
    fn jittered(&self, delay: Duration) -> Duration {
        if !self.config.jitter {
            return delay;
        }
        let millis = delay.as_millis() as u64;
        let jittered = millis.saturating_add(fastrand::u64(0..=millis / 2));
        Duration::from_millis(jittered.min(self.config.max_interval_ms))
    }
}
