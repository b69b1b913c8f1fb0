//! Retry and failure classification for the docex service boundaries.
//!
//! Both external calls the pipeline makes (OCR and JSON extraction) go over the
//! network, and both fail in the same handful of ways. This crate gives them a
//! shared vocabulary for those failures ([`BoundaryError`]) and a single
//! [`RetryPolicy`] that knows which of them are worth another attempt.
//!
//! The rules are short:
//!
//! - Connection problems and per-request timeouts are retried (unless
//!   `retryOnConnectionError` is off).
//! - HTTP 429, 408 and 5xx are retried.
//! - Every other 4xx, and any response we could not decode, surfaces on the
//!   first attempt.
//! - Retrying stops once the elapsed-time budget is spent, and the caller gets
//!   the last error it saw, not a generic "timed out".
//!
//! ```no_run
//! use resilience::{BoundaryError, RetryConfig, RetryPolicy};
//!
//! # async fn call_service() -> Result<String, BoundaryError> { Ok("ok".into()) }
//! # async fn run() {
//! let policy = RetryPolicy::new(RetryConfig::default());
//! let text = policy.execute(|_attempt| call_service()).await;
//! # }
//! ```

mod error;
mod retry;

pub use crate::error::{BoundaryError, ErrorClass, Retryable};
pub use crate::retry::{RetryConfig, RetryError, RetryPolicy, RetryReport};
