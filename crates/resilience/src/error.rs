//! Failure taxonomy shared by the OCR and extraction boundaries.
//!
//! | Variant | Retry class | Typical origin |
//! |---------|-------------|----------------|
//! | [`Network`](BoundaryError::Network) | connection | DNS, TLS, reset sockets |
//! | [`Timeout`](BoundaryError::Timeout) | connection | per-request timeout fired |
//! | [`RateLimited`](BoundaryError::RateLimited) | rate limited | HTTP 429 |
//! | [`Service`](BoundaryError::Service) | service | HTTP 5xx, HTTP 408 |
//! | [`ClientRequest`](BoundaryError::ClientRequest) | permanent | any other 4xx (auth, malformed input) |
//! | [`MalformedResponse`](BoundaryError::MalformedResponse) | permanent | body could not be decoded |
use std::time::Duration;

use thiserror::Error;

/// How a failed attempt should be treated by a [`RetryPolicy`](crate::RetryPolicy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Connection-level failure, including a per-request timeout.
    Connection,
    /// The service asked us to slow down (HTTP 429).
    RateLimited,
    /// The service failed on its side (HTTP 5xx) or gave up waiting (HTTP 408).
    Service,
    /// Retrying the same request cannot succeed.
    Permanent,
}

/// Errors a [`RetryPolicy`](crate::RetryPolicy) knows how to classify.
pub trait Retryable {
    /// Classifies this failure.
    fn error_class(&self) -> ErrorClass;

    /// Error reported when a single attempt exceeds the per-request timeout.
    fn timed_out(after: Duration) -> Self;
}

/// A classified failure from an external service boundary.
///
/// # Examples
///
/// ```rust
/// use resilience::{BoundaryError, ErrorClass, Retryable};
///
/// let err = BoundaryError::from_status(503, "upstream overloaded");
/// assert_eq!(err.error_class(), ErrorClass::Service);
///
/// let err = BoundaryError::from_status(401, "bad key");
/// assert!(err.is_auth_error());
/// assert_eq!(err.error_class(), ErrorClass::Permanent);
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BoundaryError {
    /// The request never got a response (connect, TLS, reset).
    #[error("network error: {0}")]
    Network(String),

    /// A single attempt ran past its per-request timeout.
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// HTTP 429.
    #[error("rate limited (HTTP {status}): {message}")]
    RateLimited {
        /// HTTP status returned by the service.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// HTTP 5xx or 408.
    #[error("service error (HTTP {status}): {message}")]
    Service {
        /// HTTP status returned by the service.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// Any other 4xx: authentication, malformed input, unsupported media.
    #[error("request rejected (HTTP {status}): {message}")]
    ClientRequest {
        /// HTTP status returned by the service.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The service answered but its payload could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl BoundaryError {
    /// Classifies a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => BoundaryError::RateLimited { status, message },
            408 | 500..=599 => BoundaryError::Service { status, message },
            _ => BoundaryError::ClientRequest { status, message },
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            BoundaryError::RateLimited { status, .. }
            | BoundaryError::Service { status, .. }
            | BoundaryError::ClientRequest { status, .. } => Some(*status),
            BoundaryError::Network(_)
            | BoundaryError::Timeout(_)
            | BoundaryError::MalformedResponse(_) => None,
        }
    }

    /// True for 401/403 rejections.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            BoundaryError::ClientRequest {
                status: 401 | 403,
                ..
            }
        )
    }
}

impl Retryable for BoundaryError {
    fn error_class(&self) -> ErrorClass {
        match self {
            BoundaryError::Network(_) | BoundaryError::Timeout(_) => ErrorClass::Connection,
            BoundaryError::RateLimited { .. } => ErrorClass::RateLimited,
            BoundaryError::Service { .. } => ErrorClass::Service,
            BoundaryError::ClientRequest { .. } | BoundaryError::MalformedResponse(_) => {
                ErrorClass::Permanent
            }
        }
    }

    fn timed_out(after: Duration) -> Self {
        BoundaryError::Timeout(after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(
            BoundaryError::from_status(429, "slow down").error_class(),
            ErrorClass::RateLimited
        );
        for status in [408, 500, 502, 503, 504, 599] {
            assert_eq!(
                BoundaryError::from_status(status, "x").error_class(),
                ErrorClass::Service,
                "status {status}"
            );
        }
        for status in [400, 401, 403, 404, 413, 415, 422] {
            assert_eq!(
                BoundaryError::from_status(status, "x").error_class(),
                ErrorClass::Permanent,
                "status {status}"
            );
        }
    }

    #[test]
    fn connection_class_covers_timeouts() {
        assert_eq!(
            BoundaryError::Network("reset".into()).error_class(),
            ErrorClass::Connection
        );
        assert_eq!(
            BoundaryError::timed_out(Duration::from_secs(3)).error_class(),
            ErrorClass::Connection
        );
    }

    #[test]
    fn malformed_response_is_permanent() {
        let err = BoundaryError::MalformedResponse("not json".into());
        assert_eq!(err.error_class(), ErrorClass::Permanent);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn auth_errors_detected() {
        assert!(BoundaryError::from_status(401, "no key").is_auth_error());
        assert!(BoundaryError::from_status(403, "forbidden").is_auth_error());
        assert!(!BoundaryError::from_status(400, "bad").is_auth_error());
        assert!(!BoundaryError::from_status(503, "down").is_auth_error());
    }

    #[test]
    fn display_messages() {
        let err = BoundaryError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "request timed out after 1500ms");

        let err = BoundaryError::from_status(503, "overloaded");
        assert!(err.to_string().contains("HTTP 503"));
        assert!(err.to_string().contains("overloaded"));
        assert_eq!(err.status(), Some(503));
    }
}
