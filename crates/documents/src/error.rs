//! Errors raised while building documents and boundary clients.
//!
//! Failures from the external services themselves are
//! [`BoundaryError`](resilience::BoundaryError)s; this module only covers what
//! happens before a request is sent.
//!
//! | Error | Description |
//! |-------|-------------|
//! | [`Io`](DocumentError::Io) | File could not be read |
//! | [`EmptyContent`](DocumentError::EmptyContent) | Document has zero bytes |
//! | [`UnsupportedMediaType`](DocumentError::UnsupportedMediaType) | Neither magic bytes nor extension identify an image or PDF |
//! | [`InvalidKind`](DocumentError::InvalidKind) | Document kind string is empty |
//! | [`HttpClient`](DocumentError::HttpClient) | HTTP client could not be configured |
use thiserror::Error;

/// Errors raised before any service call is made.
///
/// ```rust
/// use documents::{Document, DocumentError};
///
/// let err = Document::sniff(b"plain text".to_vec()).unwrap_err();
/// assert!(matches!(err, DocumentError::UnsupportedMediaType(_)));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DocumentError {
    /// Reading the document from disk failed.
    #[error("failed to read {path}: {message}")]
    Io {
        /// Path that was being read.
        path: String,
        /// Underlying I/O error text.
        message: String,
    },

    /// The document has no bytes.
    #[error("document content is empty")]
    EmptyContent,

    /// The content is not a recognised image or PDF.
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// A document kind name was empty.
    #[error("invalid document kind: {0:?}")]
    InvalidKind(String),

    /// The HTTP client for a boundary could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}
