//! The two external services the pipeline depends on.
//!
//! Both are opaque to the pipeline: it relies only on the shapes below and on
//! [`BoundaryError`]'s retry classification. Implementations must be safe to
//! call again after a failure, since the retry policy may repeat a call.
use std::sync::Arc;

use async_trait::async_trait;
use resilience::BoundaryError;

use crate::types::{Document, ExtractedRecord, ExtractionRequest, OcrResult};

/// Turns document bytes into per-page text.
#[async_trait]
pub trait OcrService: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        "ocr"
    }

    /// Recognises every page of `document`, in page order.
    async fn recognize(&self, document: &Document) -> Result<Vec<OcrResult>, BoundaryError>;
}

/// Turns source text plus a schema into a structured record.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        "extraction"
    }

    async fn extract(&self, request: &ExtractionRequest) -> Result<ExtractedRecord, BoundaryError>;
}

#[async_trait]
impl<T> OcrService for Arc<T>
where
    T: OcrService + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn recognize(&self, document: &Document) -> Result<Vec<OcrResult>, BoundaryError> {
        (**self).recognize(document).await
    }
}

#[async_trait]
impl<T> ExtractionService for Arc<T>
where
    T: ExtractionService + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn extract(&self, request: &ExtractionRequest) -> Result<ExtractedRecord, BoundaryError> {
        (**self).extract(request).await
    }
}
