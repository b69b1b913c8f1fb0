//! Umbrella crate for docex: structured data from document images.
//!
//! A [`DocumentProcessor`] runs one document through five stages, strictly in
//! order:
//!
//! 1. OCR through an [`OcrService`], wrapped in a [`RetryPolicy`].
//! 2. Extraction through an [`ExtractionService`], given the joined page text
//!    and the schema registered for the document's [`DocumentKind`].
//! 3. Normalization and validation with a [`ValidationEngine`]; failures carry
//!    every issue with its full nested path.
//! 4. A hallucination check that looks for each extracted value in the OCR
//!    text.
//! 5. Confidence aggregation with a [`ConfidenceModel`].
//!
//! Batches run documents concurrently and return results in submission
//! order; one document failing never affects the others.
//!
//! The stage crates are re-exported so callers need only this one:
//! [`resilience`], [`validation`], [`documents`] and [`hallucination`].

pub mod config;
mod confidence;
mod error;
mod observer;
mod pipeline;
mod registry;
mod state;

pub use documents;
pub use hallucination;
pub use resilience;
pub use validation;

pub use config::{ConfigLoadError, DocexConfig};
pub use confidence::{ocr_confidence, AggregationRule, ConfidenceModel, ConfidenceScore};
pub use documents::{
    Document, DocumentKind, ExtractedRecord, ExtractionRequest, ExtractionService, MediaType,
    OcrResult, OcrService,
};
pub use error::PipelineError;
pub use hallucination::{HallucinationDetector, HallucinationWarning};
pub use observer::{NoopObserver, PipelineObserver};
pub use pipeline::{
    DocumentProcessor, DocumentProcessorBuilder, HallucinationPolicy, ProcessingResult,
    DEFAULT_MAX_CONCURRENCY,
};
pub use registry::{KindProfile, KindRegistry};
pub use resilience::{BoundaryError, RetryConfig, RetryError, RetryPolicy};
pub use state::{PipelineState, Stage};
pub use validation::{ValidationEngine, ValidationError, ValidationIssue};
