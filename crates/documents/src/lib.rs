//! Document model and service boundaries for the docex pipeline.
//!
//! - [`Document`], [`OcrResult`], [`ExtractionRequest`], [`ExtractedRecord`]:
//!   the immutable values handed from stage to stage.
//! - [`DocumentKind`] and [`schemas`]: the built-in check and receipt target
//!   schemas, expressed with the `validation` crate so the same tree both
//!   describes the requested structure and validates the response.
//! - [`OcrService`] / [`ExtractionService`]: the two external boundaries, plus
//!   HTTP implementations in [`http`].
//!
//! ```rust
//! use documents::{schemas, DocumentKind, SchemaDescriptor};
//!
//! let schema = schemas::builtin_schema(&DocumentKind::Check).unwrap();
//! let descriptor = SchemaDescriptor::of(&schema);
//! assert_eq!(descriptor.name, "check");
//! assert_eq!(descriptor.schema["required"][0], "checkNumber");
//! ```

mod boundary;
mod error;
pub mod http;
mod kind;
pub mod schemas;
mod types;

pub use boundary::{ExtractionService, OcrService};
pub use error::DocumentError;
pub use http::{CompletionExtractionClient, HttpBoundaryConfig, VisionOcrClient};
pub use kind::DocumentKind;
pub use types::{
    source_text, BoundingBox, Document, ExtractedRecord, ExtractionRequest, ImageFormat,
    MediaType, OcrResult, SchemaDescriptor,
};
