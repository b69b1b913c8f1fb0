//! Terminal pipeline failures.
//!
//! | Error | Stage | Carries |
//! |-------|-------|---------|
//! | [`Ocr`](PipelineError::Ocr) | `ocr` | last boundary error after retries |
//! | [`Extraction`](PipelineError::Extraction) | `extraction` | last boundary error after retries |
//! | [`UnsupportedKind`](PipelineError::UnsupportedKind) | `extraction` (reported as `input`) | the kind with no registered schema |
//! | [`Validation`](PipelineError::Validation) | `validation` | the full issue list |
//! | [`Hallucination`](PipelineError::Hallucination) | `hallucination` | unsupported fields (reject policy only) |
use documents::DocumentKind;
use hallucination::HallucinationWarning;
use resilience::{BoundaryError, RetryError};
use serde_json::Value;
use thiserror::Error;
use validation::{ValidationError, ValidationIssue};

use crate::state::Stage;

/// Why a document did not reach `Done`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("ocr stage failed: {0}")]
    Ocr(RetryError<BoundaryError>),

    #[error("extraction stage failed: {0}")]
    Extraction(RetryError<BoundaryError>),

    /// Raised before OCR runs, so no service is called. The run ends in
    /// `Failed(extraction)` since extraction is the first stage that needs a
    /// schema; [`stage_label`](PipelineError::stage_label) reports it as
    /// `input`.
    #[error("no schema registered for document kind `{0}`; rejected before ocr")]
    UnsupportedKind(DocumentKind),

    #[error("validation stage failed: {0}")]
    Validation(ValidationError<Value>),

    #[error("hallucination stage failed: {0}")]
    Hallucination(HallucinationWarning),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Ocr(_) => Stage::Ocr,
            PipelineError::Extraction(_) | PipelineError::UnsupportedKind(_) => Stage::Extraction,
            PipelineError::Validation(_) => Stage::Validation,
            PipelineError::Hallucination(_) => Stage::Hallucination,
        }
    }

    /// Stage name for reports: `input` for failures raised before any
    /// service is called, otherwise the [`stage`](Self::stage) name.
    pub fn stage_label(&self) -> &'static str {
        match self {
            PipelineError::UnsupportedKind(_) => "input",
            other => other.stage().as_str(),
        }
    }

    /// The boundary error behind a service failure.
    pub fn boundary_error(&self) -> Option<&BoundaryError> {
        match self {
            PipelineError::Ocr(err) | PipelineError::Extraction(err) => Some(err.last_error()),
            _ => None,
        }
    }

    /// Structured issues for validation and hallucination failures.
    pub fn issues(&self) -> Option<&[ValidationIssue]> {
        match self {
            PipelineError::Validation(err) => Some(err.issues()),
            PipelineError::Hallucination(warning) => Some(warning.issues()),
            _ => None,
        }
    }
}
