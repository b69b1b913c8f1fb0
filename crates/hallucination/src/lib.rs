//! Hallucination detection: does each extracted value actually appear in the
//! OCR source text?
//!
//! Detectors are chosen by [`DocumentKind`](documents::DocumentKind) through
//! [`detector_for`]; kinds without a detector are simply not checked. Each
//! detector is a list of [`FieldCheck`]s, and every check compares one field in
//! a [`MatchMode`] tolerant of how documents print values (`$1,234.56` matches
//! `1234.56`, `03/05/2024` matches `2024-03-05`). Findings are
//! [`ValidationIssue`](validation::ValidationIssue)s with code
//! `unsupported_value` at the field's path.
//!
//! ```rust
//! use hallucination::detector_for;
//! use documents::DocumentKind;
//! use serde_json::json;
//!
//! let detector = detector_for(&DocumentKind::Receipt).unwrap();
//! let issues = detector.detect("Total: $46.41", &json!({ "total": 99.99 }));
//! assert_eq!(issues[0].code(), "unsupported_value");
//! assert_eq!(issues[0].path_string(), "total");
//! ```

mod check;
mod detector;
mod source;
mod warning;

pub use check::{FieldCheck, MatchMode};
pub use detector::{detector_for, CheckDetector, FieldDetector, HallucinationDetector, ReceiptDetector};
pub use source::{SourceIndex, AMOUNT_TOLERANCE};
pub use warning::HallucinationWarning;
