//! The error returned when a value fails validation.
use serde::Serialize;
use thiserror::Error;

use crate::issue::ValidationIssue;
use crate::path::PathSegment;

/// Every issue found in one validation pass over `original_value`.
///
/// A `ValidationError` always holds at least one issue; the only constructor,
/// [`ValidationError::new`], returns `None` for an empty list.
///
/// # Examples
///
/// ```rust
/// use validation::{codes, ValidationError, ValidationIssue};
///
/// let issues = vec![
///     ValidationIssue::new(codes::REQUIRED, "field is required").at("payee"),
///     ValidationIssue::new(codes::TOO_SMALL, "must be at least 0").at("amount"),
/// ];
/// let err = ValidationError::new(issues, "raw input").unwrap();
///
/// assert_eq!(err.issues().len(), 2);
/// assert!(err.summary().starts_with("2 validation issues"));
/// assert!(ValidationError::new(Vec::new(), ()).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{summary}")]
pub struct ValidationError<T> {
    summary: String,
    issues: Vec<ValidationIssue>,
    original_value: T,
}

impl<T> ValidationError<T> {
    /// Builds an error from a non-empty issue list.
    pub fn new(issues: Vec<ValidationIssue>, original_value: T) -> Option<Self> {
        if issues.is_empty() {
            return None;
        }
        Some(Self {
            summary: summarize(&issues),
            issues,
            original_value,
        })
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn original_value(&self) -> &T {
        &self.original_value
    }

    pub fn into_original_value(self) -> T {
        self.original_value
    }

    pub fn into_issues(self) -> Vec<ValidationIssue> {
        self.issues
    }

    /// Issues re-addressed under `segment`, for a parent validator that
    /// delegated to the validator which produced this error.
    pub fn nested_in(self, segment: impl Into<PathSegment>, validator: &str) -> Vec<ValidationIssue> {
        let segment = segment.into();
        self.issues
            .into_iter()
            .map(|issue| issue.nested_in(segment.clone(), validator))
            .collect()
    }

    /// Swaps the carried value, keeping the issues.
    pub fn map_value<U>(self, f: impl FnOnce(T) -> U) -> ValidationError<U> {
        ValidationError {
            summary: self.summary,
            issues: self.issues,
            original_value: f(self.original_value),
        }
    }

    /// Dotted paths of every failing location, in issue order.
    pub fn failing_paths(&self) -> Vec<String> {
        self.issues.iter().map(ValidationIssue::path_string).collect()
    }
}

fn summarize(issues: &[ValidationIssue]) -> String {
    let plural = if issues.len() == 1 { "" } else { "s" };
    let details: Vec<String> = issues.iter().map(ToString::to_string).collect();
    format!(
        "{} validation issue{plural}: {}",
        issues.len(),
        details.join("; ")
    )
}
