use serde::{Deserialize, Serialize};
use thiserror::Error;
use validation::ValidationIssue;

/// Non-fatal finding: extracted values with no support in the source text.
///
/// Attached to a successful result by default; a pipeline configured to
/// reject hallucinations returns it as the failure instead.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error(
    "{} extracted value(s) not found in source text: {}",
    .issues.len(),
    .issues
        .iter()
        .map(ValidationIssue::path_string)
        .collect::<Vec<_>>()
        .join(", ")
)]
pub struct HallucinationWarning {
    issues: Vec<ValidationIssue>,
}

impl HallucinationWarning {
    /// `None` when there is nothing to warn about.
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Option<Self> {
        if issues.is_empty() {
            None
        } else {
            Some(Self { issues })
        }
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Dotted paths of the unsupported fields, in detection order.
    pub fn unsupported_fields(&self) -> Vec<String> {
        self.issues.iter().map(ValidationIssue::path_string).collect()
    }
}
