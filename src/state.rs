//! Pipeline states and stages.
use std::fmt;

use serde::{Deserialize, Serialize};

/// A stage that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ocr,
    Extraction,
    Validation,
    Hallucination,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Ocr => "ocr",
            Stage::Extraction => "extraction",
            Stage::Validation => "validation",
            Stage::Hallucination => "hallucination",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a single document's run currently is.
///
/// ```text
/// Received -> OcrInProgress -> OcrComplete -> ExtractionInProgress
///   -> ExtractionComplete -> Validating -> HallucinationCheck -> Done
/// ```
///
/// Any in-progress state may move to [`Failed`](PipelineState::Failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "stage")]
pub enum PipelineState {
    Received,
    OcrInProgress,
    OcrComplete,
    ExtractionInProgress,
    ExtractionComplete,
    Validating,
    HallucinationCheck,
    Done,
    Failed(Stage),
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed(_))
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Received, OcrInProgress)
            | (OcrInProgress, OcrComplete)
            | (OcrComplete, ExtractionInProgress)
            | (ExtractionInProgress, ExtractionComplete)
            | (ExtractionComplete, Validating)
            | (Validating, HallucinationCheck)
            | (HallucinationCheck, Done) => true,
            (state, Failed(_)) => !state.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Received => f.write_str("received"),
            PipelineState::OcrInProgress => f.write_str("ocr_in_progress"),
            PipelineState::OcrComplete => f.write_str("ocr_complete"),
            PipelineState::ExtractionInProgress => f.write_str("extraction_in_progress"),
            PipelineState::ExtractionComplete => f.write_str("extraction_complete"),
            PipelineState::Validating => f.write_str("validating"),
            PipelineState::HallucinationCheck => f.write_str("hallucination_check"),
            PipelineState::Done => f.write_str("done"),
            PipelineState::Failed(stage) => write!(f, "failed({stage})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_linear() {
        use PipelineState::*;
        let path = [
            Received,
            OcrInProgress,
            OcrComplete,
            ExtractionInProgress,
            ExtractionComplete,
            Validating,
            HallucinationCheck,
            Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(!Received.can_advance_to(Done));
        assert!(!Validating.can_advance_to(OcrInProgress));
    }

    #[test]
    fn terminal_states_do_not_fail_again() {
        assert!(PipelineState::OcrInProgress.can_advance_to(PipelineState::Failed(Stage::Ocr)));
        assert!(!PipelineState::Done.can_advance_to(PipelineState::Failed(Stage::Ocr)));
        assert!(
            !PipelineState::Failed(Stage::Ocr).can_advance_to(PipelineState::Failed(Stage::Ocr))
        );
        assert_eq!(PipelineState::Failed(Stage::Validation).to_string(), "failed(validation)");
    }
}
