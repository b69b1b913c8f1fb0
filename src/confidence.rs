//! Combining per-stage confidences into one overall score.
use documents::OcrResult;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How the OCR and extraction confidences are combined.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "rule")]
pub enum AggregationRule {
    /// Plain mean of the two stages.
    #[default]
    Mean,
    /// Weighted mean. Weights need not sum to one; they are normalized.
    Weighted { ocr: f64, extraction: f64 },
}

/// Per-stage and overall confidence, each in `0..=1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceScore {
    pub ocr: f64,
    pub extraction: f64,
    pub overall: f64,
    /// Set when an input was NaN or outside `0..=1` and the score failed
    /// closed to zero.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub integrity_warning: bool,
}

/// Aggregates stage confidences.
///
/// Never fails: bad input yields an overall score of `0` with
/// [`ConfidenceScore::integrity_warning`] set, and whether that blocks
/// anything is up to the caller.
///
/// ```rust
/// use docex::ConfidenceModel;
///
/// let model = ConfidenceModel::default();
/// assert_eq!(model.aggregate(0.9, 0.8).overall, 0.85);
///
/// let score = model.aggregate(f64::NAN, 0.5);
/// assert_eq!(score.overall, 0.0);
/// assert!(score.integrity_warning);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfidenceModel {
    rule: AggregationRule,
}

impl ConfidenceModel {
    pub fn new(rule: AggregationRule) -> Self {
        Self { rule }
    }

    pub fn rule(&self) -> AggregationRule {
        self.rule
    }

    pub fn aggregate(&self, ocr: f64, extraction: f64) -> ConfidenceScore {
        if !in_unit_range(ocr) || !in_unit_range(extraction) {
            warn!(ocr, extraction, "confidence_integrity_warning");
            return ConfidenceScore {
                ocr: sanitize(ocr),
                extraction: sanitize(extraction),
                overall: 0.0,
                integrity_warning: true,
            };
        }

        let overall = match self.rule {
            AggregationRule::Mean => (ocr + extraction) / 2.0,
            AggregationRule::Weighted {
                ocr: ocr_weight,
                extraction: extraction_weight,
            } => {
                let total = ocr_weight + extraction_weight;
                if !total.is_finite() || total <= 0.0 || ocr_weight < 0.0 || extraction_weight < 0.0
                {
                    warn!(ocr_weight, extraction_weight, "confidence_integrity_warning");
                    return ConfidenceScore {
                        ocr,
                        extraction,
                        overall: 0.0,
                        integrity_warning: true,
                    };
                }
                (ocr * ocr_weight + extraction * extraction_weight) / total
            }
        };

        ConfidenceScore {
            ocr,
            extraction,
            overall: round2(overall).clamp(0.0, 1.0),
            integrity_warning: false,
        }
    }
}

/// Mean page confidence; `0` for a document with no pages.
///
/// Out-of-range page values are passed through so that
/// [`ConfidenceModel::aggregate`] can flag them.
pub fn ocr_confidence(pages: &[OcrResult]) -> f64 {
    if pages.is_empty() {
        return 0.0;
    }
    pages.iter().map(|page| page.confidence).sum::<f64>() / pages.len() as f64
}

fn in_unit_range(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

fn sanitize(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
