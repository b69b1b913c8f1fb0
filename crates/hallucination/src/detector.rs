use std::sync::Arc;

use documents::DocumentKind;
use serde_json::Value;
use tracing::debug;
use validation::{ValidationIssue, VALIDATOR_METADATA_KEY};

use crate::check::{FieldCheck, MatchMode};
use crate::source::SourceIndex;

/// Flags extracted values that cannot be traced back to the OCR text.
///
/// Implementations only declare their [`FieldCheck`]s; the default
/// [`detect`](Self::detect) indexes the source once and runs them all. An
/// empty result means nothing unsupported was found.
pub trait HallucinationDetector: Send + Sync {
    /// Name recorded in issue metadata.
    fn name(&self) -> &str;

    fn checks(&self) -> &[FieldCheck];

    fn detect(&self, source_text: &str, extracted: &Value) -> Vec<ValidationIssue> {
        let index = SourceIndex::new(source_text);
        let issues: Vec<ValidationIssue> = self
            .checks()
            .iter()
            .flat_map(|check| check.run(&index, extracted))
            .map(|issue| issue.with_metadata(VALIDATOR_METADATA_KEY, self.name()))
            .collect();
        debug!(
            detector = self.name(),
            checks = self.checks().len(),
            unsupported = issues.len(),
            "hallucination_scan"
        );
        issues
    }
}

/// Checks for bank checks.
#[derive(Debug, Clone)]
pub struct CheckDetector {
    checks: Vec<FieldCheck>,
}

impl Default for CheckDetector {
    fn default() -> Self {
        Self {
            checks: vec![
                FieldCheck::new("checkNumber", MatchMode::Digits),
                FieldCheck::new("payee", MatchMode::Text),
                FieldCheck::new("amount", MatchMode::Amount),
                FieldCheck::new("date", MatchMode::Date),
                FieldCheck::new("bankName", MatchMode::Text),
                FieldCheck::new("routingNumber", MatchMode::Digits),
                FieldCheck::new("accountNumber", MatchMode::Digits),
            ],
        }
    }
}

impl HallucinationDetector for CheckDetector {
    fn name(&self) -> &str {
        "check_hallucination"
    }

    fn checks(&self) -> &[FieldCheck] {
        &self.checks
    }
}

/// Checks for receipts, including every line item.
#[derive(Debug, Clone)]
pub struct ReceiptDetector {
    checks: Vec<FieldCheck>,
}

impl Default for ReceiptDetector {
    fn default() -> Self {
        Self {
            checks: vec![
                FieldCheck::new("merchantName", MatchMode::Text),
                FieldCheck::new("total", MatchMode::Amount),
                FieldCheck::new("subtotal", MatchMode::Amount),
                FieldCheck::new("tax", MatchMode::Amount),
                FieldCheck::new("tip", MatchMode::Amount),
                FieldCheck::new("date", MatchMode::Date),
                FieldCheck::each("lineItems", "description", MatchMode::Text),
                FieldCheck::each("lineItems", "unitPrice", MatchMode::Amount),
                FieldCheck::each("lineItems", "totalPrice", MatchMode::Amount),
            ],
        }
    }
}

impl HallucinationDetector for ReceiptDetector {
    fn name(&self) -> &str {
        "receipt_hallucination"
    }

    fn checks(&self) -> &[FieldCheck] {
        &self.checks
    }
}

/// Detector assembled from caller-supplied checks, for custom kinds.
///
/// ```rust
/// use hallucination::{FieldCheck, FieldDetector, HallucinationDetector, MatchMode};
/// use serde_json::json;
///
/// let detector = FieldDetector::new("invoice_hallucination")
///     .check(FieldCheck::new("invoiceNumber", MatchMode::Digits));
/// let issues = detector.detect("Invoice INV-0042", &json!({ "invoiceNumber": "0043" }));
/// assert_eq!(issues.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct FieldDetector {
    name: String,
    checks: Vec<FieldCheck>,
}

impl FieldDetector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            checks: Vec::new(),
        }
    }

    pub fn check(mut self, check: FieldCheck) -> Self {
        self.checks.push(check);
        self
    }
}

impl HallucinationDetector for FieldDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn checks(&self) -> &[FieldCheck] {
        &self.checks
    }
}

/// Built-in detector for `kind`; `None` for kinds without one.
pub fn detector_for(kind: &DocumentKind) -> Option<Arc<dyn HallucinationDetector>> {
    match kind {
        DocumentKind::Check => Some(Arc::new(CheckDetector::default())),
        DocumentKind::Receipt => Some(Arc::new(ReceiptDetector::default())),
        DocumentKind::Other(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use validation::{codes, PathSegment};

    const CHECK_TEXT: &str = "Check #12345\nPay to: John Smith\nAmount: $1,234.56";

    #[test]
    fn receipt_total_mismatch() {
        let detector = ReceiptDetector::default();
        let issues = detector.detect("Total: $46.41", &json!({ "total": 99.99 }));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code(), codes::UNSUPPORTED_VALUE);
        assert_eq!(issues[0].path(), &[PathSegment::from("total")]);
        assert_eq!(issues[0].validator(), Some("receipt_hallucination"));

        assert!(detector
            .detect("Total: $46.41", &json!({ "total": 46.41 }))
            .is_empty());
    }

    #[test]
    fn check_scenario_is_fully_supported() {
        let extracted = json!({
            "checkNumber": "12345",
            "payee": "John Smith",
            "amount": 1234.56
        });
        assert!(CheckDetector::default().detect(CHECK_TEXT, &extracted).is_empty());
    }

    #[test]
    fn check_flags_each_invented_field() {
        let extracted = json!({
            "checkNumber": "54321",
            "payee": "Jane Doe",
            "amount": 1234.56,
            "bankName": "First National"
        });
        let paths: Vec<String> = CheckDetector::default()
            .detect(CHECK_TEXT, &extracted)
            .iter()
            .map(|i| i.path_string())
            .collect();
        assert_eq!(paths, vec!["checkNumber", "payee", "bankName"]);
    }

    #[test]
    fn partial_account_numbers_are_flagged() {
        let text = format!("{CHECK_TEXT}\nRouting 021000021 Acct 9912345678");
        let extracted = json!({
            "checkNumber": "123",
            "payee": "John Smith",
            "amount": 1234.56,
            "routingNumber": "021000021",
            "accountNumber": "1234"
        });
        let paths: Vec<String> = CheckDetector::default()
            .detect(&text, &extracted)
            .iter()
            .map(|i| i.path_string())
            .collect();
        assert_eq!(paths, vec!["checkNumber", "accountNumber"]);
    }

    #[test]
    fn receipt_line_items_are_traced() {
        let text = "CORNER CAFE\nLatte 4.50\nBagel 3.25\nTotal 7.75";
        let extracted = json!({
            "merchantName": "Corner Cafe",
            "total": 7.75,
            "lineItems": [
                { "description": "Latte", "totalPrice": 4.5 },
                { "description": "Bagel", "totalPrice": 3.52 }
            ]
        });
        let issues = ReceiptDetector::default().detect(text, &extracted);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path_string(), "lineItems[1].totalPrice");
    }

    #[test]
    fn factory_covers_builtin_kinds_only() {
        assert_eq!(
            detector_for(&DocumentKind::Check).unwrap().name(),
            "check_hallucination"
        );
        assert_eq!(
            detector_for(&DocumentKind::Receipt).unwrap().name(),
            "receipt_hallucination"
        );
        assert!(detector_for(&DocumentKind::Other("invoice".into())).is_none());
    }
}
