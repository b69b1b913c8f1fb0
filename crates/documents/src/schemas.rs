//! Built-in target schemas for checks and receipts.
//!
//! Field names are the camelCase keys the extraction service is asked to
//! produce. Optionality is a property of the schema, so callers who need a
//! stricter variant (for example a mandatory `currency`) build their own and
//! register it in place of these.
use serde_json::{Map, Value};
use validation::{
    ArraySchema, CurrencyRule, NumberRule, ObjectSchema, StringFormat, StringRule, TimestampRule,
};

use crate::kind::DocumentKind;

/// Tolerance used when comparing monetary amounts.
pub const AMOUNT_EPSILON: f64 = 0.005;

/// Schema for a bank check.
pub fn check_schema() -> ObjectSchema {
    ObjectSchema::new("check")
        .describe_as("A bank check")
        .required("checkNumber", StringRule::non_empty().max_len(20))
        .with_field_description("Check number printed on the check")
        .required("payee", StringRule::non_empty())
        .with_field_description("Name on the 'Pay to the order of' line")
        .required("amount", NumberRule::new().min(0.0))
        .with_field_description("Numeric amount of the check")
        .optional("date", TimestampRule::date_only())
        .optional("bankName", StringRule::non_empty())
        .optional(
            "routingNumber",
            StringRule::new().exact_len(9).format(StringFormat::Digits),
        )
        .with_field_description("Nine-digit ABA routing number")
        .optional("accountNumber", StringRule::non_empty())
        .optional("memo", StringRule::new())
        .optional("currency", CurrencyRule::new())
}

fn line_item_schema() -> ObjectSchema {
    ObjectSchema::new("line_item")
        .required("description", StringRule::non_empty())
        .optional("quantity", NumberRule::new().min(0.0))
        .optional("unitPrice", NumberRule::new())
        .optional("totalPrice", NumberRule::new())
}

/// Schema for a retail receipt.
///
/// Cross-field rule: `subtotal` must not exceed `total`.
pub fn receipt_schema() -> ObjectSchema {
    ObjectSchema::new("receipt")
        .describe_as("A retail or restaurant receipt")
        .required("merchantName", StringRule::non_empty())
        .required("total", NumberRule::new().min(0.0))
        .with_field_description("Grand total paid")
        .optional("subtotal", NumberRule::new().min(0.0))
        .optional("tax", NumberRule::new().min(0.0))
        .optional("tip", NumberRule::new().min(0.0))
        .optional("currency", CurrencyRule::new())
        .optional("date", TimestampRule::new())
        .optional("paymentMethod", StringRule::non_empty())
        .optional("lineItems", ArraySchema::of(line_item_schema()))
        .refine("subtotal_within_total", subtotal_within_total)
}

fn subtotal_within_total(receipt: &Map<String, Value>) -> Result<(), String> {
    let subtotal = receipt.get("subtotal").and_then(Value::as_f64);
    let total = receipt.get("total").and_then(Value::as_f64);
    match (subtotal, total) {
        (Some(subtotal), Some(total)) if subtotal > total + AMOUNT_EPSILON => Err(format!(
            "subtotal {subtotal} must not exceed total {total}"
        )),
        _ => Ok(()),
    }
}

/// Built-in schema for `kind`, if there is one.
pub fn builtin_schema(kind: &DocumentKind) -> Option<ObjectSchema> {
    match kind {
        DocumentKind::Check => Some(check_schema()),
        DocumentKind::Receipt => Some(receipt_schema()),
        DocumentKind::Other(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use validation::{codes, ValidationEngine, Validator};

    #[test]
    fn check_scenario_passes() {
        let engine = ValidationEngine::new(check_schema());
        let record = json!({
            "checkNumber": "12345",
            "payee": "John Smith",
            "amount": 1234.56
        });
        assert_eq!(engine.validate(record.clone()).unwrap(), record);
    }

    #[test]
    fn check_reports_each_missing_field() {
        let err = ValidationEngine::new(check_schema())
            .validate(json!({ "routingNumber": "12345" }))
            .unwrap_err();
        let found: Vec<(String, &str)> = err
            .issues()
            .iter()
            .map(|i| (i.path_string(), i.code()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("checkNumber".to_owned(), codes::REQUIRED),
                ("payee".to_owned(), codes::REQUIRED),
                ("amount".to_owned(), codes::REQUIRED),
                ("routingNumber".to_owned(), codes::TOO_SHORT),
            ]
        );
    }

    #[test]
    fn receipt_line_item_paths() {
        let err = ValidationEngine::new(receipt_schema())
            .validate(json!({
                "merchantName": "Corner Cafe",
                "total": 12.5,
                "lineItems": [
                    { "description": "Latte", "totalPrice": 4.5 },
                    { "description": "Bagel", "quantity": -1 }
                ]
            }))
            .unwrap_err();
        assert_eq!(err.issues().len(), 1);
        let issue = &err.issues()[0];
        assert_eq!(issue.path_string(), "lineItems[1].quantity");
        assert_eq!(issue.code(), codes::TOO_SMALL);
        assert_eq!(issue.invalid_value(), Some(&json!(-1)));
    }

    #[test]
    fn receipt_subtotal_rule_attaches_at_root() {
        let err = ValidationEngine::new(receipt_schema())
            .validate(json!({ "merchantName": "Shop", "total": 10.0, "subtotal": 12.0 }))
            .unwrap_err();
        assert_eq!(err.issues().len(), 1);
        assert!(err.issues()[0].path().is_empty());
        assert_eq!(err.issues()[0].code(), codes::CUSTOM);

        let ok = json!({ "merchantName": "Shop", "total": 10.0, "subtotal": 10.004 });
        assert!(receipt_schema().check(&ok).is_empty());
    }

    #[test]
    fn currency_is_optional_in_builtins() {
        let receipt = json!({ "merchantName": "Shop", "total": 1.0 });
        assert!(receipt_schema().check(&receipt).is_empty());
        let receipt = json!({ "merchantName": "Shop", "total": 1.0, "currency": "dollars" });
        assert_eq!(receipt_schema().check(&receipt)[0].code(), codes::INVALID_FORMAT);
    }

    #[test]
    fn normalization_cleans_extractor_output() {
        let engine = ValidationEngine::new(receipt_schema());
        let cleaned = engine
            .normalize_and_validate(json!({
                "merchantName": " Corner Cafe ",
                "total": "$46.41",
                "currency": "usd",
                "date": "March 5, 2024"
            }))
            .unwrap();
        assert_eq!(cleaned["merchantName"], "Corner Cafe");
        assert_eq!(cleaned["total"], json!(46.41));
        assert_eq!(cleaned["currency"], "USD");
        assert_eq!(cleaned["date"], "2024-03-05");
    }

    #[test]
    fn builtins_by_kind() {
        assert_eq!(
            builtin_schema(&DocumentKind::Check).unwrap().schema_name(),
            "check"
        );
        assert_eq!(
            builtin_schema(&DocumentKind::Receipt).unwrap().schema_name(),
            "receipt"
        );
        assert!(builtin_schema(&DocumentKind::Other("invoice".into())).is_none());
    }

    #[test]
    fn descriptor_lists_required_fields() {
        let described = check_schema().describe();
        assert_eq!(described["required"], json!(["checkNumber", "payee", "amount"]));
        assert_eq!(
            described["properties"]["routingNumber"]["pattern"],
            json!("^[0-9]*$")
        );
    }
}
