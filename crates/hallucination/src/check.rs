//! One "is this value in the source?" test per extracted field.
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validation::normalize::{parse_amount, parse_timestamp};
use validation::{codes, format_path, PathSegment, ValidationIssue};

use crate::source::SourceIndex;

/// How a field value is compared against the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Case-folded token sequence, punctuation ignored.
    Text,
    /// Digits only, all on one source line (check and account numbers).
    Digits,
    /// Numeric equality within a cent, whatever the printed format.
    Amount,
    /// Same calendar date in any common printed layout.
    Date,
}

impl MatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchMode::Text => "text",
            MatchMode::Digits => "digits",
            MatchMode::Amount => "amount",
            MatchMode::Date => "date",
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field (or a field of every element of an array) to trace back to the
/// source text.
///
/// Absent and `null` fields are skipped, as are values that cannot be
/// compared (booleans, objects).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCheck {
    field: String,
    item_field: Option<String>,
    mode: MatchMode,
}

impl FieldCheck {
    pub fn new(field: impl Into<String>, mode: MatchMode) -> Self {
        Self {
            field: field.into(),
            item_field: None,
            mode,
        }
    }

    /// Checks `item_field` of every element of the array at `field`.
    pub fn each(field: impl Into<String>, item_field: impl Into<String>, mode: MatchMode) -> Self {
        Self {
            field: field.into(),
            item_field: Some(item_field.into()),
            mode,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Issues for every unsupported value this check covers in `extracted`.
    pub fn run(&self, source: &SourceIndex, extracted: &Value) -> Vec<ValidationIssue> {
        let Some(value) = extracted.get(&self.field) else {
            return Vec::new();
        };
        match &self.item_field {
            None => self
                .unsupported(source, value, vec![PathSegment::from(self.field.as_str())])
                .into_iter()
                .collect(),
            Some(item_field) => {
                let Some(items) = value.as_array() else {
                    return Vec::new();
                };
                items
                    .iter()
                    .enumerate()
                    .filter_map(|(index, item)| {
                        let nested = item.get(item_field)?;
                        let path = vec![
                            PathSegment::from(self.field.as_str()),
                            PathSegment::from(index),
                            PathSegment::from(item_field.as_str()),
                        ];
                        self.unsupported(source, nested, path)
                    })
                    .collect()
            }
        }
    }

    fn unsupported(
        &self,
        source: &SourceIndex,
        value: &Value,
        path: Vec<PathSegment>,
    ) -> Option<ValidationIssue> {
        if is_supported(self.mode, source, value)? {
            return None;
        }
        Some(
            ValidationIssue::new(
                codes::UNSUPPORTED_VALUE,
                format!(
                    "value {value} for `{}` does not appear in the source text",
                    format_path(&path)
                ),
            )
            .with_path(path)
            .with_invalid_value(value.clone())
            .with_metadata("match", self.mode.as_str()),
        )
    }
}

/// `None` when the value cannot be compared in any mode.
fn is_supported(mode: MatchMode, source: &SourceIndex, value: &Value) -> Option<bool> {
    let text = match value {
        Value::String(text) if !text.trim().is_empty() => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };

    let supported = match mode {
        MatchMode::Text => {
            source.contains_text(&text)
                || value.as_f64().is_some_and(|n| source.contains_amount(n))
        }
        MatchMode::Digits => {
            if text.chars().any(|c| c.is_ascii_digit()) {
                source.contains_digits(&text)
            } else {
                source.contains_text(&text)
            }
        }
        MatchMode::Amount => match value.as_f64().or_else(|| parse_amount(&text)) {
            Some(amount) => source.contains_amount(amount),
            None => source.contains_text(&text),
        },
        MatchMode::Date => match parse_timestamp(&text) {
            Some(ts) => source.contains_date(ts.date()) || source.contains_text(&text),
            None => source.contains_text(&text),
        },
    };
    Some(supported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source() -> SourceIndex {
        SourceIndex::new(
            "CORNER CAFE\n03/05/2024\nLatte 4.50\nBagel 3.25\nSubtotal 7.75\nTotal: $8.37",
        )
    }

    #[test]
    fn supported_scalar_yields_nothing() {
        let check = FieldCheck::new("total", MatchMode::Amount);
        assert!(check.run(&source(), &json!({ "total": 8.37 })).is_empty());
        assert!(check.run(&source(), &json!({ "total": "$8.37" })).is_empty());
    }

    #[test]
    fn unsupported_scalar_is_reported_at_field() {
        let check = FieldCheck::new("total", MatchMode::Amount);
        let issues = check.run(&source(), &json!({ "total": 99.99 }));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code(), codes::UNSUPPORTED_VALUE);
        assert_eq!(issues[0].path(), &[PathSegment::from("total")]);
        assert_eq!(issues[0].invalid_value(), Some(&json!(99.99)));
        assert_eq!(issues[0].metadata()["match"], json!("amount"));
    }

    #[test]
    fn absent_null_and_uncomparable_fields_are_skipped() {
        let check = FieldCheck::new("tip", MatchMode::Amount);
        assert!(check.run(&source(), &json!({})).is_empty());
        assert!(check.run(&source(), &json!({ "tip": null })).is_empty());
        assert!(check.run(&source(), &json!({ "tip": true })).is_empty());
        assert!(check.run(&source(), &json!({ "tip": "" })).is_empty());
        assert!(check.run(&source(), &json!("not an object")).is_empty());
    }

    #[test]
    fn array_items_get_indexed_paths() {
        let check = FieldCheck::each("lineItems", "description", MatchMode::Text);
        let issues = check.run(
            &source(),
            &json!({ "lineItems": [
                { "description": "Latte" },
                { "description": "Croissant" },
                { "quantity": 1 }
            ]}),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path_string(), "lineItems[1].description");
    }

    #[test]
    fn dates_match_across_layouts() {
        let check = FieldCheck::new("date", MatchMode::Date);
        assert!(check.run(&source(), &json!({ "date": "2024-03-05" })).is_empty());
        assert_eq!(check.run(&source(), &json!({ "date": "2024-03-06" })).len(), 1);
    }

    #[test]
    fn digits_mode_falls_back_to_text() {
        let index = SourceIndex::new("Account ****");
        let check = FieldCheck::new("accountNumber", MatchMode::Digits);
        assert!(check.run(&index, &json!({ "accountNumber": "account" })).is_empty());
        assert_eq!(check.run(&index, &json!({ "accountNumber": "1234" })).len(), 1);
    }

    #[test]
    fn text_mode_accepts_numbers_printed_as_amounts() {
        let check = FieldCheck::new("memo", MatchMode::Text);
        assert!(check.run(&source(), &json!({ "memo": 7.75 })).is_empty());
    }
}
