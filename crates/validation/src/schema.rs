//! Composable validators over `serde_json::Value`.
//!
//! Document schemas are built from these rules and serve two purposes: the
//! [`describe`](Validator::describe) output is the JSON-Schema-like descriptor
//! sent to the extraction service, and the same tree validates what comes back.
//!
//! ```rust
//! use validation::{ArraySchema, NumberRule, ObjectSchema, StringRule, ValidationEngine};
//! use serde_json::json;
//!
//! let item = ObjectSchema::new("line_item")
//!     .required("description", StringRule::non_empty())
//!     .optional("totalPrice", NumberRule::new().min(0.0));
//! let receipt = ObjectSchema::new("receipt")
//!     .required("total", NumberRule::new().min(0.0))
//!     .optional("lineItems", ArraySchema::of(item));
//!
//! let engine = ValidationEngine::new(receipt);
//! let err = engine
//!     .validate(json!({ "total": 10, "lineItems": [{ "description": "" }] }))
//!     .unwrap_err();
//! assert_eq!(err.failing_paths(), vec!["lineItems[0].description"]);
//! ```
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Map, Number, Value};

use crate::issue::{codes, ValidationIssue};
use crate::normalize::{canonical_currency, parse_amount, parse_timestamp};
use crate::validator::{Issues, Validator};

/// Short JSON type name used in `invalid_type` messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn invalid_type(expected: &str, value: &Value) -> ValidationIssue {
    ValidationIssue::new(
        codes::INVALID_TYPE,
        format!("expected {expected}, received {}", json_type_name(value)),
    )
    .with_invalid_value(value.clone())
    .with_metadata("expected", expected)
}

type RuleFn = dyn Fn(&Map<String, Value>) -> Result<(), String> + Send + Sync;

/// A cross-field rule evaluated once every declared field has passed.
#[derive(Clone)]
struct Refinement {
    name: String,
    rule: Arc<RuleFn>,
}

impl fmt::Debug for Refinement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refinement").field("name", &self.name).finish()
    }
}

#[derive(Clone)]
struct FieldSpec {
    name: String,
    validator: Arc<dyn Validator<Value>>,
    required: bool,
    description: Option<String>,
}

/// A JSON object with declared fields.
///
/// Missing and `null` fields are treated alike: an issue with code
/// `required` for required fields, nothing for optional ones. Nested issues
/// are re-addressed under the field name.
#[derive(Clone)]
pub struct ObjectSchema {
    name: String,
    description: Option<String>,
    fields: Vec<FieldSpec>,
    strict: bool,
    refinements: Vec<Refinement>,
}

impl fmt::Debug for ObjectSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields.iter().map(|f| f.name.as_str()).collect();
        f.debug_struct("ObjectSchema")
            .field("name", &self.name)
            .field("fields", &fields)
            .field("strict", &self.strict)
            .field("refinements", &self.refinements)
            .finish()
    }
}

impl ObjectSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
            strict: false,
            refinements: Vec::new(),
        }
    }

    pub fn describe_as(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declares a field that must be present and non-null.
    pub fn required(self, field: impl Into<String>, validator: impl Validator<Value> + 'static) -> Self {
        self.push_field(field.into(), Arc::new(validator), true)
    }

    /// Declares a field that may be absent or null.
    pub fn optional(self, field: impl Into<String>, validator: impl Validator<Value> + 'static) -> Self {
        self.push_field(field.into(), Arc::new(validator), false)
    }

    /// Declares a field with an already shared validator.
    pub fn field_shared(
        self,
        field: impl Into<String>,
        validator: Arc<dyn Validator<Value>>,
        required: bool,
    ) -> Self {
        self.push_field(field.into(), validator, required)
    }

    /// Attaches a description to the most recently declared field.
    pub fn with_field_description(mut self, description: impl Into<String>) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.description = Some(description.into());
        }
        self
    }

    /// Rejects keys that were not declared.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Adds a cross-field rule.
    ///
    /// Rules run only when every declared field passed, and report at the
    /// object's own path with code `custom`.
    pub fn refine<F>(mut self, name: impl Into<String>, rule: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.refinements.push(Refinement {
            name: name.into(),
            rule: Arc::new(rule),
        });
        self
    }

    pub fn schema_name(&self) -> &str {
        &self.name
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
    }

    fn push_field(mut self, name: String, validator: Arc<dyn Validator<Value>>, required: bool) -> Self {
        self.fields.retain(|f| f.name != name);
        self.fields.push(FieldSpec {
            name,
            validator,
            required,
            description: None,
        });
        self
    }
}

impl Validator<Value> for ObjectSchema {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, value: &Value) -> Vec<ValidationIssue> {
        let Some(object) = value.as_object() else {
            return vec![invalid_type("object", value)];
        };

        let mut issues = Issues::new();
        for field in &self.fields {
            match object.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        issues.push(
                            ValidationIssue::new(codes::REQUIRED, "field is required")
                                .at(field.name.as_str()),
                        );
                    }
                }
                Some(present) => {
                    issues.field(field.name.as_str(), present, &field.validator);
                }
            }
        }

        if self.strict {
            let declared: BTreeSet<&str> = self.field_names().collect();
            for key in object.keys().filter(|k| !declared.contains(k.as_str())) {
                issues.push(
                    ValidationIssue::new(codes::UNRECOGNIZED_KEY, format!("unrecognized key `{key}`"))
                        .at(key.as_str())
                        .with_invalid_value(object[key].clone()),
                );
            }
        }

        if issues.is_empty() {
            for refinement in &self.refinements {
                if let Err(message) = (refinement.rule)(object) {
                    issues.push(
                        ValidationIssue::new(codes::CUSTOM, message)
                            .with_metadata("rule", refinement.name.as_str()),
                    );
                }
            }
        }

        issues.into_vec()
    }

    fn normalize(&self, value: Value) -> Value {
        let Value::Object(mut object) = value else {
            return value;
        };
        for field in &self.fields {
            if let Some(slot) = object.get_mut(&field.name) {
                if !slot.is_null() {
                    let taken = slot.take();
                    *slot = field.validator.normalize(taken);
                }
            }
        }
        Value::Object(object)
    }

    fn describe(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut described = field.validator.describe();
            if let (Some(text), Value::Object(map)) = (&field.description, &mut described) {
                map.insert("description".into(), Value::String(text.clone()));
            }
            properties.insert(field.name.clone(), described);
        }
        let required: Vec<&str> = self.required_fields().collect();
        let mut schema = json!({
            "type": "object",
            "title": self.name,
            "properties": properties,
            "required": required,
            "additionalProperties": !self.strict,
        });
        if let (Some(text), Value::Object(map)) = (&self.description, &mut schema) {
            map.insert("description".into(), Value::String(text.clone()));
        }
        schema
    }
}

/// A JSON array whose elements all satisfy one validator.
#[derive(Clone)]
pub struct ArraySchema {
    name: String,
    items: Arc<dyn Validator<Value>>,
    min_items: Option<usize>,
    max_items: Option<usize>,
}

impl fmt::Debug for ArraySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArraySchema")
            .field("items", &self.items.name())
            .field("min_items", &self.min_items)
            .field("max_items", &self.max_items)
            .finish()
    }
}

impl ArraySchema {
    pub fn of(items: impl Validator<Value> + 'static) -> Self {
        Self {
            name: "array".to_owned(),
            items: Arc::new(items),
            min_items: None,
            max_items: None,
        }
    }

    pub fn min_items(mut self, min: usize) -> Self {
        self.min_items = Some(min);
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }
}

impl Validator<Value> for ArraySchema {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, value: &Value) -> Vec<ValidationIssue> {
        let Some(elements) = value.as_array() else {
            return vec![invalid_type("array", value)];
        };

        let mut issues = Issues::new();
        if let Some(min) = self.min_items.filter(|min| elements.len() < *min) {
            issues.push(
                ValidationIssue::new(codes::TOO_SHORT, format!("expected at least {min} items"))
                    .with_metadata("minimum", min),
            );
        }
        if let Some(max) = self.max_items.filter(|max| elements.len() > *max) {
            issues.push(
                ValidationIssue::new(codes::TOO_LONG, format!("expected at most {max} items"))
                    .with_metadata("maximum", max),
            );
        }
        for (index, element) in elements.iter().enumerate() {
            issues.field(index, element, &self.items);
        }
        issues.into_vec()
    }

    fn normalize(&self, value: Value) -> Value {
        match value {
            Value::Array(elements) => Value::Array(
                elements
                    .into_iter()
                    .map(|element| self.items.normalize(element))
                    .collect(),
            ),
            other => other,
        }
    }

    fn describe(&self) -> Value {
        let mut schema = json!({ "type": "array", "items": self.items.describe() });
        if let Value::Object(map) = &mut schema {
            if let Some(min) = self.min_items {
                map.insert("minItems".into(), json!(min));
            }
            if let Some(max) = self.max_items {
                map.insert("maxItems".into(), json!(max));
            }
        }
        schema
    }
}

/// Character classes a [`StringRule`] can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    /// ASCII digits only.
    Digits,
    /// ASCII letters and digits only.
    Alphanumeric,
}

impl StringFormat {
    fn matches(self, text: &str) -> bool {
        match self {
            StringFormat::Digits => text.chars().all(|c| c.is_ascii_digit()),
            StringFormat::Alphanumeric => text.chars().all(|c| c.is_ascii_alphanumeric()),
        }
    }

    fn label(self) -> &'static str {
        match self {
            StringFormat::Digits => "digits",
            StringFormat::Alphanumeric => "letters and digits",
        }
    }

    fn pattern(self) -> &'static str {
        match self {
            StringFormat::Digits => "^[0-9]*$",
            StringFormat::Alphanumeric => "^[A-Za-z0-9]*$",
        }
    }
}

/// A string with optional length bounds and character class.
///
/// Normalization trims surrounding whitespace and turns numbers into their
/// decimal text, since extractors often return `12345` for a check number.
#[derive(Debug, Clone, Default)]
pub struct StringRule {
    min_len: Option<usize>,
    max_len: Option<usize>,
    format: Option<StringFormat>,
}

impl StringRule {
    pub fn new() -> Self {
        Self::default()
    }

    /// At least one non-whitespace character.
    pub fn non_empty() -> Self {
        Self::new().min_len(1)
    }

    pub fn min_len(mut self, min: usize) -> Self {
        self.min_len = Some(min);
        self
    }

    pub fn max_len(mut self, max: usize) -> Self {
        self.max_len = Some(max);
        self
    }

    /// Exactly `len` characters.
    pub fn exact_len(self, len: usize) -> Self {
        self.min_len(len).max_len(len)
    }

    pub fn format(mut self, format: StringFormat) -> Self {
        self.format = Some(format);
        self
    }
}

impl Validator<Value> for StringRule {
    fn name(&self) -> &str {
        "string"
    }

    fn check(&self, value: &Value) -> Vec<ValidationIssue> {
        let Some(text) = value.as_str() else {
            return vec![invalid_type("string", value)];
        };
        let len = text.trim().chars().count();
        if let Some(min) = self.min_len.filter(|min| len < *min) {
            return vec![
                ValidationIssue::new(codes::TOO_SHORT, format!("expected at least {min} characters"))
                    .with_invalid_value(value.clone())
                    .with_metadata("minimum", min),
            ];
        }
        if let Some(max) = self.max_len.filter(|max| len > *max) {
            return vec![
                ValidationIssue::new(codes::TOO_LONG, format!("expected at most {max} characters"))
                    .with_invalid_value(value.clone())
                    .with_metadata("maximum", max),
            ];
        }
        if let Some(format) = self.format.filter(|format| !format.matches(text.trim())) {
            return vec![
                ValidationIssue::new(codes::INVALID_FORMAT, format!("expected {} only", format.label()))
                    .with_invalid_value(value.clone())
                    .with_metadata("pattern", format.pattern()),
            ];
        }
        Vec::new()
    }

    fn normalize(&self, value: Value) -> Value {
        match value {
            Value::String(text) => {
                let trimmed = text.trim();
                if trimmed.len() == text.len() {
                    Value::String(text)
                } else {
                    Value::String(trimmed.to_owned())
                }
            }
            Value::Number(number) => Value::String(number.to_string()),
            other => other,
        }
    }

    fn describe(&self) -> Value {
        let mut schema = json!({ "type": "string" });
        if let Value::Object(map) = &mut schema {
            if let Some(min) = self.min_len {
                map.insert("minLength".into(), json!(min));
            }
            if let Some(max) = self.max_len {
                map.insert("maxLength".into(), json!(max));
            }
            if let Some(format) = self.format {
                map.insert("pattern".into(), json!(format.pattern()));
            }
        }
        schema
    }
}

/// A finite number with optional bounds.
///
/// Normalization accepts amount strings (`"$1,234.56"`) and rewrites them
/// as numbers.
#[derive(Debug, Clone, Default)]
pub struct NumberRule {
    min: Option<f64>,
    max: Option<f64>,
    integer: bool,
}

impl NumberRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn integer() -> Self {
        Self {
            integer: true,
            ..Self::default()
        }
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }
}

impl Validator<Value> for NumberRule {
    fn name(&self) -> &str {
        if self.integer { "integer" } else { "number" }
    }

    fn check(&self, value: &Value) -> Vec<ValidationIssue> {
        let Some(number) = value.as_f64() else {
            return vec![invalid_type(self.name(), value)];
        };
        if self.integer && number.fract() != 0.0 {
            return vec![invalid_type("integer", value)];
        }
        if let Some(min) = self.min.filter(|min| number < *min) {
            return vec![
                ValidationIssue::new(codes::TOO_SMALL, format!("must be at least {min}"))
                    .with_invalid_value(value.clone())
                    .with_metadata("minimum", min),
            ];
        }
        if let Some(max) = self.max.filter(|max| number > *max) {
            return vec![
                ValidationIssue::new(codes::TOO_BIG, format!("must be at most {max}"))
                    .with_invalid_value(value.clone())
                    .with_metadata("maximum", max),
            ];
        }
        Vec::new()
    }

    fn normalize(&self, value: Value) -> Value {
        let Value::String(text) = &value else {
            return value;
        };
        let parsed = parse_amount(text).and_then(|amount| {
            if self.integer && amount.fract() == 0.0 && amount.abs() < i64::MAX as f64 {
                Some(Number::from(amount as i64))
            } else {
                Number::from_f64(amount)
            }
        });
        match parsed {
            Some(number) => Value::Number(number),
            None => value,
        }
    }

    fn describe(&self) -> Value {
        let mut schema = json!({ "type": self.name() });
        if let Value::Object(map) = &mut schema {
            if let Some(min) = self.min {
                map.insert("minimum".into(), json!(min));
            }
            if let Some(max) = self.max {
                map.insert("maximum".into(), json!(max));
            }
        }
        schema
    }
}

/// A date or timestamp string.
///
/// Normalization canonicalizes every layout [`parse_timestamp`] understands to
/// RFC 3339 (or `YYYY-MM-DD` for plain dates).
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampRule {
    date_only: bool,
}

impl TimestampRule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects values that carry a time of day.
    pub fn date_only() -> Self {
        Self { date_only: true }
    }
}

impl Validator<Value> for TimestampRule {
    fn name(&self) -> &str {
        if self.date_only { "date" } else { "timestamp" }
    }

    fn check(&self, value: &Value) -> Vec<ValidationIssue> {
        let Some(text) = value.as_str() else {
            return vec![invalid_type("string", value)];
        };
        match parse_timestamp(text) {
            None => vec![
                ValidationIssue::new(codes::INVALID_FORMAT, "not a recognizable date")
                    .with_invalid_value(value.clone()),
            ],
            Some(ts) if self.date_only && ts.has_time() => vec![
                ValidationIssue::new(codes::INVALID_FORMAT, "expected a date without time")
                    .with_invalid_value(value.clone()),
            ],
            Some(_) => Vec::new(),
        }
    }

    fn normalize(&self, value: Value) -> Value {
        match value.as_str().and_then(parse_timestamp) {
            Some(ts) => Value::String(ts.canonical()),
            None => value,
        }
    }

    fn describe(&self) -> Value {
        let format = if self.date_only { "date" } else { "date-time" };
        json!({ "type": "string", "format": format })
    }
}

/// An ISO 4217 currency code.
///
/// Normalization trims and upper-cases; an allow-list is optional.
#[derive(Debug, Clone, Default)]
pub struct CurrencyRule {
    allowed: Option<BTreeSet<String>>,
}

impl CurrencyRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed = Some(codes.into_iter().map(|c| canonical_currency(c.as_ref())).collect());
        self
    }
}

impl Validator<Value> for CurrencyRule {
    fn name(&self) -> &str {
        "currency"
    }

    fn check(&self, value: &Value) -> Vec<ValidationIssue> {
        let Some(code) = value.as_str() else {
            return vec![invalid_type("string", value)];
        };
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return vec![
                ValidationIssue::new(codes::INVALID_FORMAT, "expected a three-letter ISO 4217 code")
                    .with_invalid_value(value.clone()),
            ];
        }
        match &self.allowed {
            Some(allowed) if !allowed.contains(code) => vec![
                ValidationIssue::new(codes::INVALID_ENUM, format!("currency `{code}` is not accepted"))
                    .with_invalid_value(value.clone())
                    .with_metadata("allowed", allowed.iter().cloned().collect::<Vec<_>>()),
            ],
            _ => Vec::new(),
        }
    }

    fn normalize(&self, value: Value) -> Value {
        match value {
            Value::String(code) => Value::String(canonical_currency(&code)),
            other => other,
        }
    }

    fn describe(&self) -> Value {
        match &self.allowed {
            Some(allowed) => json!({ "type": "string", "enum": allowed }),
            None => json!({ "type": "string", "pattern": "^[A-Z]{3}$" }),
        }
    }
}

/// A JSON boolean; normalization accepts `"true"`, `"no"` and friends.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanRule;

impl Validator<Value> for BooleanRule {
    fn name(&self) -> &str {
        "boolean"
    }

    fn check(&self, value: &Value) -> Vec<ValidationIssue> {
        if value.is_boolean() {
            Vec::new()
        } else {
            vec![invalid_type("boolean", value)]
        }
    }

    fn normalize(&self, value: Value) -> Value {
        let Some(text) = value.as_str() else {
            return value;
        };
        match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" => Value::Bool(true),
            "false" | "no" | "n" => Value::Bool(false),
            _ => value,
        }
    }

    fn describe(&self) -> Value {
        json!({ "type": "boolean" })
    }
}

/// One of a fixed set of strings.
#[derive(Debug, Clone)]
pub struct OneOf {
    options: Vec<String>,
    case_insensitive: bool,
}

impl OneOf {
    pub fn new<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            options: options.into_iter().map(Into::into).collect(),
            case_insensitive: false,
        }
    }

    /// Matches regardless of case; normalization rewrites to the declared spelling.
    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    fn canonical(&self, text: &str) -> Option<&str> {
        let text = text.trim();
        self.options
            .iter()
            .find(|option| {
                if self.case_insensitive {
                    option.eq_ignore_ascii_case(text)
                } else {
                    option.as_str() == text
                }
            })
            .map(String::as_str)
    }
}

impl Validator<Value> for OneOf {
    fn name(&self) -> &str {
        "one_of"
    }

    fn check(&self, value: &Value) -> Vec<ValidationIssue> {
        let Some(text) = value.as_str() else {
            return vec![invalid_type("string", value)];
        };
        if self.canonical(text).is_some() {
            return Vec::new();
        }
        vec![
            ValidationIssue::new(
                codes::INVALID_ENUM,
                format!("expected one of: {}", self.options.join(", ")),
            )
            .with_invalid_value(value.clone())
            .with_metadata("allowed", self.options.clone()),
        ]
    }

    fn normalize(&self, value: Value) -> Value {
        match value.as_str().and_then(|text| self.canonical(text)) {
            Some(option) => Value::String(option.to_owned()),
            None => value,
        }
    }

    fn describe(&self) -> Value {
        json!({ "type": "string", "enum": self.options })
    }
}
