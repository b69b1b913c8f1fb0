//! A single validation failure and the codes it can carry.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::{format_path, PathSegment};

/// Issue codes emitted by the built-in validators.
pub mod codes {
    /// A required field is missing or null.
    pub const REQUIRED: &str = "required";
    /// The value has the wrong JSON type.
    pub const INVALID_TYPE: &str = "invalid_type";
    /// String or array shorter than allowed.
    pub const TOO_SHORT: &str = "too_short";
    /// String or array longer than allowed.
    pub const TOO_LONG: &str = "too_long";
    /// Number below the allowed minimum.
    pub const TOO_SMALL: &str = "too_small";
    /// Number above the allowed maximum.
    pub const TOO_BIG: &str = "too_big";
    /// Value outside an allowed set.
    pub const INVALID_ENUM: &str = "invalid_enum";
    /// String does not follow the expected format.
    pub const INVALID_FORMAT: &str = "invalid_format";
    /// Key not declared by a strict object schema.
    pub const UNRECOGNIZED_KEY: &str = "unrecognized_key";
    /// Cross-field or caller-defined rule.
    pub const CUSTOM: &str = "custom";
    /// Extracted value with no support in the source text.
    pub const UNSUPPORTED_VALUE: &str = "unsupported_value";
}

/// Metadata key naming the innermost validator that produced an issue.
pub const VALIDATOR_METADATA_KEY: &str = "validator";

/// One validation failure, addressed by its path inside the validated value.
///
/// Issues are immutable once built; the `with_*` and [`nested_in`](Self::nested_in)
/// methods consume the issue and return a new one.
///
/// ```rust
/// use validation::{codes, ValidationIssue};
///
/// let issue = ValidationIssue::new(codes::TOO_SMALL, "must be at least 0")
///     .at("amount")
///     .with_invalid_value(serde_json::json!(-4))
///     .nested_in("payment", "payment");
///
/// assert_eq!(issue.path_string(), "payment.amount");
/// assert_eq!(issue.code(), "too_small");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    message: String,
    path: Vec<PathSegment>,
    code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    invalid_value: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, Value>,
}

impl ValidationIssue {
    /// Creates an issue at the root of the validated value.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
            code: code.into(),
            invalid_value: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Appends a segment to the end of the path.
    pub fn at(mut self, segment: impl Into<PathSegment>) -> Self {
        self.path.push(segment.into());
        self
    }

    /// Replaces the path.
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }

    pub fn with_invalid_value(mut self, value: Value) -> Self {
        self.invalid_value = Some(value);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Re-addresses an issue raised by a nested validator.
    ///
    /// `segment` is prepended to the path. Code, invalid value and metadata are
    /// kept; `validator` is recorded under [`VALIDATOR_METADATA_KEY`] unless a
    /// deeper validator already claimed the issue.
    pub fn nested_in(mut self, segment: impl Into<PathSegment>, validator: &str) -> Self {
        self.path.insert(0, segment.into());
        self.metadata
            .entry(VALIDATOR_METADATA_KEY.to_owned())
            .or_insert_with(|| Value::String(validator.to_owned()));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    /// Dotted rendering of [`path`](Self::path).
    pub fn path_string(&self) -> String {
        format_path(&self.path)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn invalid_value(&self) -> Option<&Value> {
        self.invalid_value.as_ref()
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    /// Name of the innermost validator that produced this issue, if recorded.
    pub fn validator(&self) -> Option<&str> {
        self.metadata
            .get(VALIDATOR_METADATA_KEY)
            .and_then(Value::as_str)
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.path_string(), self.message, self.code)
    }
}
