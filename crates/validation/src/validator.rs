//! The validator trait and the engine that runs it.
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use crate::error::ValidationError;
use crate::issue::ValidationIssue;
use crate::path::PathSegment;

/// Checks values of type `T` and reports every problem it finds.
///
/// Implementations must be pure: `check` never mutates its input and returns
/// the complete list of issues for one pass. Fail-fast is allowed only inside
/// a single leaf rule.
///
/// Composite validators call their children and re-address the child issues
/// with [`Issues::field`] (or [`ValidationIssue::nested_in`]) so paths stay
/// fully qualified.
pub trait Validator<T>: Send + Sync {
    /// Short name recorded in issue metadata (`validator`).
    fn name(&self) -> &str;

    /// Every issue found in `value`; empty when valid.
    fn check(&self, value: &T) -> Vec<ValidationIssue>;

    /// Rewrites `value` into canonical form before checking.
    ///
    /// Normalization never fails. Anything it does not recognise is returned
    /// unchanged so `check` can report it.
    fn normalize(&self, value: T) -> T {
        value
    }

    /// JSON-Schema-like description of what this validator accepts.
    fn describe(&self) -> Value {
        json!({})
    }
}

impl<T, V> Validator<T> for Arc<V>
where
    V: Validator<T> + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn check(&self, value: &T) -> Vec<ValidationIssue> {
        (**self).check(value)
    }

    fn normalize(&self, value: T) -> T {
        (**self).normalize(value)
    }

    fn describe(&self) -> Value {
        (**self).describe()
    }
}

/// Accumulates issues while a composite validator walks its fields.
///
/// ```rust
/// use validation::{codes, Issues, ValidationIssue, Validator};
///
/// struct Positive;
/// impl Validator<i64> for Positive {
///     fn name(&self) -> &str { "positive" }
///     fn check(&self, value: &i64) -> Vec<ValidationIssue> {
///         if *value > 0 {
///             Vec::new()
///         } else {
///             vec![ValidationIssue::new(codes::TOO_SMALL, "must be positive")]
///         }
///     }
/// }
///
/// let mut issues = Issues::new();
/// issues.field("width", &-3, &Positive);
/// issues.field("height", &4, &Positive);
/// let issues = issues.into_vec();
/// assert_eq!(issues.len(), 1);
/// assert_eq!(issues[0].path_string(), "width");
/// ```
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Issues {
    issues: Vec<ValidationIssue>,
}

impl Issues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Runs `validator` on a sub-value and files its issues under `segment`.
    pub fn field<U, V>(&mut self, segment: impl Into<PathSegment>, value: &U, validator: &V)
    where
        V: Validator<U> + ?Sized,
    {
        let found = validator.check(value);
        if found.is_empty() {
            return;
        }
        let segment = segment.into();
        let name = validator.name();
        self.issues.extend(
            found
                .into_iter()
                .map(|issue| issue.nested_in(segment.clone(), name)),
        );
    }

    /// Files issues already produced by a nested validator named `validator`.
    pub fn nested(
        &mut self,
        segment: impl Into<PathSegment>,
        validator: &str,
        found: Vec<ValidationIssue>,
    ) {
        let segment = segment.into();
        self.issues.extend(
            found
                .into_iter()
                .map(|issue| issue.nested_in(segment.clone(), validator)),
        );
    }

    pub fn extend(&mut self, found: impl IntoIterator<Item = ValidationIssue>) {
        self.issues.extend(found);
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn into_vec(self) -> Vec<ValidationIssue> {
        self.issues
    }
}

/// Runs a [`Validator`] in either of two modes.
///
/// - [`validate`](Self::validate) returns a `Result` and never panics.
/// - [`assert_valid`](Self::assert_valid) returns the value or panics with the
///   full issue list.
///
/// Engines are cheap to clone and share one validator.
///
/// # Examples
///
/// ```rust
/// use validation::{NumberRule, ObjectSchema, StringRule, ValidationEngine};
/// use serde_json::json;
///
/// let engine = ValidationEngine::new(
///     ObjectSchema::new("check")
///         .required("payee", StringRule::non_empty())
///         .required("amount", NumberRule::new().min(0.0)),
/// );
///
/// let err = engine.validate(json!({ "amount": -1 })).unwrap_err();
/// assert_eq!(err.failing_paths(), vec!["payee", "amount"]);
/// ```
pub struct ValidationEngine<T> {
    validator: Arc<dyn Validator<T>>,
}

impl<T> Clone for ValidationEngine<T> {
    fn clone(&self) -> Self {
        Self {
            validator: Arc::clone(&self.validator),
        }
    }
}

impl<T> fmt::Debug for ValidationEngine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationEngine")
            .field("validator", &self.validator.name())
            .finish()
    }
}

impl<T> ValidationEngine<T> {
    pub fn new<V>(validator: V) -> Self
    where
        V: Validator<T> + 'static,
    {
        Self {
            validator: Arc::new(validator),
        }
    }

    pub fn from_shared(validator: Arc<dyn Validator<T>>) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &Arc<dyn Validator<T>> {
        &self.validator
    }

    /// Schema description of the underlying validator.
    pub fn describe(&self) -> Value {
        self.validator.describe()
    }

    /// Issues for `value` without taking ownership.
    pub fn issues(&self, value: &T) -> Vec<ValidationIssue> {
        self.validator.check(value)
    }

    /// Validates `value`, handing it back on success.
    ///
    /// On failure the error carries every issue found in one pass and the
    /// value that was checked.
    pub fn validate(&self, value: T) -> Result<T, ValidationError<T>> {
        let issues = self.validator.check(&value);
        if issues.is_empty() {
            return Ok(value);
        }
        debug!(
            validator = self.validator.name(),
            issues = issues.len(),
            "validation_failed"
        );
        match ValidationError::new(issues, value) {
            Some(err) => Err(err),
            None => unreachable!("issue list checked non-empty above"),
        }
    }

    /// [`normalize`](Validator::normalize)s `value`, then validates the result.
    pub fn normalize_and_validate(&self, value: T) -> Result<T, ValidationError<T>> {
        let normalized = self.validator.normalize(value);
        self.validate(normalized)
    }

    /// Returns `value` if it is valid.
    ///
    /// # Panics
    ///
    /// Panics with the formatted [`ValidationError`] when any issue is found.
    /// Use [`validate`](Self::validate) for a non-panicking check.
    pub fn assert_valid(&self, value: T) -> T {
        match self.validate(value) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes;

    #[derive(Debug, Clone, PartialEq)]
    struct Window {
        start: u32,
        end: u32,
    }

    struct WindowRule;

    impl Validator<Window> for WindowRule {
        fn name(&self) -> &str {
            "window"
        }

        fn check(&self, value: &Window) -> Vec<ValidationIssue> {
            let mut issues = Issues::new();
            if value.start == 0 {
                issues.push(ValidationIssue::new(codes::TOO_SMALL, "must be positive").at("start"));
            }
            if value.end == 0 {
                issues.push(ValidationIssue::new(codes::TOO_SMALL, "must be positive").at("end"));
            }
            if issues.is_empty() && value.end < value.start {
                issues.push(ValidationIssue::new(codes::CUSTOM, "end must be >= start"));
            }
            issues.into_vec()
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Schedule {
        window: Window,
    }

    struct ScheduleRule;

    impl Validator<Schedule> for ScheduleRule {
        fn name(&self) -> &str {
            "schedule"
        }

        fn check(&self, value: &Schedule) -> Vec<ValidationIssue> {
            let mut issues = Issues::new();
            issues.field("window", &value.window, &WindowRule);
            issues.into_vec()
        }
    }

    #[test]
    fn validate_returns_value_when_clean() {
        let engine = ValidationEngine::new(WindowRule);
        let window = Window { start: 1, end: 2 };
        assert_eq!(engine.validate(window.clone()).unwrap(), window);
    }

    #[test]
    fn collects_every_leaf_failure() {
        let engine = ValidationEngine::new(WindowRule);
        let err = engine.validate(Window { start: 0, end: 0 }).unwrap_err();
        assert_eq!(err.failing_paths(), vec!["start", "end"]);
        assert_eq!(err.original_value(), &Window { start: 0, end: 0 });
    }

    #[test]
    fn cross_field_rule_attaches_to_containing_object() {
        let engine = ValidationEngine::new(ScheduleRule);
        let err = engine
            .validate(Schedule {
                window: Window { start: 5, end: 2 },
            })
            .unwrap_err();
        assert_eq!(err.issues().len(), 1);
        let issue = &err.issues()[0];
        assert_eq!(issue.path(), &[PathSegment::from("window")]);
        assert_eq!(issue.code(), codes::CUSTOM);
        assert_eq!(issue.validator(), Some("window"));
    }

    #[test]
    fn cross_field_rule_skipped_while_leaves_fail() {
        let engine = ValidationEngine::new(WindowRule);
        let err = engine.validate(Window { start: 0, end: 0 }).unwrap_err();
        assert!(err.issues().iter().all(|i| i.code() != codes::CUSTOM));
    }

    #[test]
    #[should_panic(expected = "validation issue")]
    fn assert_valid_panics_with_issue_list() {
        ValidationEngine::new(WindowRule).assert_valid(Window { start: 0, end: 1 });
    }

    #[test]
    fn assert_valid_passes_through() {
        let window = Window { start: 3, end: 9 };
        assert_eq!(
            ValidationEngine::new(WindowRule).assert_valid(window.clone()),
            window
        );
    }

    #[test]
    fn shared_validator_delegates() {
        let shared: Arc<dyn Validator<Window>> = Arc::new(WindowRule);
        let engine = ValidationEngine::from_shared(Arc::clone(&shared));
        assert_eq!(shared.name(), "window");
        assert_eq!(engine.clone().issues(&Window { start: 0, end: 1 }).len(), 1);
        assert_eq!(format!("{engine:?}"), "ValidationEngine { validator: \"window\" }");
    }
}
