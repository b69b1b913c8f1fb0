//! Document kind to `{schema, detector}` mapping.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use documents::{schemas, DocumentKind, SchemaDescriptor};
use hallucination::{detector_for, HallucinationDetector};
use serde_json::Value;
use validation::{ValidationEngine, Validator};

/// Everything the pipeline needs to know about one document kind.
#[derive(Clone)]
pub struct KindProfile {
    engine: ValidationEngine<Value>,
    detector: Option<Arc<dyn HallucinationDetector>>,
}

impl KindProfile {
    pub fn new<V>(schema: V) -> Self
    where
        V: Validator<Value> + 'static,
    {
        Self {
            engine: ValidationEngine::new(schema),
            detector: None,
        }
    }

    pub fn with_detector<D>(mut self, detector: D) -> Self
    where
        D: HallucinationDetector + 'static,
    {
        self.detector = Some(Arc::new(detector));
        self
    }

    pub fn with_shared_detector(mut self, detector: Option<Arc<dyn HallucinationDetector>>) -> Self {
        self.detector = detector;
        self
    }

    pub fn engine(&self) -> &ValidationEngine<Value> {
        &self.engine
    }

    pub fn detector(&self) -> Option<&Arc<dyn HallucinationDetector>> {
        self.detector.as_ref()
    }

    /// Descriptor sent to the extraction service.
    pub fn descriptor(&self) -> SchemaDescriptor {
        SchemaDescriptor::of(self.engine.validator().as_ref())
    }
}

impl fmt::Debug for KindProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindProfile")
            .field("schema", &self.engine.validator().name())
            .field("detector", &self.detector.as_ref().map(|d| d.name().to_string()))
            .finish()
    }
}

/// Per-kind schemas and detectors, built once and shared read-only.
///
/// ```rust
/// use docex::KindRegistry;
/// use documents::DocumentKind;
///
/// let registry = KindRegistry::with_builtins();
/// let profile = registry.get(&DocumentKind::Receipt).unwrap();
/// assert_eq!(profile.descriptor().name, "receipt");
/// assert!(registry.get(&DocumentKind::Other("invoice".into())).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    profiles: HashMap<DocumentKind, KindProfile>,
}

impl KindRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check and receipt schemas with their detectors.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for kind in [DocumentKind::Check, DocumentKind::Receipt] {
            if let Some(schema) = schemas::builtin_schema(&kind) {
                let profile = KindProfile::new(schema).with_shared_detector(detector_for(&kind));
                registry.register(kind, profile);
            }
        }
        registry
    }

    /// Adds or replaces the profile for `kind`.
    pub fn register(&mut self, kind: DocumentKind, profile: KindProfile) -> &mut Self {
        self.profiles.insert(kind, profile);
        self
    }

    pub fn get(&self, kind: &DocumentKind) -> Option<&KindProfile> {
        self.profiles.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &DocumentKind> {
        self.profiles.keys()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hallucination::{FieldCheck, FieldDetector, MatchMode};
    use serde_json::json;
    use validation::{CurrencyRule, NumberRule, ObjectSchema, StringRule};

    #[test]
    fn builtins_pair_schema_and_detector() {
        let registry = KindRegistry::with_builtins();
        assert_eq!(registry.len(), 2);

        let check = registry.get(&DocumentKind::Check).unwrap();
        assert_eq!(check.engine().validator().name(), "check");
        assert_eq!(check.detector().unwrap().name(), "check_hallucination");
    }

    #[test]
    fn callers_can_replace_a_builtin_schema() {
        let mut registry = KindRegistry::with_builtins();
        registry.register(
            DocumentKind::Receipt,
            KindProfile::new(
                ObjectSchema::new("receipt_strict")
                    .required("merchantName", StringRule::non_empty())
                    .required("total", NumberRule::new().min(0.0))
                    .required("currency", CurrencyRule::new()),
            ),
        );

        let profile = registry.get(&DocumentKind::Receipt).unwrap();
        assert!(profile.detector().is_none());
        let err = profile
            .engine()
            .validate(json!({ "merchantName": "Cafe", "total": 4.5 }))
            .unwrap_err();
        assert_eq!(err.failing_paths(), vec!["currency"]);
    }

    #[test]
    fn custom_kind_gets_custom_detector() {
        let kind = DocumentKind::Other("invoice".into());
        let mut registry = KindRegistry::new();
        registry.register(
            kind.clone(),
            KindProfile::new(ObjectSchema::new("invoice").required("invoiceNumber", StringRule::non_empty()))
                .with_detector(
                    FieldDetector::new("invoice_hallucination")
                        .check(FieldCheck::new("invoiceNumber", MatchMode::Digits)),
                ),
        );
        let profile = registry.get(&kind).unwrap();
        assert_eq!(profile.descriptor().schema["required"], json!(["invoiceNumber"]));
        assert_eq!(profile.detector().unwrap().name(), "invoice_hallucination");
    }
}
