//! YAML configuration for docex.
//!
//! One file configures retries, confidence aggregation, the hallucination
//! policy, batch concurrency and both HTTP boundaries. Every section is
//! optional and falls back to its defaults.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "receipts-prod"
//!
//! retry:
//!   initialIntervalMs: 500
//!   maxIntervalMs: 10000
//!   backoffExponent: 1.8
//!   maxElapsedTimeMs: 25000
//!   retryOnConnectionError: true
//!   requestTimeoutMs: 30000
//!   jitter: false
//!
//! confidence:
//!   rule: mean            # or: weighted, with `ocr` and `extraction` weights
//!
//! hallucination:
//!   policy: advisory      # or: reject
//!
//! batch:
//!   maxConcurrency: 8
//!
//! ocr:
//!   baseUrl: "https://api.openai.com/v1"
//!   model: "gpt-4o-mini"
//!
//! extraction:
//!   baseUrl: "https://api.openai.com/v1"
//!   model: "gpt-4o-mini"
//! ```
//!
//! API keys are best left out of the file and supplied through
//! `DOCEX_OCR_API_KEY` / `DOCEX_EXTRACTION_API_KEY`.

use std::fs;
use std::path::Path;

use documents::{
    CompletionExtractionClient, DocumentError, ExtractionService, HttpBoundaryConfig, OcrService,
    VisionOcrClient,
};
use resilience::{RetryConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;
use validation::{codes, Issues, ValidationEngine, ValidationError, ValidationIssue, Validator};

use crate::confidence::{AggregationRule, ConfidenceModel};
use crate::pipeline::{
    DocumentProcessor, DocumentProcessorBuilder, HallucinationPolicy, DEFAULT_MAX_CONCURRENCY,
};

/// Configuration versions this build understands.
pub const SUPPORTED_VERSIONS: &[&str] = &["1", "1.0"];

/// Environment variables applied on top of the file by [`DocexConfig::from_file`].
pub const ENV_OCR_API_KEY: &str = "DOCEX_OCR_API_KEY";
pub const ENV_EXTRACTION_API_KEY: &str = "DOCEX_EXTRACTION_API_KEY";
pub const ENV_OCR_BASE_URL: &str = "DOCEX_OCR_BASE_URL";
pub const ENV_EXTRACTION_BASE_URL: &str = "DOCEX_EXTRACTION_BASE_URL";

/// Errors that can occur when loading configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(ValidationError<DocexConfig>),
}

impl ConfigLoadError {
    /// Issues behind an [`Invalid`](Self::Invalid) error.
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            ConfigLoadError::Invalid(err) => err.issues(),
            _ => &[],
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocexConfig {
    /// Configuration format version
    #[serde(default = "default_version")]
    pub version: String,

    /// Optional configuration name/description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub confidence: ConfidenceModel,

    #[serde(default)]
    pub hallucination: HallucinationConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub ocr: HttpBoundaryConfig,

    #[serde(default)]
    pub extraction: HttpBoundaryConfig,
}

impl Default for DocexConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            name: None,
            retry: RetryConfig::default(),
            confidence: ConfidenceModel::default(),
            hallucination: HallucinationConfig::default(),
            batch: BatchConfig::default(),
            ocr: HttpBoundaryConfig::default(),
            extraction: HttpBoundaryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HallucinationConfig {
    pub policy: HallucinationPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchConfig {
    /// Documents processed at once.
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

impl DocexConfig {
    /// Loads a YAML file, applies environment overrides, then validates.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        let mut config: DocexConfig = serde_yaml::from_str(&content)?;
        config.apply_overrides_from(|key| std::env::var(key).ok());
        config.validate()
    }

    /// Parses and validates YAML; the environment is not consulted.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: DocexConfig = serde_yaml::from_str(yaml)?;
        config.validate()
    }

    /// Applies the `DOCEX_*` overrides found by `lookup`.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |slot: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                debug!(key, "config_env_override");
                *slot = value;
            }
        };
        set(&mut self.ocr.base_url, ENV_OCR_BASE_URL);
        set(&mut self.extraction.base_url, ENV_EXTRACTION_BASE_URL);

        if let Some(key) = lookup(ENV_OCR_API_KEY).filter(|v| !v.trim().is_empty()) {
            debug!(key = ENV_OCR_API_KEY, "config_env_override");
            self.ocr.api_key = Some(key);
        }
        if let Some(key) = lookup(ENV_EXTRACTION_API_KEY).filter(|v| !v.trim().is_empty()) {
            debug!(key = ENV_EXTRACTION_API_KEY, "config_env_override");
            self.extraction.api_key = Some(key);
        }
    }

    /// Checks every section, reporting all problems at once.
    pub fn validate(self) -> Result<Self, ConfigLoadError> {
        ValidationEngine::new(DocexConfigValidator)
            .validate(self)
            .map_err(ConfigLoadError::Invalid)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry)
    }

    /// A processor builder carrying every setting except the boundaries.
    pub fn processor_builder<O, E>(&self, ocr: O, extraction: E) -> DocumentProcessorBuilder
    where
        O: OcrService + 'static,
        E: ExtractionService + 'static,
    {
        DocumentProcessor::builder(ocr, extraction)
            .retry_policy(self.retry_policy())
            .confidence_model(self.confidence)
            .hallucination_policy(self.hallucination.policy)
            .max_concurrency(self.batch.max_concurrency)
    }

    /// A processor talking to the configured HTTP endpoints.
    pub fn http_processor(&self) -> Result<DocumentProcessor, DocumentError> {
        let ocr = VisionOcrClient::new(self.ocr.clone())?;
        let extraction = CompletionExtractionClient::new(self.extraction.clone())?;
        Ok(self.processor_builder(ocr, extraction).build())
    }
}

/// Leaf and cross-field rules for [`RetryConfig`].
///
/// The cross-field rule (`maxIntervalMs >= initialIntervalMs`) only runs once
/// the leaf fields pass, and is reported at the config's own path.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryConfigValidator;

impl Validator<RetryConfig> for RetryConfigValidator {
    fn name(&self) -> &str {
        "retry_config"
    }

    fn check(&self, value: &RetryConfig) -> Vec<ValidationIssue> {
        let mut issues = Issues::new();
        let positive = |field: &str, v: u64| {
            (v == 0).then(|| {
                ValidationIssue::new(codes::TOO_SMALL, "must be greater than 0")
                    .at(field)
                    .with_invalid_value(json!(v))
            })
        };

        issues.extend(positive("initialIntervalMs", value.initial_interval_ms));
        issues.extend(positive("maxIntervalMs", value.max_interval_ms));
        issues.extend(positive("maxElapsedTimeMs", value.max_elapsed_time_ms));
        if let Some(timeout) = value.request_timeout_ms {
            issues.extend(positive("requestTimeoutMs", timeout));
        }
        if !value.backoff_exponent.is_finite() || value.backoff_exponent < 1.0 {
            issues.push(
                ValidationIssue::new(codes::TOO_SMALL, "must be a finite number >= 1")
                    .at("backoffExponent")
                    .with_invalid_value(json!(value.backoff_exponent)),
            );
        }

        if issues.is_empty() && value.max_interval_ms < value.initial_interval_ms {
            issues.push(
                ValidationIssue::new(
                    codes::CUSTOM,
                    "maxIntervalMs must be greater than or equal to initialIntervalMs",
                )
                .with_invalid_value(json!({
                    "initialIntervalMs": value.initial_interval_ms,
                    "maxIntervalMs": value.max_interval_ms,
                }))
                .with_metadata("rule", "max_interval_covers_initial"),
            );
        }
        issues.into_vec()
    }
}

/// Rules for the whole file; delegates each section to its own validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocexConfigValidator;

impl Validator<DocexConfig> for DocexConfigValidator {
    fn name(&self) -> &str {
        "docex_config"
    }

    fn check(&self, value: &DocexConfig) -> Vec<ValidationIssue> {
        let mut issues = Issues::new();

        if !SUPPORTED_VERSIONS.contains(&value.version.as_str()) {
            issues.push(
                ValidationIssue::new(codes::INVALID_ENUM, "unsupported config version")
                    .at("version")
                    .with_invalid_value(json!(value.version))
                    .with_metadata("options", SUPPORTED_VERSIONS.join(", ")),
            );
        }

        issues.field("retry", &value.retry, &RetryConfigValidator);
        issues.field("confidence", &value.confidence, &ConfidenceValidator);

        if value.batch.max_concurrency == 0 {
            issues.nested(
                "batch",
                "batch_config",
                vec![
                    ValidationIssue::new(codes::TOO_SMALL, "must be at least 1")
                        .at("maxConcurrency")
                        .with_invalid_value(json!(0)),
                ],
            );
        }

        issues.field("ocr", &value.ocr, &EndpointValidator);
        issues.field("extraction", &value.extraction, &EndpointValidator);
        issues.into_vec()
    }
}

struct ConfidenceValidator;

impl Validator<ConfidenceModel> for ConfidenceValidator {
    fn name(&self) -> &str {
        "confidence_config"
    }

    fn check(&self, value: &ConfidenceModel) -> Vec<ValidationIssue> {
        let AggregationRule::Weighted { ocr, extraction } = value.rule() else {
            return Vec::new();
        };
        let mut issues = Issues::new();
        for (field, weight) in [("ocr", ocr), ("extraction", extraction)] {
            if !weight.is_finite() || weight < 0.0 {
                issues.push(
                    ValidationIssue::new(codes::TOO_SMALL, "weight must be a finite number >= 0")
                        .at(field)
                        .with_invalid_value(json!(weight)),
                );
            }
        }
        if issues.is_empty() && ocr + extraction <= 0.0 {
            issues.push(
                ValidationIssue::new(codes::CUSTOM, "weights must not both be 0")
                    .with_metadata("rule", "weights_sum_positive"),
            );
        }
        issues.into_vec()
    }
}

struct EndpointValidator;

impl Validator<HttpBoundaryConfig> for EndpointValidator {
    fn name(&self) -> &str {
        "endpoint_config"
    }

    fn check(&self, value: &HttpBoundaryConfig) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let url = value.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            issues.push(
                ValidationIssue::new(codes::INVALID_FORMAT, "must be an http(s) URL")
                    .at("baseUrl")
                    .with_invalid_value(json!(value.base_url)),
            );
        }
        if value.model.trim().is_empty() {
            issues.push(ValidationIssue::new(codes::TOO_SHORT, "must not be empty").at("model"));
        }
        if value.max_tokens == 0 {
            issues.push(
                ValidationIssue::new(codes::TOO_SMALL, "must be greater than 0")
                    .at("maxTokens")
                    .with_invalid_value(json!(0)),
            );
        }
        if !(0.0..=2.0).contains(&value.temperature) {
            issues.push(
                ValidationIssue::new(codes::TOO_BIG, "must be between 0 and 2")
                    .at("temperature")
                    .with_invalid_value(json!(value.temperature)),
            );
        }
        issues
    }
}
