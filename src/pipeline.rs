//! The document processor: OCR, extraction, validation, hallucination check
//! and confidence aggregation, in that order.
use std::sync::Arc;
use std::time::Duration;

use documents::{
    source_text, Document, DocumentKind, ExtractedRecord, ExtractionRequest, ExtractionService,
    OcrResult, OcrService,
};
use futures::stream::{self, StreamExt};
use hallucination::HallucinationWarning;
use resilience::RetryPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::confidence::{ocr_confidence, ConfidenceModel, ConfidenceScore};
use crate::error::PipelineError;
use crate::observer::{NoopObserver, PipelineObserver};
use crate::registry::{KindProfile, KindRegistry};
use crate::state::{PipelineState, Stage};

/// Default number of documents processed at once by a batch.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// What to do when extracted values are missing from the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HallucinationPolicy {
    /// Attach the findings to the result.
    #[default]
    Advisory,
    /// Fail the run at the `hallucination` stage.
    Reject,
}

/// A validated, confidence-scored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub run_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    pub kind: DocumentKind,
    /// Normalized and validated extraction output.
    pub data: Value,
    pub confidence: ConfidenceScore,
    /// Advisory findings; `None` when every checked value was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hallucinations: Option<HallucinationWarning>,
    /// Number of pages the OCR service returned.
    pub pages: usize,
}

impl ProcessingResult {
    pub fn has_hallucinations(&self) -> bool {
        self.hallucinations.is_some()
    }
}

/// Runs documents through the pipeline.
///
/// All collaborators are passed in through [`DocumentProcessor::builder`];
/// nothing is looked up globally. The processor is immutable once built and
/// can be shared across tasks behind an `Arc`.
pub struct DocumentProcessor {
    ocr: Arc<dyn OcrService>,
    extraction: Arc<dyn ExtractionService>,
    retry: RetryPolicy,
    registry: Arc<KindRegistry>,
    confidence: ConfidenceModel,
    hallucination_policy: HallucinationPolicy,
    observer: Arc<dyn PipelineObserver>,
    max_concurrency: usize,
}

impl std::fmt::Debug for DocumentProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentProcessor")
            .field("ocr", &self.ocr.name())
            .field("extraction", &self.extraction.name())
            .field("retry", &self.retry)
            .field("registry", &self.registry)
            .field("confidence", &self.confidence)
            .field("hallucination_policy", &self.hallucination_policy)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}

/// Builder for [`DocumentProcessor`].
pub struct DocumentProcessorBuilder {
    ocr: Arc<dyn OcrService>,
    extraction: Arc<dyn ExtractionService>,
    retry: RetryPolicy,
    registry: Option<Arc<KindRegistry>>,
    confidence: ConfidenceModel,
    hallucination_policy: HallucinationPolicy,
    observer: Arc<dyn PipelineObserver>,
    max_concurrency: usize,
}

impl DocumentProcessorBuilder {
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Defaults to [`KindRegistry::with_builtins`].
    pub fn registry(mut self, registry: impl Into<Arc<KindRegistry>>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    pub fn confidence_model(mut self, confidence: ConfidenceModel) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn hallucination_policy(mut self, policy: HallucinationPolicy) -> Self {
        self.hallucination_policy = policy;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Upper bound on documents in flight during a batch; at least 1.
    pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn build(self) -> DocumentProcessor {
        DocumentProcessor {
            ocr: self.ocr,
            extraction: self.extraction,
            retry: self.retry,
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(KindRegistry::with_builtins())),
            confidence: self.confidence,
            hallucination_policy: self.hallucination_policy,
            observer: self.observer,
            max_concurrency: self.max_concurrency,
        }
    }
}

impl DocumentProcessor {
    pub fn builder<O, E>(ocr: O, extraction: E) -> DocumentProcessorBuilder
    where
        O: OcrService + 'static,
        E: ExtractionService + 'static,
    {
        DocumentProcessorBuilder {
            ocr: Arc::new(ocr),
            extraction: Arc::new(extraction),
            retry: RetryPolicy::default(),
            registry: None,
            confidence: ConfidenceModel::default(),
            hallucination_policy: HallucinationPolicy::default(),
            observer: Arc::new(NoopObserver),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Processes one document of the given kind.
    ///
    /// Transient service failures are retried inside the retry policy; once
    /// a stage fails it is never retried here.
    pub async fn process(
        &self,
        document: &Document,
        kind: &DocumentKind,
    ) -> Result<ProcessingResult, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "docex.process",
            %run_id,
            document = document.name().unwrap_or("<unnamed>"),
            kind = %kind
        );
        self.run(run_id, document, kind).instrument(span).await
    }

    /// Processes every document concurrently, at most
    /// [`max_concurrency`](Self::max_concurrency) at a time.
    ///
    /// Results come back in submission order. A failure only affects its own
    /// slot.
    pub async fn process_batch(
        &self,
        items: &[(Document, DocumentKind)],
    ) -> Vec<Result<ProcessingResult, PipelineError>> {
        let start = Instant::now();
        let mut indexed: Vec<(usize, Result<ProcessingResult, PipelineError>)> =
            stream::iter(items.iter().enumerate())
                .map(|(index, (document, kind))| async move {
                    (index, self.process(document, kind).await)
                })
                .buffer_unordered(self.max_concurrency)
                .collect()
                .await;

        // Restore submission order.
        indexed.sort_by_key(|(index, _)| *index);

        let succeeded = indexed.iter().filter(|(_, result)| result.is_ok()).count();
        info!(
            documents = items.len(),
            succeeded,
            failed = items.len() - succeeded,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "batch_complete"
        );
        indexed.into_iter().map(|(_, result)| result).collect()
    }

    /// Batch of documents that share one kind.
    pub async fn process_all(
        &self,
        documents: Vec<Document>,
        kind: &DocumentKind,
    ) -> Vec<Result<ProcessingResult, PipelineError>> {
        let items: Vec<(Document, DocumentKind)> = documents
            .into_iter()
            .map(|document| (document, kind.clone()))
            .collect();
        self.process_batch(&items).await
    }

    async fn run(
        &self,
        run_id: Uuid,
        document: &Document,
        kind: &DocumentKind,
    ) -> Result<ProcessingResult, PipelineError> {
        let start = Instant::now();
        let mut run = RunTracker::new(run_id, self.observer.as_ref());

        let Some(profile) = self.registry.get(kind) else {
            let err = PipelineError::UnsupportedKind(kind.clone());
            return Err(run.fail(Stage::Extraction, Duration::ZERO, err));
        };

        let pages = self.recognize(&mut run, document).await?;
        let text = source_text(&pages);

        let record = self.extract(&mut run, profile, text.clone()).await?;

        run.advance(PipelineState::Validating);
        let stage_start = Instant::now();
        let data = match profile.engine().normalize_and_validate(record.json) {
            Ok(data) => data,
            Err(err) => {
                return Err(run.fail(
                    Stage::Validation,
                    stage_start.elapsed(),
                    PipelineError::Validation(err),
                ));
            }
        };
        run.stage_complete(Stage::Validation, stage_start.elapsed());

        run.advance(PipelineState::HallucinationCheck);
        let stage_start = Instant::now();
        let hallucinations = profile
            .detector()
            .and_then(|detector| HallucinationWarning::from_issues(detector.detect(&text, &data)));
        if let Some(warning) = &hallucinations {
            warn!(
                unsupported = ?warning.unsupported_fields(),
                policy = ?self.hallucination_policy,
                "hallucination_detected"
            );
            if self.hallucination_policy == HallucinationPolicy::Reject {
                let err = PipelineError::Hallucination(warning.clone());
                return Err(run.fail(Stage::Hallucination, stage_start.elapsed(), err));
            }
        }
        run.stage_complete(Stage::Hallucination, stage_start.elapsed());

        let confidence = self
            .confidence
            .aggregate(ocr_confidence(&pages), record.extraction_confidence);
        run.advance(PipelineState::Done);
        info!(
            overall_confidence = confidence.overall,
            hallucinations = hallucinations.as_ref().map_or(0, |w| w.issues().len()),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "document_processed"
        );

        Ok(ProcessingResult {
            run_id,
            document_name: document.name().map(str::to_string),
            kind: kind.clone(),
            data,
            confidence,
            hallucinations,
            pages: pages.len(),
        })
    }

    async fn recognize(
        &self,
        run: &mut RunTracker<'_>,
        document: &Document,
    ) -> Result<Vec<OcrResult>, PipelineError> {
        run.advance(PipelineState::OcrInProgress);
        let stage_start = Instant::now();
        let pages = match self
            .retry
            .execute(|_attempt| self.ocr.recognize(document))
            .await
        {
            Ok(pages) => pages,
            Err(err) => {
                return Err(run.fail(Stage::Ocr, stage_start.elapsed(), PipelineError::Ocr(err)));
            }
        };
        info!(
            service = self.ocr.name(),
            pages = pages.len(),
            elapsed_ms = stage_start.elapsed().as_millis() as u64,
            "ocr_complete"
        );
        run.stage_complete(Stage::Ocr, stage_start.elapsed());
        run.advance(PipelineState::OcrComplete);
        Ok(pages)
    }

    async fn extract(
        &self,
        run: &mut RunTracker<'_>,
        profile: &KindProfile,
        source_text: String,
    ) -> Result<ExtractedRecord, PipelineError> {
        if source_text.trim().is_empty() {
            warn!("ocr_empty_text");
        }
        let request = ExtractionRequest {
            source_text,
            target_schema: profile.descriptor(),
        };

        run.advance(PipelineState::ExtractionInProgress);
        let stage_start = Instant::now();
        let record = match self
            .retry
            .execute(|_attempt| self.extraction.extract(&request))
            .await
        {
            Ok(record) => record,
            Err(err) => {
                return Err(run.fail(
                    Stage::Extraction,
                    stage_start.elapsed(),
                    PipelineError::Extraction(err),
                ));
            }
        };
        info!(
            service = self.extraction.name(),
            schema = %request.target_schema.name,
            extraction_confidence = record.extraction_confidence,
            elapsed_ms = stage_start.elapsed().as_millis() as u64,
            "extraction_complete"
        );
        run.stage_complete(Stage::Extraction, stage_start.elapsed());
        run.advance(PipelineState::ExtractionComplete);
        Ok(record)
    }
}

/// Current state of one run, reported to the log and the observer.
struct RunTracker<'a> {
    run_id: Uuid,
    state: PipelineState,
    observer: &'a dyn PipelineObserver,
}

impl<'a> RunTracker<'a> {
    fn new(run_id: Uuid, observer: &'a dyn PipelineObserver) -> Self {
        Self {
            run_id,
            state: PipelineState::Received,
            observer,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(self.state.can_advance_to(next), "{} -> {next}", self.state);
        debug!(from = %self.state, to = %next, "pipeline_transition");
        self.observer.on_transition(self.run_id, self.state, next);
        self.state = next;
    }

    fn stage_complete(&self, stage: Stage, elapsed: Duration) {
        self.observer
            .on_stage_complete(self.run_id, stage, elapsed, true);
    }

    fn fail(&mut self, stage: Stage, elapsed: Duration, error: PipelineError) -> PipelineError {
        warn!(
            stage = %stage,
            error = %error,
            elapsed_ms = elapsed.as_millis() as u64,
            "pipeline_failed"
        );
        self.observer
            .on_stage_complete(self.run_id, stage, elapsed, false);
        self.advance(PipelineState::Failed(stage));
        error
    }
}
