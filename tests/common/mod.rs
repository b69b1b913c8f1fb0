//! Scripted service fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use docex::documents::{ImageFormat, SchemaDescriptor};
use docex::{
    BoundaryError, Document, ExtractedRecord, ExtractionRequest, ExtractionService, MediaType,
    OcrResult, OcrService, PipelineObserver, PipelineState, RetryConfig, Stage,
};
use serde_json::Value;
use uuid::Uuid;

pub const CHECK_TEXT: &str = "Check #12345\nPay to: John Smith\nAmount: $1,234.56";

pub const RECEIPT_PAGE_1: &str = "CORNER CAFE\n03/05/2024\nLatte 4.50\nBagel 3.25";
pub const RECEIPT_PAGE_2: &str = "Subtotal 7.75\nTax 0.62\nTotal: $8.37\nPaid VISA";

/// PNG-tagged document named `name`.
pub fn image(name: &str) -> Document {
    Document::new(vec![0x89, b'P', b'N', b'G'], MediaType::Image(ImageFormat::Png)).with_name(name)
}

/// Retry settings small enough for paused-clock tests.
pub fn fast_retry() -> RetryConfig {
    RetryConfig::default()
        .with_initial_interval(Duration::from_millis(10))
        .with_max_interval(Duration::from_millis(40))
        .with_max_elapsed_time(Duration::from_millis(200))
        .with_request_timeout(Some(Duration::from_millis(500)))
}

/// One scripted OCR step.
#[derive(Debug, Clone)]
pub enum OcrStep {
    Pages(Vec<OcrResult>),
    Fail(BoundaryError),
    /// Sleeps before answering with the pages.
    Slow(Duration, Vec<OcrResult>),
}

/// OCR fake answering per document name.
///
/// Each name has a script of steps; the last step repeats once the script
/// runs out. Unknown names fail with a 404.
#[derive(Default)]
pub struct ScriptedOcr {
    scripts: Mutex<HashMap<String, Vec<OcrStep>>>,
    calls: Mutex<HashMap<String, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedOcr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, name: &str, steps: Vec<OcrStep>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(name.to_string(), steps);
        self
    }

    pub fn pages(self, name: &str, pages: Vec<OcrResult>) -> Self {
        self.script(name, vec![OcrStep::Pages(pages)])
    }

    pub fn calls(&self, name: &str) -> u32 {
        self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self, name: &str) -> OcrStep {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(name.to_string()).or_insert(0);
            *count += 1;
            *count as usize - 1
        };
        let scripts = self.scripts.lock().unwrap();
        match scripts.get(name) {
            Some(steps) if !steps.is_empty() => steps[attempt.min(steps.len() - 1)].clone(),
            _ => OcrStep::Fail(BoundaryError::from_status(404, format!("no script for {name}"))),
        }
    }
}

#[async_trait]
impl OcrService for ScriptedOcr {
    fn name(&self) -> &str {
        "scripted_ocr"
    }

    async fn recognize(&self, document: &Document) -> Result<Vec<OcrResult>, BoundaryError> {
        let name = document.name().unwrap_or_default().to_string();
        let step = self.next_step(&name);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let outcome = match step {
            OcrStep::Pages(pages) => Ok(pages),
            OcrStep::Fail(err) => Err(err),
            OcrStep::Slow(delay, pages) => {
                tokio::time::sleep(delay).await;
                Ok(pages)
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

/// Extraction fake answering per exact source text.
///
/// Unknown texts fail with a 422. Every request is recorded.
#[derive(Default)]
pub struct ScriptedExtraction {
    answers: HashMap<String, Result<ExtractedRecord, BoundaryError>>,
    requests: Mutex<Vec<ExtractionRequest>>,
    calls: AtomicU32,
}

impl ScriptedExtraction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, source_text: &str, json: Value, confidence: f64) -> Self {
        self.answers.insert(
            source_text.to_string(),
            Ok(ExtractedRecord {
                json,
                extraction_confidence: confidence,
            }),
        );
        self
    }

    pub fn fail(mut self, source_text: &str, error: BoundaryError) -> Self {
        self.answers.insert(source_text.to_string(), Err(error));
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn schemas_requested(&self) -> Vec<SchemaDescriptor> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.target_schema.clone())
            .collect()
    }
}

#[async_trait]
impl ExtractionService for ScriptedExtraction {
    fn name(&self) -> &str {
        "scripted_extraction"
    }

    async fn extract(&self, request: &ExtractionRequest) -> Result<ExtractedRecord, BoundaryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.answers
            .get(&request.source_text)
            .cloned()
            .unwrap_or_else(|| {
                Err(BoundaryError::from_status(
                    422,
                    format!("unexpected source text: {:?}", request.source_text),
                ))
            })
    }
}

/// Observer recording every transition and stage outcome.
#[derive(Default)]
pub struct RecordingObserver {
    transitions: Mutex<Vec<(Uuid, PipelineState)>>,
    stages: Mutex<Vec<(Stage, bool)>>,
}

impl RecordingObserver {
    /// States visited by `run_id` after `Received`, in order.
    pub fn states_of(&self, run_id: Uuid) -> Vec<PipelineState> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == run_id)
            .map(|(_, state)| *state)
            .collect()
    }

    /// States visited by every run, in order.
    pub fn all_states(&self) -> Vec<PipelineState> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .map(|(_, state)| *state)
            .collect()
    }

    pub fn stages(&self) -> Vec<(Stage, bool)> {
        self.stages.lock().unwrap().clone()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_transition(&self, run_id: Uuid, _from: PipelineState, to: PipelineState) {
        self.transitions.lock().unwrap().push((run_id, to));
    }

    fn on_stage_complete(&self, _run_id: Uuid, stage: Stage, _elapsed: Duration, succeeded: bool) {
        self.stages.lock().unwrap().push((stage, succeeded));
    }
}
