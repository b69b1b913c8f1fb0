//! Failure paths: retry exhaustion, permanent errors, timeouts and the stage
//! each failure is attributed to.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    fast_retry, image, OcrStep, RecordingObserver, ScriptedExtraction, ScriptedOcr, CHECK_TEXT,
};
use docex::{
    BoundaryError, DocumentKind, DocumentProcessor, OcrResult, PipelineError, PipelineState,
    RetryError, RetryPolicy, Stage,
};
use serde_json::json;

fn check_json() -> serde_json::Value {
    json!({ "checkNumber": "12345", "payee": "John Smith", "amount": 1234.56 })
}

fn check_pages() -> Vec<OcrResult> {
    vec![OcrResult::new(CHECK_TEXT, 0.9)]
}

#[tokio::test(start_paused = true)]
async fn retryable_ocr_failure_stops_at_budget_with_last_error() {
    let ocr = Arc::new(ScriptedOcr::new().script(
        "check.png",
        vec![
            OcrStep::Fail(BoundaryError::from_status(502, "bad gateway")),
            OcrStep::Fail(BoundaryError::from_status(503, "still overloaded")),
        ],
    ));
    let extraction = Arc::new(ScriptedExtraction::new().answer(CHECK_TEXT, check_json(), 0.8));
    let processor = DocumentProcessor::builder(ocr.clone(), extraction.clone())
        .retry_policy(RetryPolicy::new(fast_retry()))
        .build();

    let err = processor
        .process(&image("check.png"), &DocumentKind::Check)
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Ocr);
    let PipelineError::Ocr(RetryError::Exhausted {
        last,
        attempts,
        elapsed,
    }) = &err
    else {
        panic!("expected exhausted retries, got {err:?}");
    };
    assert_eq!(
        last,
        &BoundaryError::Service {
            status: 503,
            message: "still overloaded".into()
        }
    );
    assert!(*attempts > 2);
    assert_eq!(ocr.calls("check.png"), *attempts);
    assert!(*elapsed >= Duration::from_millis(200));
    assert!(*elapsed < Duration::from_millis(300));
    assert_eq!(extraction.calls(), 0);
    assert!(err.to_string().contains("still overloaded"));
}

#[tokio::test(start_paused = true)]
async fn client_error_surfaces_on_first_attempt() {
    let ocr = Arc::new(ScriptedOcr::new().script(
        "check.png",
        vec![OcrStep::Fail(BoundaryError::from_status(400, "unsupported image"))],
    ));
    let processor = DocumentProcessor::builder(ocr.clone(), ScriptedExtraction::new())
        .retry_policy(RetryPolicy::new(fast_retry()))
        .build();

    let err = processor
        .process(&image("check.png"), &DocumentKind::Check)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Ocr(RetryError::NonRetryable { attempts: 1, .. })
    ));
    assert_eq!(ocr.calls("check.png"), 1);
    assert_eq!(err.boundary_error().and_then(BoundaryError::status), Some(400));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_absorbed_by_retry() {
    let ocr = Arc::new(ScriptedOcr::new().script(
        "check.png",
        vec![
            OcrStep::Fail(BoundaryError::from_status(429, "slow down")),
            OcrStep::Fail(BoundaryError::Network("connection reset".into())),
            OcrStep::Pages(check_pages()),
        ],
    ));
    let processor = DocumentProcessor::builder(
        ocr.clone(),
        ScriptedExtraction::new().answer(CHECK_TEXT, check_json(), 0.8),
    )
    .retry_policy(RetryPolicy::new(fast_retry()))
    .build();

    let result = processor
        .process(&image("check.png"), &DocumentKind::Check)
        .await
        .expect("third attempt succeeds");

    assert_eq!(ocr.calls("check.png"), 3);
    assert_eq!(result.confidence.overall, 0.85);
}

#[tokio::test(start_paused = true)]
async fn timed_out_attempt_is_retried() {
    let ocr = Arc::new(ScriptedOcr::new().script(
        "check.png",
        vec![
            OcrStep::Slow(Duration::from_secs(5), check_pages()),
            OcrStep::Pages(check_pages()),
        ],
    ));
    let processor = DocumentProcessor::builder(
        ocr.clone(),
        ScriptedExtraction::new().answer(CHECK_TEXT, check_json(), 0.8),
    )
    .retry_policy(RetryPolicy::new(
        fast_retry().with_max_elapsed_time(Duration::from_secs(2)),
    ))
    .build();

    processor
        .process(&image("check.png"), &DocumentKind::Check)
        .await
        .expect("second attempt succeeds");
    assert_eq!(ocr.calls("check.png"), 2);
}

#[tokio::test(start_paused = true)]
async fn timeout_is_final_when_connection_retries_are_off() {
    let ocr = Arc::new(ScriptedOcr::new().script(
        "check.png",
        vec![OcrStep::Slow(Duration::from_secs(5), check_pages())],
    ));
    let processor = DocumentProcessor::builder(ocr.clone(), ScriptedExtraction::new())
        .retry_policy(RetryPolicy::new(
            fast_retry().with_retry_on_connection_error(false),
        ))
        .build();

    let err = processor
        .process(&image("check.png"), &DocumentKind::Check)
        .await
        .unwrap_err();

    assert_eq!(
        err.boundary_error(),
        Some(&BoundaryError::Timeout(Duration::from_millis(500)))
    );
    assert_eq!(ocr.calls("check.png"), 1);
}

#[tokio::test(start_paused = true)]
async fn extraction_failures_are_tagged_extraction() {
    let processor = DocumentProcessor::builder(
        ScriptedOcr::new().pages("check.png", check_pages()),
        ScriptedExtraction::new().fail(CHECK_TEXT, BoundaryError::from_status(401, "bad api key")),
    )
    .retry_policy(RetryPolicy::new(fast_retry()))
    .build();

    let err = processor
        .process(&image("check.png"), &DocumentKind::Check)
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Extraction);
    assert!(err.boundary_error().is_some_and(BoundaryError::is_auth_error));
    assert!(err.to_string().starts_with("extraction stage failed: "));
}

#[tokio::test(start_paused = true)]
async fn malformed_extraction_response_is_not_retried() {
    let extraction = Arc::new(ScriptedExtraction::new().fail(
        CHECK_TEXT,
        BoundaryError::MalformedResponse("expected a JSON object".into()),
    ));
    let processor = DocumentProcessor::builder(
        ScriptedOcr::new().pages("check.png", check_pages()),
        extraction.clone(),
    )
    .retry_policy(RetryPolicy::new(fast_retry()))
    .build();

    let err = processor
        .process(&image("check.png"), &DocumentKind::Check)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Extraction(RetryError::NonRetryable { .. })
    ));
    assert_eq!(extraction.calls(), 1);
}

#[tokio::test]
async fn failed_run_stops_at_failed_state() {
    let observer = Arc::new(RecordingObserver::default());
    let processor = DocumentProcessor::builder(
        ScriptedOcr::new().script(
            "check.png",
            vec![OcrStep::Fail(BoundaryError::from_status(403, "forbidden"))],
        ),
        ScriptedExtraction::new(),
    )
    .observer(observer.clone())
    .build();

    processor
        .process(&image("check.png"), &DocumentKind::Check)
        .await
        .unwrap_err();

    assert_eq!(
        observer.all_states(),
        vec![
            PipelineState::OcrInProgress,
            PipelineState::Failed(Stage::Ocr)
        ]
    );
    assert_eq!(observer.stages(), vec![(Stage::Ocr, false)]);
}

#[tokio::test]
async fn unknown_kind_fails_before_any_service_call() {
    let observer = Arc::new(RecordingObserver::default());
    let ocr = Arc::new(ScriptedOcr::new().pages("scan.png", check_pages()));
    let extraction = Arc::new(ScriptedExtraction::new());
    let processor = DocumentProcessor::builder(ocr.clone(), extraction.clone())
        .observer(observer.clone())
        .build();

    let err = processor
        .process(&image("scan.png"), &DocumentKind::Other("passport".into()))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::UnsupportedKind(_)));
    assert_eq!(err.stage(), Stage::Extraction);
    assert_eq!(err.stage_label(), "input");
    assert_eq!(ocr.calls("scan.png"), 0);
    assert_eq!(extraction.calls(), 0);
    assert_eq!(
        observer.all_states(),
        vec![PipelineState::Failed(Stage::Extraction)]
    );
}

#[tokio::test]
async fn out_of_range_confidence_fails_closed_without_failing_the_run() {
    let processor = DocumentProcessor::builder(
        ScriptedOcr::new().pages("check.png", vec![OcrResult::new(CHECK_TEXT, 1.5)]),
        ScriptedExtraction::new().answer(CHECK_TEXT, check_json(), 0.8),
    )
    .build();

    let result = processor
        .process(&image("check.png"), &DocumentKind::Check)
        .await
        .expect("confidence problems are advisory");

    assert_eq!(result.confidence.overall, 0.0);
    assert!(result.confidence.integrity_warning);
}
