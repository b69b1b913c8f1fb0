//! Batch processing: ordering, isolation and the concurrency bound.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fast_retry, image, OcrStep, ScriptedExtraction, ScriptedOcr, CHECK_TEXT};
use docex::{
    BoundaryError, DocumentKind, DocumentProcessor, OcrResult, RetryPolicy, Stage,
};
use serde_json::json;

fn check_pages() -> Vec<OcrResult> {
    vec![OcrResult::new(CHECK_TEXT, 0.9)]
}

fn check_extraction() -> ScriptedExtraction {
    ScriptedExtraction::new().answer(
        CHECK_TEXT,
        json!({ "checkNumber": "12345", "payee": "John Smith", "amount": 1234.56 }),
        0.8,
    )
}

fn names<'a>(results: impl IntoIterator<Item = &'a docex::ProcessingResult>) -> Vec<String> {
    results
        .into_iter()
        .filter_map(|result| result.document_name.clone())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn one_failure_does_not_affect_its_neighbours() {
    let ocr = ScriptedOcr::new()
        .pages("a.png", check_pages())
        .script(
            "b.png",
            vec![OcrStep::Fail(BoundaryError::from_status(503, "down"))],
        )
        .pages("c.png", check_pages());
    let processor = DocumentProcessor::builder(ocr, check_extraction())
        .retry_policy(RetryPolicy::new(fast_retry()))
        .build();

    let items = vec![
        (image("a.png"), DocumentKind::Check),
        (image("b.png"), DocumentKind::Check),
        (image("c.png"), DocumentKind::Check),
    ];
    let results = processor.process_batch(&items).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().document_name.as_deref(), Some("a.png"));
    assert_eq!(results[1].as_ref().unwrap_err().stage(), Stage::Ocr);
    assert_eq!(results[2].as_ref().unwrap().document_name.as_deref(), Some("c.png"));
    assert_eq!(results[2].as_ref().unwrap().confidence.overall, 0.85);
}

#[tokio::test(start_paused = true)]
async fn results_follow_submission_order_not_completion_order() {
    let ocr = ScriptedOcr::new()
        .script(
            "slow.png",
            vec![OcrStep::Slow(Duration::from_millis(300), check_pages())],
        )
        .script(
            "medium.png",
            vec![OcrStep::Slow(Duration::from_millis(100), check_pages())],
        )
        .pages("fast.png", check_pages());
    let processor = DocumentProcessor::builder(ocr, check_extraction()).build();

    let results = processor
        .process_all(
            vec![image("slow.png"), image("medium.png"), image("fast.png")],
            &DocumentKind::Check,
        )
        .await;

    let succeeded: Vec<_> = results.iter().map(|r| r.as_ref().unwrap()).collect();
    assert_eq!(names(succeeded), vec!["slow.png", "medium.png", "fast.png"]);
}

#[tokio::test(start_paused = true)]
async fn in_flight_documents_never_exceed_the_limit() {
    let mut ocr = ScriptedOcr::new();
    let mut documents = Vec::new();
    for i in 0..6 {
        let name = format!("doc-{i}.png");
        ocr = ocr.script(
            &name,
            vec![OcrStep::Slow(Duration::from_millis(50), check_pages())],
        );
        documents.push(image(&name));
    }
    let ocr = Arc::new(ocr);
    let processor = DocumentProcessor::builder(ocr.clone(), check_extraction())
        .max_concurrency(2)
        .build();

    let results = processor.process_all(documents, &DocumentKind::Check).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(ocr.max_in_flight(), 2);
}

#[tokio::test]
async fn empty_batch_returns_nothing() {
    let processor = DocumentProcessor::builder(ScriptedOcr::new(), ScriptedExtraction::new()).build();
    assert!(processor.process_batch(&[]).await.is_empty());
}

#[tokio::test]
async fn zero_concurrency_is_raised_to_one() {
    let processor = DocumentProcessor::builder(ScriptedOcr::new(), ScriptedExtraction::new())
        .max_concurrency(0)
        .build();
    assert_eq!(processor.max_concurrency(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn processor_is_shared_across_tasks() {
    let mut ocr = ScriptedOcr::new();
    for i in 0..8 {
        ocr = ocr.pages(&format!("doc-{i}.png"), check_pages());
    }
    let processor = Arc::new(DocumentProcessor::builder(ocr, check_extraction()).build());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let processor = Arc::clone(&processor);
            tokio::spawn(async move {
                processor
                    .process(&image(&format!("doc-{i}.png")), &DocumentKind::Check)
                    .await
            })
        })
        .collect();

    let mut run_ids = Vec::new();
    for handle in handles {
        let result = handle.await.expect("task panicked").expect("document succeeds");
        assert_eq!(result.confidence.overall, 0.85);
        run_ids.push(result.run_id);
    }
    run_ids.sort();
    run_ids.dedup();
    assert_eq!(run_ids.len(), 8, "every run gets its own id");
}
