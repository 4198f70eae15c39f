//! Resume integration tests.
//!
//! A failed item keeps its completed artifacts; a later run resumes from
//! the first missing stage without repeating any paid call.

mod common;

use std::sync::atomic::Ordering;

use tempfile::TempDir;

use common::{feed_item, identity_of, TestHarness};
use podflow::domain::{Stage, StageArtifact};

#[tokio::test]
async fn test_german_long_episode_runs_conditional_stages() {
    let temp = TempDir::new().unwrap();
    // German, 90 minutes: translation and chapters both really run
    let harness = TestHarness::new(temp.path(), "de", Some(90.0));
    let item = feed_item("ep-de");
    let identity = identity_of(&item);

    let summary = harness
        .orchestrator()
        .process_batch(std::slice::from_ref(&item))
        .await
        .unwrap();
    assert_eq!(summary.succeeded, 1);

    let entries = harness.ledger().entries_for(&identity).unwrap();
    let stages: Vec<Stage> = entries.iter().map(|e| e.stage).collect();
    assert_eq!(
        stages,
        vec![
            Stage::Transcribe,
            Stage::Translate,
            Stage::ExtractChapters,
            Stage::Summarize,
            Stage::Tag,
        ]
    );

    let artifacts = harness.artifact_store().load_all(&identity).await.unwrap();
    match artifacts.get(&Stage::Translate).unwrap() {
        StageArtifact::Translation { text } => assert_eq!(text, "translated transcript text"),
        other => panic!("unexpected artifact: {other:?}"),
    }
    match artifacts.get(&Stage::ExtractChapters).unwrap() {
        StageArtifact::Chapters { titles } => assert_eq!(titles.len(), 6),
        other => panic!("unexpected artifact: {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_item_resumes_without_repeating_paid_work() {
    let temp = TempDir::new().unwrap();
    let harness = TestHarness::new(temp.path(), "de", Some(90.0));
    let item = feed_item("ep-de");
    let identity = identity_of(&item);

    // Summarize fails on the first run
    harness.summary_llm.fail_next.store(true, Ordering::SeqCst);

    let first = harness
        .orchestrator()
        .process_batch(std::slice::from_ref(&item))
        .await
        .unwrap();
    assert_eq!(first.failed, 1);

    // Progress up to the failure is preserved
    let artifacts = harness.artifact_store().load_all(&identity).await.unwrap();
    assert!(artifacts.contains_key(&Stage::Translate));
    assert!(artifacts.contains_key(&Stage::ExtractChapters));
    assert!(!artifacts.contains_key(&Stage::Summarize));

    // Not done: the item must stay out of the seen-set
    assert!(!harness.seen().is_processed(&identity).unwrap());

    let transcribe_calls = harness.transcriber.calls.load(Ordering::SeqCst);
    let fast_calls = harness.fast_llm.calls.load(Ordering::SeqCst);
    assert_eq!(transcribe_calls, 1);
    assert_eq!(fast_calls, 2); // translate + chapters

    // Second invocation resumes from summarize
    let second = harness
        .orchestrator()
        .process_batch(std::slice::from_ref(&item))
        .await
        .unwrap();
    assert_eq!(second.succeeded, 1);

    // Fetch, transcription, translation, and chapters did not rerun
    assert_eq!(harness.fetcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.transcriber.calls.load(Ordering::SeqCst), transcribe_calls);
    // Only the tag call was added on the fast model
    assert_eq!(harness.fast_llm.calls.load(Ordering::SeqCst), fast_calls + 1);

    // Exactly one translation cost entry across both runs
    let entries = harness.ledger().entries_for(&identity).unwrap();
    let translate_entries = entries.iter().filter(|e| e.stage == Stage::Translate).count();
    assert_eq!(translate_entries, 1);

    assert!(harness.seen().is_processed(&identity).unwrap());
    assert_eq!(harness.sink.documents.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_resume_after_lost_seen_marker_marks_item_processed() {
    let temp = TempDir::new().unwrap();
    let harness = TestHarness::new(temp.path(), "en", Some(20.0));
    let item = feed_item("ep-crash");
    let identity = identity_of(&item);

    let first = harness
        .orchestrator()
        .process_batch(std::slice::from_ref(&item))
        .await
        .unwrap();
    assert_eq!(first.succeeded, 1);

    // Crash window: the publish artifact persisted but the seen-set
    // write was lost before it hit disk
    std::fs::remove_file(temp.path().join("seen.json")).unwrap();
    assert!(!harness.seen().is_processed(&identity).unwrap());

    let fast_calls = harness.fast_llm.calls.load(Ordering::SeqCst);
    let sink_calls = harness.sink.calls.load(Ordering::SeqCst);

    let second = harness
        .orchestrator()
        .process_batch(std::slice::from_ref(&item))
        .await
        .unwrap();
    assert_eq!(second.succeeded, 1);

    // All artifacts were already present, so no stage reran
    assert_eq!(harness.fetcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.fast_llm.calls.load(Ordering::SeqCst), fast_calls);
    assert_eq!(harness.sink.calls.load(Ordering::SeqCst), sink_calls);

    // But the done-marker was rewritten
    assert!(harness.seen().is_processed(&identity).unwrap());
}

#[tokio::test]
async fn test_unknown_duration_skips_chapters() {
    let temp = TempDir::new().unwrap();
    let harness = TestHarness::new(temp.path(), "en", None);
    let item = feed_item("ep-nodur");
    let identity = identity_of(&item);

    let summary = harness
        .orchestrator()
        .process_batch(std::slice::from_ref(&item))
        .await
        .unwrap();
    assert_eq!(summary.succeeded, 1);

    let artifacts = harness.artifact_store().load_all(&identity).await.unwrap();
    match artifacts.get(&Stage::ExtractChapters).unwrap() {
        StageArtifact::Chapters { titles } => assert!(titles.is_empty()),
        other => panic!("unexpected artifact: {other:?}"),
    }

    // No chapter cost entry
    let entries = harness.ledger().entries_for(&identity).unwrap();
    assert!(entries.iter().all(|e| e.stage != Stage::ExtractChapters));
}
