//! Background pipeline chain tests: per-step reporting and supersession.

mod common;

use std::sync::Arc;

use common::{FailingGenerator, FakeWiki, course_config};
use coursesmith::pipeline::{PipelineStep, StepOutcome};
use coursesmith::{
    ChunkerConfig, ContentStore, CoursePipeline, CourseProcessor, CourseSynthesizer,
    MockEmbeddingProvider, SqliteVectorStore,
};
use tempfile::TempDir;

struct Harness {
    wiki: FakeWiki,
    content: ContentStore,
    pipeline: Arc<CoursePipeline>,
    _data_dir: TempDir,
}

async fn harness() -> Harness {
    let wiki = FakeWiki::new();
    let index = Arc::new(SqliteVectorStore::in_memory().await.unwrap());
    let data_dir = TempDir::new().unwrap();
    let content = ContentStore::new(data_dir.path());
    let embeddings = Arc::new(MockEmbeddingProvider::new());
    let processor = Arc::new(CourseProcessor::new(
        Arc::new(wiki.clone()),
        embeddings.clone(),
        index.clone(),
        content.clone(),
        ChunkerConfig::default(),
    ));
    let synthesizer = Arc::new(CourseSynthesizer::new(
        index,
        embeddings,
        Arc::new(FailingGenerator),
        content.clone(),
    ));
    Harness {
        wiki,
        content,
        pipeline: Arc::new(CoursePipeline::new(processor, synthesizer)),
        _data_dir: data_dir,
    }
}

fn body(topic: &str) -> String {
    format!(
        "<p>{}</p>",
        format!("This page documents {topic} procedures that everyone should know about. ")
            .repeat(10)
    )
}

#[tokio::test]
async fn full_chain_completes_with_fallback_synthesis() {
    let h = harness().await;
    h.wiki.add_page("P1", "Handbook", &body("handbook"), 1);

    let config = course_config("demo", &["P1"], false);
    let report = h.pipeline.run(&config).await;

    assert!(report.succeeded());
    assert_eq!(report.steps.len(), 3);
    assert!(
        report
            .steps
            .iter()
            .all(|s| s.outcome == StepOutcome::Completed)
    );
    // Every artifact of the chain is persisted.
    assert!(h.content.load_snapshot("demo").await.unwrap().is_some());
    assert!(h.content.load_course("demo").await.unwrap().is_some());
    assert!(h.content.load_quiz("demo", None).await.unwrap().is_some());
}

#[tokio::test]
async fn quiz_step_is_skipped_when_disabled() {
    let h = harness().await;
    h.wiki.add_page("P1", "Handbook", &body("handbook"), 1);

    let mut config = course_config("demo", &["P1"], false);
    config.settings.test_at_end = false;
    let report = h.pipeline.run(&config).await;

    assert!(report.succeeded());
    let quiz_step = report
        .steps
        .iter()
        .find(|s| s.step == PipelineStep::GenerateQuiz)
        .unwrap();
    assert!(matches!(quiz_step.outcome, StepOutcome::Skipped { .. }));
    assert!(h.content.load_quiz("demo", None).await.unwrap().is_none());
}

#[tokio::test]
async fn processing_failure_stops_the_chain() {
    let h = harness().await;
    h.wiki.set_children("BAD", &["X"]);
    h.wiki.break_page("BAD");

    let config = course_config("demo", &["BAD"], true);
    let report = h.pipeline.run(&config).await;

    assert!(!report.succeeded());
    assert_eq!(report.steps.len(), 1);
    assert_eq!(report.steps[0].step, PipelineStep::Process);
    assert!(matches!(
        report.steps[0].outcome,
        StepOutcome::Failed { .. }
    ));
    assert!(h.content.load_course("demo").await.unwrap().is_none());
}

#[tokio::test]
async fn spawned_runs_supersede_previous_results() {
    let h = harness().await;
    h.wiki.add_page("P1", "Handbook", &body("first edition"), 1);

    let config = course_config("demo", &["P1"], false);
    let handle = h.pipeline.spawn(config.clone());
    let first = handle.await.unwrap();
    assert!(first.succeeded());

    // A later run against updated content fully replaces the snapshot.
    h.wiki.add_page("P1", "Handbook", &body("second edition"), 2);
    let second = h.pipeline.spawn(config).await.unwrap();
    assert!(second.succeeded());
    assert_ne!(first.run_id, second.run_id);

    let snapshot = h.content.load_snapshot("demo").await.unwrap().unwrap();
    assert_eq!(snapshot.processed_pages[0].version, 2);
}
