//! End-to-end pipeline runs against scripted sources and a real database.

mod common;

use std::sync::Arc;

use feedlake::collector::Source;
use feedlake::db::{gold_repo, silver_repo};
use feedlake::pipeline::{CollectionKind, PipelineError, Stage};
use feedlake::quality::QualityGrade;

use common::*;

fn mixed_sources() -> Vec<Arc<dyn Source>> {
    vec![
        Arc::new(FakeSource::new(
            "reddit",
            vec![
                valid_reddit_post("r1"),
                invalid_reddit_post("r2"),
                valid_reddit_post("r3"),
                valid_reddit_post("r4"),
                invalid_reddit_post("r5"),
                valid_reddit_post("r6"),
            ],
        )),
        Arc::new(FakeSource::new(
            "twitter",
            vec![
                valid_tweet("t1"),
                invalid_tweet("t2"),
                valid_tweet("t3"),
                invalid_tweet("t4"),
            ],
        )),
    ]
}

#[tokio::test]
async fn test_only_valid_items_reach_gold() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(mixed_sources());

    let summary = pipeline.run(CollectionKind::Topic, 20).await.unwrap();

    assert_eq!(summary.total_items_processed, 10);
    assert_eq!(summary.total_bronze(), 10);
    assert_eq!(summary.total_silver(), 10);
    assert_eq!(summary.total_gold(), 6);
    assert_eq!(summary.per_source_gold_count["reddit"], 4);
    assert_eq!(summary.per_source_gold_count["twitter"], 2);
    assert_eq!(summary.valid_items(), 6);
    assert_eq!(summary.invalid_items(), 4);
    assert!(summary.errors.is_empty());
    assert!(summary.failed_sources.is_empty());

    let counts = harness.counts();
    assert_eq!(counts["bronze"], 10);
    assert_eq!(counts["silver"], 10);
    assert_eq!(counts["gold"], 6);
}

#[tokio::test]
async fn test_every_gold_row_has_a_valid_silver_parent() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(mixed_sources());
    pipeline.run(CollectionKind::Topic, 20).await.unwrap();

    let gold = gold_repo::list(&harness.db, None).unwrap();
    assert_eq!(gold.len(), 6);
    for row in &gold {
        let silver = silver_repo::find_by_id(&harness.db, &row.silver_id)
            .unwrap()
            .expect("gold row without silver parent");
        assert_eq!(silver.validation_status, "valid");
        assert_eq!(silver.external_id, row.external_id);
        assert!(silver.quality_score >= 0.8);
    }
}

#[tokio::test]
async fn test_overall_quality_is_mean_of_source_averages() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(mixed_sources());
    let summary = pipeline.run(CollectionKind::Trending, 20).await.unwrap();

    let reddit = summary.per_source_quality_summary["reddit"].average_quality_score;
    let twitter = summary.per_source_quality_summary["twitter"].average_quality_score;
    let expected = (reddit + twitter) / 2.0;
    assert!((summary.overall_quality_score - expected).abs() < 1e-9);
    assert_eq!(
        summary.quality_grade,
        QualityGrade::from_score(summary.overall_quality_score)
    );
}

#[tokio::test(start_paused = true)]
async fn test_total_source_failure_still_yields_summary() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(vec![
        Arc::new(FakeSource::failing("reddit")),
        Arc::new(FakeSource::failing("twitter")),
    ]);

    let summary = pipeline.run(CollectionKind::Topic, 20).await.unwrap();

    assert_eq!(summary.total_items_processed, 0);
    assert_eq!(summary.failed_sources, vec!["reddit", "twitter"]);
    assert_eq!(summary.total_bronze(), 0);
    assert_eq!(summary.overall_quality_score, 0.0);
    assert_eq!(summary.quality_grade, QualityGrade::F);
    assert_eq!(harness.counts()["bronze"], 0);
}

#[tokio::test(start_paused = true)]
async fn test_one_failing_source_leaves_others_intact() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(vec![
        Arc::new(FakeSource::new(
            "reddit",
            vec![valid_reddit_post("r1"), valid_reddit_post("r2")],
        )),
        Arc::new(FakeSource::failing("twitter")),
    ]);

    let summary = pipeline.run(CollectionKind::Topic, 20).await.unwrap();

    assert_eq!(summary.failed_sources, vec!["twitter"]);
    assert_eq!(summary.per_source_gold_count["reddit"], 2);
    assert_eq!(summary.per_source_bronze_count["twitter"], 0);
}

#[tokio::test]
async fn test_item_storage_failure_is_recorded_and_run_continues() {
    let harness = TestHarness::new();
    let store = FlakyStore::new(harness.storage()).fail_silver_for("r3");
    let pipeline = harness.pipeline_with_store(mixed_sources(), Arc::new(store));

    let summary = pipeline.run(CollectionKind::Topic, 20).await.unwrap();

    assert_eq!(summary.errors.len(), 1);
    let failure = &summary.errors[0];
    assert_eq!(failure.source_name, "reddit");
    assert_eq!(failure.external_id, "r3");
    assert_eq!(failure.stage, Stage::Silver);

    assert_eq!(summary.per_source_bronze_count["reddit"], 6);
    assert_eq!(summary.per_source_silver_count["reddit"], 5);
    assert_eq!(summary.per_source_gold_count["reddit"], 3);
    assert_eq!(summary.per_source_gold_count["twitter"], 2);
    assert_eq!(harness.counts()["gold"], 5);
}

#[tokio::test]
async fn test_unreachable_store_fails_the_run() {
    let harness = TestHarness::new();
    let store = FlakyStore::new(harness.storage()).unreachable();
    let source = Arc::new(FakeSource::new("reddit", vec![valid_reddit_post("r1")]));
    let sources: Vec<Arc<dyn Source>> = vec![source.clone()];
    let pipeline = harness.pipeline_with_store(sources, Arc::new(store));

    let err = pipeline.run(CollectionKind::Topic, 10).await.unwrap_err();
    assert!(matches!(err, PipelineError::StoreUnavailable(_)));
    assert_eq!(source.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stats_accumulate_across_runs() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(mixed_sources());

    pipeline.run(CollectionKind::Topic, 20).await.unwrap();
    pipeline.run(CollectionKind::Topic, 20).await.unwrap();

    let stats = pipeline.stats();
    assert_eq!(stats.runs, 2);
    assert_eq!(stats.total_processed, 20);
    assert_eq!(stats.total_valid, 12);
    assert_eq!(stats.total_invalid, 8);
    // Bronze never deduplicates.
    assert_eq!(harness.counts()["bronze"], 20);
}

#[tokio::test]
async fn test_cleanup_after_run_removes_every_tier() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(mixed_sources());
    pipeline.run(CollectionKind::Topic, 20).await.unwrap();

    let storage = harness.storage();
    assert_eq!(storage.cleanup_older_than(7).unwrap().total(), 0);

    let report = storage
        .cleanup_before(chrono::Utc::now() + chrono::Duration::seconds(5))
        .unwrap();
    assert_eq!(report.bronze, 10);
    assert_eq!(report.silver, 10);
    assert_eq!(report.gold, 6);
    assert_eq!(harness.counts()["silver"], 0);
}

#[tokio::test]
async fn test_default_collection_respects_run_limit() {
    let harness = TestHarness::new();
    let posts = (0..50).map(|i| valid_reddit_post(&format!("r{}", i))).collect();
    let pipeline = harness.pipeline(vec![Arc::new(FakeSource::new("reddit", posts))]);

    let summary = pipeline.run(CollectionKind::Default, 12).await.unwrap();
    assert_eq!(summary.total_items_processed, 12);
    assert_eq!(harness.counts()["bronze"], 12);

    // The per-source floor still applies to tiny budgets.
    let summary = pipeline.run(CollectionKind::Default, 3).await.unwrap();
    assert_eq!(summary.total_items_processed, 10);
}

#[tokio::test]
async fn test_extreme_engagement_counts_do_not_abort_the_run() {
    let harness = TestHarness::new();
    let mut viral = valid_reddit_post("r-viral");
    viral["score"] = serde_json::json!(i64::MAX);
    viral["num_comments"] = serde_json::json!(i64::MAX);
    let pipeline = harness.pipeline(vec![Arc::new(FakeSource::new(
        "reddit",
        vec![viral, valid_reddit_post("r-plain")],
    ))]);

    let summary = pipeline.run(CollectionKind::Topic, 20).await.unwrap();

    assert!(summary.errors.is_empty());
    assert_eq!(summary.per_source_gold_count["reddit"], 2);
    let gold = gold_repo::list(&harness.db, None).unwrap();
    let viral = gold
        .iter()
        .find(|row| row.external_id == "r-viral")
        .expect("viral post missing from gold");
    assert!(viral.engagement_score.is_finite());
    assert!(viral.engagement_score > 0.0);
}
