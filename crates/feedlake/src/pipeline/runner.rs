use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn, Instrument};

use super::error::{ItemFailure, PipelineError, Stage};
use super::summary::{overall_quality, PipelineRunSummary, PipelineStats};
use crate::analytics;
use crate::collector::{CollectedItem, Orchestrator};
use crate::config::Config;
use crate::db::Database;
use crate::error::ConfigError;
use crate::quality::{summarize, DataQualityResult, QualityGrade, QualityValidator};
use crate::sentiment::{NoopScorer, SentimentScorer};
use crate::sources;
use crate::storage::{LakeStore, NormalizedFields, TieredStorage};

/// Which request set a run collects with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Topic,
    Trending,
    Default,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Topic => "topic",
            CollectionKind::Trending => "trending",
            CollectionKind::Default => "default",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "topic" => Ok(CollectionKind::Topic),
            "trending" => Ok(CollectionKind::Trending),
            "default" => Ok(CollectionKind::Default),
            other => Err(format!("unknown collection kind '{}'", other)),
        }
    }
}

/// What happened to one item on its way through the tiers.
struct ItemOutcome {
    quality: Option<DataQualityResult>,
    silver: bool,
    gold: bool,
}

/// Collect, validate and store in one pass.
pub struct Pipeline {
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn LakeStore>,
    validator: QualityValidator,
    scorer: Arc<dyn SentimentScorer>,
    stats: Mutex<PipelineStats>,
}

impl Pipeline {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        store: Arc<dyn LakeStore>,
        validator: QualityValidator,
    ) -> Self {
        Self {
            orchestrator,
            store,
            validator,
            scorer: Arc::new(NoopScorer),
            stats: Mutex::new(PipelineStats::default()),
        }
    }

    /// Production constructor: sources with credentials, configured rate
    /// limits and the SQLite-backed store.
    pub fn from_config(config: &Config, db: Database) -> Result<Self, ConfigError> {
        let orchestrator = sources::build_orchestrator(config)?;
        Ok(Self::new(
            Arc::new(orchestrator),
            Arc::new(TieredStorage::new(db)),
            QualityValidator::new(config.collection.quality_threshold),
        ))
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn SentimentScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn stats(&self) -> PipelineStats {
        self.lock_stats().clone()
    }

    /// Runs one collection cycle end to end.
    ///
    /// Only an unreachable store fails the run. Source failures and
    /// per-item storage errors are reported in the summary.
    pub async fn run(
        &self,
        kind: CollectionKind,
        limit: usize,
    ) -> Result<PipelineRunSummary, PipelineError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let span = info_span!("pipeline", kind = %kind, limit);

        self.store.ping().map_err(PipelineError::StoreUnavailable)?;

        let report = async {
            match kind {
                CollectionKind::Topic => self.orchestrator.collect_by_topic(limit).await,
                CollectionKind::Trending => self.orchestrator.collect_trending(limit).await,
                CollectionKind::Default => self.orchestrator.collect_default(limit).await,
            }
        }
        .instrument(span.clone())
        .await;

        let _guard = span.enter();
        let total_items_processed = report.total_items();
        info!(
            items = total_items_processed,
            failed_sources = report.failed_sources.len(),
            "Collection finished"
        );

        let mut bronze_counts = BTreeMap::new();
        let mut silver_counts = BTreeMap::new();
        let mut gold_counts = BTreeMap::new();
        let mut quality_summaries = BTreeMap::new();
        let mut errors = Vec::new();

        for (source_name, items) in &report.items {
            let _step = info_span!("store_source", source = %source_name).entered();
            let mut bronze = 0;
            let mut silver = 0;
            let mut gold = 0;
            let mut results = Vec::with_capacity(items.len());

            for item in items {
                match self.process_item(item) {
                    Ok(outcome) => {
                        bronze += 1;
                        if outcome.silver {
                            silver += 1;
                        }
                        if outcome.gold {
                            gold += 1;
                        }
                        results.extend(outcome.quality);
                    }
                    Err((failure, quality)) => {
                        warn!(%failure, "Item storage failed");
                        if failure.stage != Stage::Bronze {
                            bronze += 1;
                        }
                        if failure.stage == Stage::Gold {
                            silver += 1;
                        }
                        results.extend(quality);
                        errors.push(failure);
                    }
                }
            }

            let quality = summarize(&results);
            debug!(
                bronze,
                silver,
                gold,
                grade = %quality.grade,
                "Source stored"
            );
            bronze_counts.insert(source_name.clone(), bronze);
            silver_counts.insert(source_name.clone(), silver);
            gold_counts.insert(source_name.clone(), gold);
            quality_summaries.insert(source_name.clone(), quality);
        }

        let overall_quality_score = overall_quality(&quality_summaries);
        let summary = PipelineRunSummary {
            collection_kind: kind,
            started_at,
            duration_seconds: clock.elapsed().as_secs_f64(),
            per_source_bronze_count: bronze_counts,
            per_source_silver_count: silver_counts,
            per_source_gold_count: gold_counts,
            per_source_quality_summary: quality_summaries,
            failed_sources: report.failed_sources,
            errors,
            total_items_processed,
            overall_quality_score,
            quality_grade: QualityGrade::from_score(overall_quality_score),
        };

        info!(
            bronze = summary.total_bronze(),
            silver = summary.total_silver(),
            gold = summary.total_gold(),
            errors = summary.errors.len(),
            quality = summary.overall_quality_score,
            grade = %summary.quality_grade,
            duration_secs = summary.duration_seconds,
            "Pipeline run complete"
        );

        self.lock_stats().record(&summary);
        Ok(summary)
    }

    /// Bronze, then validation and silver, then gold iff valid.
    ///
    /// On failure returns the quality verdict if validation already ran.
    fn process_item(
        &self,
        item: &CollectedItem,
    ) -> Result<ItemOutcome, (ItemFailure, Option<DataQualityResult>)> {
        let fail = |stage, err, quality| {
            Err((
                ItemFailure::new(&item.source_name, &item.external_id, stage, &err),
                quality,
            ))
        };

        let bronze_id = match self.store.store_bronze(item) {
            Ok(id) => id,
            Err(err) => return fail(Stage::Bronze, err, None),
        };

        let quality = self.validator.validate(item.kind, &item.payload);
        let silver_id = match self.store.store_silver(&bronze_id, item, &quality) {
            Ok(id) => id,
            Err(err) => return fail(Stage::Silver, err, Some(quality)),
        };

        if !quality.is_valid {
            return Ok(ItemOutcome {
                quality: Some(quality),
                silver: true,
                gold: false,
            });
        }

        let sentiment = self.scorer.score(&sentiment_text(&item.payload));
        let (analytics, metrics) =
            analytics::analyze(item.kind, &item.payload, sentiment, Utc::now());
        if let Err(err) = self
            .store
            .store_gold(&silver_id, item, &analytics, &metrics)
        {
            return fail(Stage::Gold, err, Some(quality));
        }

        Ok(ItemOutcome {
            quality: Some(quality),
            silver: true,
            gold: true,
        })
    }

    fn lock_stats(&self) -> MutexGuard<'_, PipelineStats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Title and body joined, for the sentiment scorer.
fn sentiment_text(payload: &serde_json::Value) -> String {
    let fields = NormalizedFields::from_payload(payload);
    [fields.title, fields.content]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::testing::ScriptedSource;
    use crate::collector::OrchestratorSettings;
    use crate::db::{gold_repo, silver_repo};
    use crate::ratelimit::{RateLimitConfig, RateLimiter};
    use crate::sentiment::{Sentiment, SentimentLabel};
    use serde_json::json;

    struct AlwaysPositive;

    impl SentimentScorer for AlwaysPositive {
        fn score(&self, _text: &str) -> Option<Sentiment> {
            Some(Sentiment {
                label: SentimentLabel::Positive,
                confidence: 0.75,
            })
        }
    }

    fn generic_item(id: &str, title: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": title,
            "content": "body",
            "url": "https://example.com",
            "author": "someone",
            "published_at": crate::db::format_timestamp(Utc::now())
        })
    }

    fn pipeline_with(items: Vec<serde_json::Value>, db: &Database) -> Pipeline {
        let limiter = RateLimiter::new(BTreeMap::from([(
            "feed".to_string(),
            RateLimitConfig::new(1000, 10_000, 100_000),
        )]));
        let mut orchestrator = Orchestrator::new(limiter, OrchestratorSettings::default());
        orchestrator.register(Arc::new(ScriptedSource::new("feed").with_items(items)));
        Pipeline::new(
            Arc::new(orchestrator),
            Arc::new(TieredStorage::new(db.clone())),
            QualityValidator::default(),
        )
    }

    #[test]
    fn test_collection_kind_parse() {
        assert_eq!("topic".parse::<CollectionKind>(), Ok(CollectionKind::Topic));
        assert_eq!("Trending".parse::<CollectionKind>(), Ok(CollectionKind::Trending));
        assert!("weekly".parse::<CollectionKind>().is_err());
        assert_eq!(CollectionKind::Default.to_string(), "default");
    }

    #[tokio::test]
    async fn test_valid_and_invalid_items_split_across_tiers() {
        let db = Database::open_in_memory().unwrap();
        let pipeline = pipeline_with(
            vec![
                generic_item("1", "A good title"),
                json!({"id": "2"}),
                generic_item("3", "Another good title"),
            ],
            &db,
        )
        .with_scorer(Arc::new(AlwaysPositive));

        let summary = pipeline.run(CollectionKind::Default, 10).await.unwrap();

        assert_eq!(summary.per_source_bronze_count["feed"], 3);
        assert_eq!(summary.per_source_silver_count["feed"], 3);
        assert_eq!(summary.per_source_gold_count["feed"], 2);
        assert!(summary.errors.is_empty());
        assert!(summary.failed_sources.is_empty());
        assert_eq!(summary.per_source_quality_summary["feed"].valid, 2);

        let gold = gold_repo::list(&db, Some("feed")).unwrap();
        assert_eq!(gold.len(), 2);
        for row in gold {
            let silver = silver_repo::find_by_id(&db, &row.silver_id).unwrap().unwrap();
            assert_eq!(silver.validation_status, "valid");
            assert_eq!(row.sentiment_label.as_deref(), Some("positive"));
        }

        let stats = pipeline.stats();
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.total_processed, 3);
        assert_eq!(stats.total_valid, 2);
        assert_eq!(stats.total_invalid, 1);
    }

    #[test]
    fn test_sentiment_text_joins_title_and_body() {
        assert_eq!(
            sentiment_text(&json!({"title": "Head", "selftext": "Body"})),
            "Head Body"
        );
        assert_eq!(sentiment_text(&json!({"text": "Only"})), "Only");
        assert_eq!(sentiment_text(&json!({})), "");
    }
}
