pub mod analytics;
pub mod collector;
pub mod config;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod quality;
pub mod ratelimit;
pub mod secrets;
pub mod sentiment;
pub mod sources;
pub mod storage;

pub use analytics::{Analytics, BusinessMetrics};
pub use collector::{
    CollectedItem, CollectionReport, CollectionRequest, Orchestrator, OrchestratorSettings,
    Source, SourceCollector, SourceKind,
};
pub use config::{load_config, load_config_or_default, Config};
pub use db::Database;
pub use error::{
    CollectionError, ConfigError, FeedlakeError, Result, SourceError, StorageError,
};
pub use pipeline::{CollectionKind, Pipeline, PipelineError, PipelineRunSummary, PipelineScheduler};
pub use quality::{DataQualityResult, QualityGrade, QualityValidator};
pub use ratelimit::{RateLimitConfig, RateLimiter};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use sentiment::{NoopScorer, Sentiment, SentimentScorer};
pub use storage::{LakeStore, TieredStorage};
