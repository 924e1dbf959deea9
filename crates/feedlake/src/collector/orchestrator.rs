//! Concurrent fan-out across registered collectors.
//!
//! Every `collect_all` spawns one task per requested, registered source.
//! Tasks are joined as they finish; a failed, timed-out or panicked task
//! only empties its own source's slot in the report.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tracing::{error, info, warn};

use super::item::{CollectedItem, CollectionRequest};
use super::retry::RetryPolicy;
use super::source::Source;
use super::source_collector::{CollectorHealthStats, SourceCollector};
use crate::config::CollectionConfig;
use crate::ratelimit::{RateLimitSnapshot, RateLimiter};

/// Knobs the orchestrator applies to every collector it registers.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub retry: RetryPolicy,
    pub task_timeout: Duration,
    pub min_per_source: usize,
    pub default_requests: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&CollectionConfig::default())
    }
}

impl From<&CollectionConfig> for OrchestratorSettings {
    fn from(config: &CollectionConfig) -> Self {
        Self {
            retry: RetryPolicy::new(config.max_retries),
            task_timeout: Duration::from_secs(config.timeout_secs),
            min_per_source: config.min_per_source,
            default_requests: config.default_requests.clone(),
        }
    }
}

/// Result of one `collect_all`.
#[derive(Debug, Default)]
pub struct CollectionReport {
    /// One entry per source that was both requested and registered.
    pub items: BTreeMap<String, Vec<CollectedItem>>,
    /// Sorted names of sources whose task failed.
    pub failed_sources: Vec<String>,
    pub failure_reasons: BTreeMap<String, String>,
}

impl CollectionReport {
    pub fn total_items(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectorStatus {
    pub stats: CollectorHealthStats,
    pub rate_limit: Option<RateLimitSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub total_collectors: usize,
    pub collectors: BTreeMap<String, CollectorStatus>,
    pub last_orchestration: Option<DateTime<Utc>>,
    pub last_failed_sources: Vec<String>,
}

#[derive(Debug, Default)]
struct LastRun {
    at: Option<DateTime<Utc>>,
    failed_sources: Vec<String>,
}

pub struct Orchestrator {
    collectors: BTreeMap<String, Arc<SourceCollector>>,
    limiter: RateLimiter,
    settings: OrchestratorSettings,
    last_run: Mutex<LastRun>,
}

impl Orchestrator {
    pub fn new(limiter: RateLimiter, settings: OrchestratorSettings) -> Self {
        Self {
            collectors: BTreeMap::new(),
            limiter,
            settings,
            last_run: Mutex::new(LastRun::default()),
        }
    }

    /// Wraps `source` in a collector sharing this orchestrator's limiter.
    ///
    /// A source registered under an existing name replaces it.
    pub fn register(&mut self, source: Arc<dyn Source>) {
        let name = source.name().to_string();
        if !self.limiter.is_configured(&name) {
            warn!(source = %name, "Registering source without a rate limit profile");
        }
        let collector = SourceCollector::new(source, self.limiter.clone(), self.settings.retry)
            .with_health_timeout(self.settings.task_timeout)
            .with_task_timeout(self.settings.task_timeout);
        if self.collectors.insert(name.clone(), Arc::new(collector)).is_some() {
            warn!(source = %name, "Replaced previously registered source");
        } else {
            info!(source = %name, "Collector registered");
        }
    }

    pub fn source_names(&self) -> Vec<String> {
        self.collectors.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Runs every request for a registered source concurrently.
    ///
    /// Never fails: a source whose task errors, times out or panics maps to
    /// an empty vector and is listed in `failed_sources`. Only the first
    /// request per source runs; repeats are skipped.
    pub async fn collect_all(&self, requests: Vec<CollectionRequest>) -> CollectionReport {
        let mut report = CollectionReport::default();

        if self.collectors.is_empty() {
            error!("No collectors available");
            return report;
        }

        let mut pending = FuturesUnordered::new();
        let mut scheduled = BTreeSet::new();
        for request in requests {
            let Some(collector) = self.collectors.get(&request.source_name).cloned() else {
                warn!(source = %request.source_name, "Skipping request for unregistered source");
                continue;
            };
            if !scheduled.insert(request.source_name.clone()) {
                warn!(source = %request.source_name, "Skipping duplicate request for source");
                continue;
            }
            let name = request.source_name.clone();
            let task = collector.clone();
            let handle = tokio::spawn(async move { task.collect_with_retry(&request).await });
            pending.push(async move { (name, collector, handle.await) });
        }

        while let Some((name, collector, joined)) = pending.next().await {
            let failure = match joined {
                Ok(Ok(items)) => {
                    report.items.insert(name, items);
                    continue;
                }
                Ok(Err(err)) => err.to_string(),
                Err(join_err) => {
                    collector.record_abandoned();
                    if join_err.is_panic() {
                        "collection task panicked".to_string()
                    } else {
                        format!("collection task aborted: {}", join_err)
                    }
                }
            };
            error!(source = %name, reason = %failure, "Source collection failed");
            report.items.insert(name.clone(), Vec::new());
            report.failure_reasons.insert(name.clone(), failure);
            report.failed_sources.push(name);
        }
        report.failed_sources.sort();

        if report.failed_sources.is_empty() {
            info!(
                sources = report.items.len(),
                items = report.total_items(),
                "All collections completed successfully"
            );
        } else {
            warn!(failed = ?report.failed_sources, "Collection failed for some sources");
        }

        {
            let mut last_run = self.lock_last_run();
            last_run.at = Some(Utc::now());
            last_run.failed_sources = report.failed_sources.clone();
        }

        report
    }

    /// Technology-topic collection across every registered source.
    pub async fn collect_by_topic(&self, limit: usize) -> CollectionReport {
        let per_source = self.split_limit(limit);
        let requests = self
            .collectors
            .keys()
            .map(|name| {
                let request = CollectionRequest::new(name.as_str(), per_source);
                match name.as_str() {
                    "reddit" => request.with_param("subreddit", "technology"),
                    "news" => request.with_param("query", "artificial intelligence technology"),
                    "twitter" => {
                        request.with_param("query", "#technology OR #AI OR #machinelearning")
                    }
                    _ => request,
                }
            })
            .collect();
        self.collect_all(requests).await
    }

    /// Popular-right-now collection: hot posts, top headlines, recent tweets.
    pub async fn collect_trending(&self, limit: usize) -> CollectionReport {
        let per_source = self.split_limit(limit);
        let requests = self
            .collectors
            .keys()
            .map(|name| {
                let request = CollectionRequest::new(name.as_str(), per_source);
                match name.as_str() {
                    "reddit" => request
                        .with_param("subreddit", "technology")
                        .with_param("sort", "hot"),
                    _ => request,
                }
            })
            .collect();
        self.collect_all(requests).await
    }

    /// Collection driven by the configured default requests.
    ///
    /// `limit` is split evenly across sources like the other kinds. Sources
    /// without configured parameters fall back to the topic defaults; a
    /// configured `limit` parameter replaces that source's share.
    pub async fn collect_default(&self, limit: usize) -> CollectionReport {
        let per_source = self.split_limit(limit);
        let requests = self
            .collectors
            .keys()
            .map(|name| {
                let mut request = CollectionRequest::new(name.as_str(), per_source);
                match self.settings.default_requests.get(name) {
                    Some(params) => {
                        for (key, value) in params {
                            if key == "limit" {
                                match value.parse() {
                                    Ok(limit) => request.limit = limit,
                                    Err(_) => {
                                        warn!(source = %name, limit = %value, "Ignoring unparseable limit")
                                    }
                                }
                            } else {
                                request.parameters.insert(key.clone(), value.clone());
                            }
                        }
                    }
                    None => {
                        request = match name.as_str() {
                            "reddit" => request.with_param("subreddit", "technology"),
                            "news" => request.with_param("query", "artificial intelligence"),
                            "twitter" => request.with_param("query", "#technology"),
                            _ => request,
                        }
                    }
                }
                request
            })
            .collect();
        self.collect_all(requests).await
    }

    /// Health-checks every collector concurrently.
    pub async fn health_check_all(&self) -> BTreeMap<String, bool> {
        let checks = self.collectors.iter().map(|(name, collector)| async move {
            (name.clone(), collector.health_check().await)
        });
        join_all(checks).await.into_iter().collect()
    }

    pub async fn status(&self) -> OrchestratorStatus {
        let mut collectors = BTreeMap::new();
        for (name, collector) in &self.collectors {
            collectors.insert(
                name.clone(),
                CollectorStatus {
                    stats: collector.stats(),
                    rate_limit: self.limiter.snapshot(name).await,
                },
            );
        }
        let last_run = self.lock_last_run();
        OrchestratorStatus {
            total_collectors: self.collectors.len(),
            collectors,
            last_orchestration: last_run.at,
            last_failed_sources: last_run.failed_sources.clone(),
        }
    }

    /// Even share of `limit` per registered source, never below the floor.
    pub fn split_limit(&self, limit: usize) -> usize {
        let sources = self.collectors.len().max(1);
        (limit / sources).max(self.settings.min_per_source)
    }

    fn lock_last_run(&self) -> std::sync::MutexGuard<'_, LastRun> {
        self.last_run
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
