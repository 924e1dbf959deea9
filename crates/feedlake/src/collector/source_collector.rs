use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};

use super::item::{CollectedItem, CollectionRequest, SourceKind};
use super::retry::{RetryOutcome, RetryPolicy};
use super::source::Source;
use crate::error::{CollectionError, SourceError};
use crate::ratelimit::RateLimiter;

const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(30);

/// Running totals for one collector. Counters only ever grow.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectorHealthStats {
    pub name: String,
    /// Terminal outcomes, successful or not.
    pub collection_count: u64,
    pub error_count: u64,
    pub last_collection_time: Option<DateTime<Utc>>,
    pub last_item_count: usize,
}

impl CollectorHealthStats {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn success_rate(&self) -> f64 {
        let successes = self.collection_count.saturating_sub(self.error_count);
        successes as f64 / self.collection_count.max(1) as f64
    }
}

/// Rate-limited, retrying wrapper around one [`Source`].
pub struct SourceCollector {
    source: Arc<dyn Source>,
    limiter: RateLimiter,
    policy: RetryPolicy,
    health_timeout: Duration,
    task_timeout: Option<Duration>,
    stats: Mutex<CollectorHealthStats>,
}

impl SourceCollector {
    pub fn new(source: Arc<dyn Source>, limiter: RateLimiter, policy: RetryPolicy) -> Self {
        let stats = CollectorHealthStats::new(source.name());
        Self {
            source,
            limiter,
            policy,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            task_timeout: None,
            stats: Mutex::new(stats),
        }
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    /// Bounds a whole `collect_with_retry`, retries and backoff included.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub fn stats(&self) -> CollectorHealthStats {
        self.lock_stats().clone()
    }

    /// Collects from the source, retrying per the policy.
    ///
    /// Each attempt first passes through the rate limiter and reports its
    /// outcome back to it. Items failing `validate_item` are dropped; the
    /// rest are transformed in their original order. With a task timeout
    /// set, running out of time abandons the in-flight attempt and ends
    /// with `SourceError::Timeout`.
    pub async fn collect_with_retry(
        &self,
        request: &CollectionRequest,
    ) -> Result<Vec<CollectedItem>, CollectionError> {
        let name = self.source.name();
        let span = info_span!("collect", source = %name, limit = request.limit);
        let started = AtomicU32::new(0);
        let started = &started;

        let retrying = self
            .policy
            .run(name, move |attempt| {
                started.store(attempt + 1, Ordering::Relaxed);
                self.attempt(request, attempt)
            })
            .instrument(span.clone());
        let outcome = match self.task_timeout {
            Some(limit) => tokio::time::timeout(limit, retrying).await.unwrap_or_else(|_| {
                RetryOutcome::Exhausted {
                    last_error: SourceError::Timeout(limit),
                    attempts: started.load(Ordering::Relaxed),
                }
            }),
            None => retrying.await,
        };
        if let RetryOutcome::Exhausted {
            last_error: SourceError::Timeout(_),
            ..
        } = &outcome
        {
            // The abandoned attempt never reported back to the limiter.
            self.limiter.record_failure(name).await;
        }

        let _guard = span.enter();
        match outcome {
            RetryOutcome::Success { value, attempts } => {
                let received = value.len();
                let kind = self.source.kind();
                let items: Vec<CollectedItem> = value
                    .into_iter()
                    .filter(|raw| self.source.validate_item(raw))
                    .map(|raw| {
                        let mut item = CollectedItem::new(name, self.source.transform_item(raw));
                        item.kind = kind;
                        item
                    })
                    .collect();

                if items.len() < received {
                    debug!(
                        dropped = received - items.len(),
                        "Dropped items failing source validation"
                    );
                }
                if items.is_empty() {
                    warn!(attempts, "Collection succeeded but yielded no items");
                } else {
                    info!(items = items.len(), attempts, "Collection succeeded");
                }

                self.record_outcome(Ok(items.len()));
                Ok(items)
            }
            RetryOutcome::Exhausted {
                last_error,
                attempts,
            } => {
                if let SourceError::Timeout(limit) = &last_error {
                    warn!(attempts, timeout_secs = limit.as_secs(), "Collection timed out");
                } else {
                    warn!(attempts, error = %last_error, "Collection failed after all attempts");
                }
                self.record_outcome(Err(()));

                Err(CollectionError {
                    source_name: name.to_string(),
                    cause: last_error,
                    attempts,
                })
            }
        }
    }

    async fn attempt(
        &self,
        request: &CollectionRequest,
        attempt: u32,
    ) -> Result<Vec<Value>, SourceError> {
        let name = self.source.name();
        let waited = self.limiter.admit_or_wait(name).await;
        debug!(
            attempt = attempt + 1,
            waited_secs = waited.as_secs_f64(),
            "Attempting collection"
        );
        match self.source.collect(request).await {
            Ok(raw) => {
                self.limiter.record_success(name).await;
                Ok(raw)
            }
            Err(err) => {
                if err.is_rate_limited() {
                    warn!(attempt = attempt + 1, "Provider rejected the request rate");
                }
                self.limiter.record_failure(name).await;
                Err(err)
            }
        }
    }

    /// Counts a collection that ended without reporting back, such as a
    /// task that panicked.
    pub fn record_abandoned(&self) {
        self.record_outcome(Err(()));
    }

    fn record_outcome(&self, outcome: Result<usize, ()>) {
        let mut stats = self.lock_stats();
        stats.collection_count += 1;
        stats.last_collection_time = Some(Utc::now());
        match outcome {
            Ok(items) => stats.last_item_count = items,
            Err(()) => {
                stats.error_count += 1;
                stats.last_item_count = 0;
            }
        }
    }

    /// One unretried, unthrottled `collect` with `limit = 1`.
    ///
    /// Does not touch the collection stats.
    pub async fn health_check(&self) -> bool {
        let name = self.source.name();
        let request = CollectionRequest::new(name, 1);
        match tokio::time::timeout(self.health_timeout, self.source.collect(&request)).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                warn!(source = %name, error = %err, "Health check failed");
                false
            }
            Err(_) => {
                warn!(
                    source = %name,
                    timeout_secs = self.health_timeout.as_secs(),
                    "Health check timed out"
                );
                false
            }
        }
    }

    fn lock_stats(&self) -> MutexGuard<'_, CollectorHealthStats> {
        // Stats are plain counters; a poisoned lock still holds usable data.
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
