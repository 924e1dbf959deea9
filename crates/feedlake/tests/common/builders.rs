//! Builders for payloads, sources and stores used across integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use feedlake::analytics::{Analytics, BusinessMetrics};
use feedlake::collector::{has_fields, CollectedItem, CollectionRequest, Source};
use feedlake::error::{SourceError, StorageError};
use feedlake::quality::DataQualityResult;
use feedlake::storage::{LakeStore, TieredStorage};

/// A reddit post that scores 1.0.
pub fn valid_reddit_post(id: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Interesting post number {}", id),
        "author": "ferris",
        "score": 250,
        "created_utc": Utc::now().timestamp() - 120,
        "selftext": "Body text",
        "url": format!("https://reddit.com/r/rust/{}", id),
        "subreddit": "rust",
        "num_comments": 12
    })
}

/// A reddit post missing most required fields; always below threshold.
pub fn invalid_reddit_post(id: &str) -> Value {
    json!({"id": id, "title": "Short title here"})
}

/// A tweet that scores 1.0.
pub fn valid_tweet(id: &str) -> Value {
    json!({
        "id": id,
        "text": "Shipping a new crate today #rust",
        "created_at": Utc::now().to_rfc3339(),
        "author_id": "42",
        "author_username": "rustlang",
        "retweet_count": 5,
        "like_count": 40,
        "reply_count": 2,
        "quote_count": 1
    })
}

/// A tweet with no timestamp or author; always below threshold.
pub fn invalid_tweet(id: &str) -> Value {
    json!({"id": id, "text": "missing metadata"})
}

/// In-memory source returning canned items, optionally failing.
pub struct FakeSource {
    name: String,
    items: Vec<Value>,
    failing: bool,
    calls: AtomicU32,
}

impl FakeSource {
    pub fn new(name: &str, items: Vec<Value>) -> Self {
        Self {
            name: name.to_string(),
            items,
            failing: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            failing: true,
            ..Self::new(name, Vec::new())
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for FakeSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self, request: &CollectionRequest) -> Result<Vec<Value>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(SourceError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(self.items.iter().take(request.limit).cloned().collect())
    }

    fn validate_item(&self, raw: &Value) -> bool {
        has_fields(raw, &["id"])
    }

    fn transform_item(&self, raw: Value) -> Value {
        raw
    }
}

/// Wraps a real store and fails silver writes for chosen external ids.
pub struct FlakyStore {
    inner: TieredStorage,
    fail_silver_for: HashSet<String>,
    ping_fails: bool,
}

impl FlakyStore {
    pub fn new(inner: TieredStorage) -> Self {
        Self {
            inner,
            fail_silver_for: HashSet::new(),
            ping_fails: false,
        }
    }

    pub fn fail_silver_for(mut self, external_id: &str) -> Self {
        self.fail_silver_for.insert(external_id.to_string());
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.ping_fails = true;
        self
    }
}

impl LakeStore for FlakyStore {
    fn store_bronze(&self, item: &CollectedItem) -> Result<String, StorageError> {
        self.inner.store_bronze(item)
    }

    fn store_silver(
        &self,
        bronze_id: &str,
        item: &CollectedItem,
        quality: &DataQualityResult,
    ) -> Result<String, StorageError> {
        if self.fail_silver_for.contains(&item.external_id) {
            return Err(StorageError::MissingParent {
                tier: "bronze",
                id: bronze_id.to_string(),
            });
        }
        self.inner.store_silver(bronze_id, item, quality)
    }

    fn store_gold(
        &self,
        silver_id: &str,
        item: &CollectedItem,
        analytics: &Analytics,
        metrics: &BusinessMetrics,
    ) -> Result<String, StorageError> {
        self.inner.store_gold(silver_id, item, analytics, metrics)
    }

    fn ping(&self) -> Result<(), StorageError> {
        if self.ping_fails {
            return Err(StorageError::Database(
                feedlake::db::DatabaseError::LockPoisoned,
            ));
        }
        self.inner.ping()
    }
}
