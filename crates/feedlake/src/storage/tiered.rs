use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use super::normalize::NormalizedFields;
use super::LakeStore;
use crate::analytics::{Analytics, BusinessMetrics};
use crate::collector::CollectedItem;
use crate::db::bronze_repo::{self, BronzeRow};
use crate::db::gold_repo::{self, GoldRow};
use crate::db::silver_repo::{self, SilverRow};
use crate::db::{format_timestamp, Database};
use crate::error::StorageError;
use crate::quality::DataQualityResult;

/// Silver-tier validation outcomes over a trailing window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub source: Option<String>,
    pub days: u32,
    pub total: u64,
    pub valid: u64,
    pub invalid: u64,
    pub validation_rate: f64,
    pub average_quality_score: f64,
}

/// Rows removed by one retention pass, per tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub bronze: usize,
    pub silver: usize,
    pub gold: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.bronze + self.silver + self.gold
    }
}

/// SQLite-backed three-tier store.
#[derive(Clone)]
pub struct TieredStorage {
    db: Database,
}

impl TieredStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn quality_metrics(
        &self,
        source: Option<&str>,
        days: u32,
    ) -> Result<QualityMetrics, StorageError> {
        self.quality_metrics_at(source, days, Utc::now())
    }

    pub fn quality_metrics_at(
        &self,
        source: Option<&str>,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<QualityMetrics, StorageError> {
        let since = format_timestamp(now - Duration::days(i64::from(days)));
        let counts = silver_repo::quality_counts(&self.db, source, &since)?;
        let validation_rate = if counts.total == 0 {
            0.0
        } else {
            counts.valid as f64 / counts.total as f64
        };

        Ok(QualityMetrics {
            source: source.map(str::to_string),
            days,
            total: counts.total,
            valid: counts.valid,
            invalid: counts.invalid,
            validation_rate,
            average_quality_score: counts.average_score,
        })
    }

    /// Deletes every lineage chain whose bronze root is older than `days`.
    pub fn cleanup_older_than(&self, days: u32) -> Result<CleanupReport, StorageError> {
        self.cleanup_before(Utc::now() - Duration::days(i64::from(days)))
    }

    /// Deletes children first inside one transaction so foreign keys hold
    /// at every step.
    pub fn cleanup_before(&self, cutoff: DateTime<Utc>) -> Result<CleanupReport, StorageError> {
        let cutoff = format_timestamp(cutoff);
        let report = self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let gold = gold_repo::delete_older_than(&tx, &cutoff)?;
            let silver = silver_repo::delete_older_than(&tx, &cutoff)?;
            let bronze = bronze_repo::delete_older_than(&tx, &cutoff)?;
            tx.commit()?;
            Ok(CleanupReport {
                bronze,
                silver,
                gold,
            })
        })?;

        info!(
            cutoff = %cutoff,
            bronze = report.bronze,
            silver = report.silver,
            gold = report.gold,
            "Retention cleanup finished"
        );
        Ok(report)
    }

    pub fn counts(&self, source: Option<&str>) -> Result<(u64, u64, u64), StorageError> {
        Ok((
            bronze_repo::count(&self.db, source)?,
            silver_repo::count(&self.db, source)?,
            gold_repo::count(&self.db, source)?,
        ))
    }
}

fn to_json<T: Serialize>(what: &'static str, value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|source| StorageError::Serialize { what, source })
}

impl LakeStore for TieredStorage {
    fn store_bronze(&self, item: &CollectedItem) -> Result<String, StorageError> {
        let id = Uuid::new_v4().to_string();
        let row = BronzeRow {
            id: id.clone(),
            source: item.source_name.clone(),
            external_id: item.external_id.clone(),
            data_type: item.kind.data_type().to_string(),
            raw_payload: to_json("raw payload", &item.payload)?,
            collected_at: format_timestamp(item.collected_at),
            stored_at: format_timestamp(Utc::now()),
        };
        bronze_repo::insert(&self.db, &row)?;
        debug!(source = %item.source_name, bronze_id = %id, "Stored bronze record");
        Ok(id)
    }

    fn store_silver(
        &self,
        bronze_id: &str,
        item: &CollectedItem,
        quality: &DataQualityResult,
    ) -> Result<String, StorageError> {
        if bronze_repo::find_by_id(&self.db, bronze_id)?.is_none() {
            return Err(StorageError::MissingParent {
                tier: "bronze",
                id: bronze_id.to_string(),
            });
        }

        let fields = NormalizedFields::from_payload(&item.payload);
        let metadata = json!({
            "validation_status": quality.status(),
            "quality_score": quality.quality_score,
            "quality": quality,
            "original_data": item.payload,
        });

        let id = Uuid::new_v4().to_string();
        let row = SilverRow {
            id: id.clone(),
            bronze_id: bronze_id.to_string(),
            source: item.source_name.clone(),
            external_id: item.external_id.clone(),
            title: fields.title,
            content: fields.content,
            author: fields.author,
            url: fields.url,
            published_at: fields.published_at,
            validation_status: quality.status().to_string(),
            quality_score: quality.quality_score,
            source_metadata: to_json("silver metadata", &metadata)?,
            processed_at: format_timestamp(Utc::now()),
        };
        silver_repo::insert(&self.db, &row)?;
        debug!(
            source = %item.source_name,
            silver_id = %id,
            status = quality.status(),
            "Stored silver record"
        );
        Ok(id)
    }

    fn store_gold(
        &self,
        silver_id: &str,
        item: &CollectedItem,
        analytics: &Analytics,
        metrics: &BusinessMetrics,
    ) -> Result<String, StorageError> {
        if silver_repo::find_by_id(&self.db, silver_id)?.is_none() {
            return Err(StorageError::MissingParent {
                tier: "silver",
                id: silver_id.to_string(),
            });
        }

        let engagement = &analytics.engagement;
        let id = Uuid::new_v4().to_string();
        let row = GoldRow {
            id: id.clone(),
            silver_id: silver_id.to_string(),
            source: item.source_name.clone(),
            external_id: item.external_id.clone(),
            engagement_score: metrics.engagement_score,
            like_count: engagement.like_count(),
            retweet_count: engagement.retweet_count(),
            comment_count: engagement.comment_count(),
            share_count: engagement.share_count(),
            hour_of_day: analytics.temporal.as_ref().map(|t| t.hour_of_day),
            day_of_week: analytics.temporal.as_ref().map(|t| t.day_of_week),
            analytics_data: to_json("analytics", analytics)?,
            metrics: to_json("metrics", metrics)?,
            analyzed_at: format_timestamp(Utc::now()),
            sentiment_label: analytics
                .sentiment
                .map(|s| s.label.as_str().to_string()),
            sentiment_score: analytics.sentiment.map(|s| s.signed_score()),
        };
        gold_repo::insert(&self.db, &row)?;
        debug!(source = %item.source_name, gold_id = %id, "Stored gold record");
        Ok(id)
    }

    fn ping(&self) -> Result<(), StorageError> {
        Ok(self.db.ping()?)
    }
}
