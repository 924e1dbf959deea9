use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::ItemFailure;
use super::runner::CollectionKind;
use crate::quality::{QualityGrade, QualitySummary};

/// Everything one `Pipeline::run` did, per source and overall.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRunSummary {
    pub collection_kind: CollectionKind,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub per_source_bronze_count: BTreeMap<String, usize>,
    pub per_source_silver_count: BTreeMap<String, usize>,
    pub per_source_gold_count: BTreeMap<String, usize>,
    pub per_source_quality_summary: BTreeMap<String, QualitySummary>,
    pub failed_sources: Vec<String>,
    pub errors: Vec<ItemFailure>,
    pub total_items_processed: usize,
    /// Mean of the per-source average scores; sources that produced no
    /// validated items are left out.
    pub overall_quality_score: f64,
    pub quality_grade: QualityGrade,
}

impl PipelineRunSummary {
    pub fn total_bronze(&self) -> usize {
        self.per_source_bronze_count.values().sum()
    }

    pub fn total_silver(&self) -> usize {
        self.per_source_silver_count.values().sum()
    }

    pub fn total_gold(&self) -> usize {
        self.per_source_gold_count.values().sum()
    }

    pub fn valid_items(&self) -> usize {
        self.per_source_quality_summary.values().map(|q| q.valid).sum()
    }

    pub fn invalid_items(&self) -> usize {
        self.per_source_quality_summary
            .values()
            .map(|q| q.invalid)
            .sum()
    }
}

/// Mean of per-source averages over sources with at least one result.
pub fn overall_quality(summaries: &BTreeMap<String, QualitySummary>) -> f64 {
    let scored: Vec<f64> = summaries
        .values()
        .filter(|s| s.total > 0)
        .map(|s| s.average_quality_score)
        .collect();
    if scored.is_empty() {
        0.0
    } else {
        scored.iter().sum::<f64>() / scored.len() as f64
    }
}

/// Totals accumulated over every run of one `Pipeline`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    pub runs: u64,
    pub total_processed: u64,
    pub total_valid: u64,
    pub total_invalid: u64,
    pub total_errors: u64,
    pub last_overall_quality: Option<f64>,
    pub last_run_at: Option<DateTime<Utc>>,
}

impl PipelineStats {
    pub fn record(&mut self, summary: &PipelineRunSummary) {
        self.runs += 1;
        self.total_processed += summary.total_items_processed as u64;
        self.total_valid += summary.valid_items() as u64;
        self.total_invalid += summary.invalid_items() as u64;
        self.total_errors += summary.errors.len() as u64;
        self.last_overall_quality = Some(summary.overall_quality_score);
        self.last_run_at = Some(summary.started_at);
    }
}
