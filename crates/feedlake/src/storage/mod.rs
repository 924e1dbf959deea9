//! Bronze/silver/gold persistence.
//!
//! Bronze keeps payloads verbatim, silver adds normalized fields and the
//! quality verdict, gold holds analytics for valid items only. Each tier
//! points at its parent, so any gold row can be traced back to the raw
//! payload it came from.

pub mod normalize;
pub mod tiered;

pub use normalize::NormalizedFields;
pub use tiered::{CleanupReport, QualityMetrics, TieredStorage};

use crate::analytics::{Analytics, BusinessMetrics};
use crate::collector::CollectedItem;
use crate::error::StorageError;
use crate::quality::DataQualityResult;

/// The write side of the lake as seen by the pipeline.
///
/// Each call commits on its own; nothing spans tiers.
pub trait LakeStore: Send + Sync {
    /// Persists the raw payload. Never deduplicates.
    fn store_bronze(&self, item: &CollectedItem) -> Result<String, StorageError>;

    fn store_silver(
        &self,
        bronze_id: &str,
        item: &CollectedItem,
        quality: &DataQualityResult,
    ) -> Result<String, StorageError>;

    fn store_gold(
        &self,
        silver_id: &str,
        item: &CollectedItem,
        analytics: &Analytics,
        metrics: &BusinessMetrics,
    ) -> Result<String, StorageError>;

    /// Cheap reachability check.
    fn ping(&self) -> Result<(), StorageError>;
}
