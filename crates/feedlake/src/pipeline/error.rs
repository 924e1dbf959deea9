use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::error::StorageError;

/// Failures that abort a whole run. Per-item problems never end up here.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Storage unavailable: {0}")]
    StoreUnavailable(#[source] StorageError),
}

/// Tier an item was being written to when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Bronze,
    Silver,
    Gold,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Bronze => "bronze",
            Stage::Silver => "silver",
            Stage::Gold => "gold",
        })
    }
}

/// A single item that could not be stored. The run carries on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub source_name: String,
    pub external_id: String,
    pub stage: Stage,
    pub message: String,
}

impl ItemFailure {
    pub fn new(
        source_name: &str,
        external_id: &str,
        stage: Stage,
        error: &StorageError,
    ) -> Self {
        Self {
            source_name: source_name.to_string(),
            external_id: external_id.to_string(),
            stage,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} item '{}' failed at {} tier: {}",
            self.source_name, self.external_id, self.stage, self.message
        )
    }
}
