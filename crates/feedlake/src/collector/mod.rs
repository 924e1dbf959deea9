//! Collection: the `Source` adapter seam, the rate-limited retrying
//! `SourceCollector`, and the `Orchestrator` that fans out across them.

pub mod item;
pub mod orchestrator;
pub mod retry;
pub mod source;
pub mod source_collector;

#[cfg(test)]
pub(crate) mod testing;

pub use item::{CollectedItem, CollectionRequest, FieldSchema, SourceKind};
pub use orchestrator::{
    CollectionReport, CollectorStatus, Orchestrator, OrchestratorSettings, OrchestratorStatus,
};
pub use retry::{RetryOutcome, RetryPolicy};
pub use source::{has_fields, Source};
pub use source_collector::{CollectorHealthStats, SourceCollector};
