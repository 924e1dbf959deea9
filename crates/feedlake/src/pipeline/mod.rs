//! One collection cycle: orchestrator → validator → tiered storage.

pub mod error;
pub mod runner;
pub mod scheduler;
pub mod summary;

pub use error::{ItemFailure, PipelineError, Stage};
pub use runner::{CollectionKind, Pipeline};
pub use scheduler::{PipelineScheduler, ShutdownHandle};
pub use summary::{PipelineRunSummary, PipelineStats};
