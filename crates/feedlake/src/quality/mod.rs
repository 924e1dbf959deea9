//! Item quality scoring and batch summaries.

pub mod checks;
pub mod summary;
pub mod validator;

pub use summary::{summarize, QualityGrade, QualitySummary};
pub use validator::{DataQualityResult, QualityValidator, DEFAULT_QUALITY_THRESHOLD};
