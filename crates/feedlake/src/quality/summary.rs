use std::fmt;

use serde::{Deserialize, Serialize};

use super::validator::DataQualityResult;

/// Letter grade for an average quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityGrade {
    A,
    B,
    C,
    D,
    F,
}

impl QualityGrade {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            QualityGrade::A
        } else if score >= 0.8 {
            QualityGrade::B
        } else if score >= 0.7 {
            QualityGrade::C
        } else if score >= 0.6 {
            QualityGrade::D
        } else {
            QualityGrade::F
        }
    }
}

impl fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            QualityGrade::A => "A",
            QualityGrade::B => "B",
            QualityGrade::C => "C",
            QualityGrade::D => "D",
            QualityGrade::F => "F",
        };
        f.write_str(letter)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub validation_rate: f64,
    pub average_quality_score: f64,
    pub total_errors: usize,
    pub total_warnings: usize,
    pub grade: QualityGrade,
}

/// Aggregates a batch of results. An empty batch grades F with zero counts.
pub fn summarize(results: &[DataQualityResult]) -> QualitySummary {
    let total = results.len();
    let valid = results.iter().filter(|r| r.is_valid).count();
    let (validation_rate, average_quality_score) = if total == 0 {
        (0.0, 0.0)
    } else {
        let sum: f64 = results.iter().map(|r| r.quality_score).sum();
        (valid as f64 / total as f64, sum / total as f64)
    };

    QualitySummary {
        total,
        valid,
        invalid: total - valid,
        validation_rate,
        average_quality_score,
        total_errors: results.iter().map(|r| r.validation_errors.len()).sum(),
        total_warnings: results.iter().map(|r| r.warnings.len()).sum(),
        grade: QualityGrade::from_score(average_quality_score),
    }
}
