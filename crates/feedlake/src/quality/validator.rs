use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::checks::{self, Timeliness};
use super::summary::{summarize, QualitySummary};
use crate::collector::SourceKind;

pub const DEFAULT_QUALITY_THRESHOLD: f64 = 0.8;

/// Outcome of validating one item. One per item, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityResult {
    pub is_valid: bool,
    pub quality_score: f64,
    pub validation_errors: Vec<String>,
    pub warnings: Vec<String>,
    pub validated_at: DateTime<Utc>,
}

impl DataQualityResult {
    /// Silver-tier status label.
    pub fn status(&self) -> &'static str {
        if self.is_valid {
            "valid"
        } else {
            "invalid"
        }
    }
}

/// Scores items by completeness, type conformance, content heuristics and
/// timeliness, each weighted equally.
#[derive(Debug, Clone, Copy)]
pub struct QualityValidator {
    threshold: f64,
}

impl Default for QualityValidator {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY_THRESHOLD)
    }
}

impl QualityValidator {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn validate(&self, kind: SourceKind, payload: &Value) -> DataQualityResult {
        self.validate_at(kind, payload, Utc::now())
    }

    /// Like [`validate`](Self::validate) with an explicit clock for the
    /// timeliness check.
    pub fn validate_at(
        &self,
        kind: SourceKind,
        payload: &Value,
        now: DateTime<Utc>,
    ) -> DataQualityResult {
        let Some(fields) = payload.as_object() else {
            return DataQualityResult {
                is_valid: false,
                quality_score: 0.0,
                validation_errors: vec![format!(
                    "{} payload is not a JSON object",
                    kind.as_str()
                )],
                warnings: Vec::new(),
                validated_at: now,
            };
        };

        let schema = kind.schema();
        let mut warnings = Vec::new();

        let missing = checks::missing_required(fields, schema);
        for field in &missing {
            warnings.push(format!("Missing required field '{}'", field));
        }

        let timestamp_field = checks::timestamp_field(kind);
        let timeliness = checks::timeliness(fields.get(timestamp_field), now);
        if timeliness == Timeliness::Unparseable {
            warnings.push(format!("Unparseable timestamp in '{}'", timestamp_field));
        }

        let quality_score = if missing.len() == schema.required.len() {
            0.0
        } else {
            let completeness = checks::completeness(fields, schema);
            let types = checks::type_conformance(kind, fields);
            let content = checks::content_quality(kind, fields);
            let score = (completeness + types + content + timeliness.score()) / 4.0;
            debug!(
                kind = %kind,
                completeness,
                types,
                content,
                timeliness = timeliness.score(),
                score,
                "Scored item"
            );
            score.clamp(0.0, 1.0)
        };

        DataQualityResult {
            is_valid: quality_score >= self.threshold,
            quality_score,
            validation_errors: Vec::new(),
            warnings,
            validated_at: now,
        }
    }

    pub fn summarize(&self, results: &[DataQualityResult]) -> QualitySummary {
        summarize(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn fresh_reddit_post() -> Value {
        json!({
            "id": "abc123",
            "title": "Rust 2.0 roadmap announced",
            "author": "ferris",
            "score": 1520,
            "created_utc": now().timestamp() - 600,
            "selftext": "Details inside",
            "url": "https://reddit.com/r/rust/abc123",
            "subreddit": "rust",
            "num_comments": 230
        })
    }

    #[test]
    fn test_complete_fresh_item_scores_perfect() {
        let result = QualityValidator::default().validate_at(
            SourceKind::Reddit,
            &fresh_reddit_post(),
            now(),
        );
        assert!(result.is_valid);
        assert!((result.quality_score - 1.0).abs() < 1e-9);
        assert!(result.warnings.is_empty());
        assert!(result.validation_errors.is_empty());
        assert_eq!(result.status(), "valid");
    }

    #[test]
    fn test_missing_all_required_collapses_to_zero() {
        let payload = json!({"selftext": "orphan body", "subreddit": "rust"});
        let result = QualityValidator::default().validate_at(SourceKind::Reddit, &payload, now());
        assert_eq!(result.quality_score, 0.0);
        assert!(!result.is_valid);
        assert_eq!(result.warnings.len(), 5);
    }

    #[test]
    fn test_non_object_is_hard_error() {
        let result =
            QualityValidator::default().validate_at(SourceKind::News, &json!([1, 2, 3]), now());
        assert_eq!(result.quality_score, 0.0);
        assert!(!result.is_valid);
        assert_eq!(result.validation_errors.len(), 1);
    }

    #[test]
    fn test_stale_item_falls_below_threshold() {
        let mut payload = fresh_reddit_post();
        payload["created_utc"] = json!(now().timestamp() - 30 * 24 * 3600);
        payload["title"] = json!("Hey");
        let result = QualityValidator::default().validate_at(SourceKind::Reddit, &payload, now());
        // (1.0 + 1.0 + 0.5 + 0.5) / 4
        assert!((result.quality_score - 0.75).abs() < 1e-9);
        assert!(!result.is_valid);
        assert_eq!(result.status(), "invalid");
    }

    #[test]
    fn test_unparseable_timestamp_warns_and_scores_zero_timeliness() {
        let payload = json!({
            "id": "t1",
            "text": "hello world",
            "created_at": "not a date",
            "author_id": "42",
            "retweet_count": 1,
            "like_count": 2,
            "reply_count": 3,
            "quote_count": 4
        });
        let result = QualityValidator::default().validate_at(SourceKind::Twitter, &payload, now());
        assert!((result.quality_score - 0.75).abs() < 1e-9);
        assert!(result.warnings.iter().any(|w| w.contains("created_at")));
        assert!(!result.is_valid);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let mut payload = fresh_reddit_post();
        payload["created_utc"] = json!(now().timestamp() - 30 * 24 * 3600);
        payload["title"] = json!("Hey");
        let lenient = QualityValidator::new(0.7);
        assert!(lenient.validate_at(SourceKind::Reddit, &payload, now()).is_valid);
    }

    #[test]
    fn test_score_stays_in_unit_interval() {
        let validator = QualityValidator::default();
        let payloads = [
            json!({}),
            json!({"id": 1}),
            json!({"id": "x", "title": "", "url": "ftp://nope"}),
            fresh_reddit_post(),
        ];
        for kind in [
            SourceKind::Reddit,
            SourceKind::News,
            SourceKind::Twitter,
            SourceKind::Generic,
        ] {
            for payload in &payloads {
                let score = validator.validate_at(kind, payload, now()).quality_score;
                assert!((0.0..=1.0).contains(&score), "{} scored {}", kind, score);
            }
        }
    }
}
