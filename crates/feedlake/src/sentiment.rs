//! Pluggable sentiment scoring.
//!
//! The pipeline treats a scorer as a black box: text in, optional label
//! and confidence out. No model ships with the crate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f64,
}

impl Sentiment {
    /// `+confidence` for positive, `-confidence` for negative, 0 for neutral.
    pub fn signed_score(&self) -> f64 {
        match self.label {
            SentimentLabel::Positive => self.confidence,
            SentimentLabel::Negative => -self.confidence,
            SentimentLabel::Neutral => 0.0,
        }
    }
}

/// Scores free text. `None` means the scorer declined to classify.
pub trait SentimentScorer: Send + Sync {
    fn score(&self, text: &str) -> Option<Sentiment>;
}

/// Scorer that never classifies anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScorer;

impl SentimentScorer for NoopScorer {
    fn score(&self, _text: &str) -> Option<Sentiment> {
        None
    }
}
