//! Gold-tier analytics derived from a validated payload.
//!
//! Everything here is a pure function of the payload and a clock, so the
//! pipeline can derive analytics without touching storage.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Timelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collector::SourceKind;
use crate::quality::checks::{is_present, parse_timestamp};
use crate::sentiment::Sentiment;

static RE_HASHTAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\w+").unwrap());
static RE_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@\w+").unwrap());
static RE_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());

/// Timestamp fields tried in order for temporal features.
const TIMESTAMP_FIELDS: [&str; 3] = ["created_at", "created_utc", "published_at"];

const REDDIT_VIRAL_SCORE: i64 = 1000;
const TWITTER_VIRAL_RETWEETS: i64 = 100;

/// Per-kind engagement counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Engagement {
    Reddit {
        score: i64,
        num_comments: i64,
        upvote_ratio: f64,
    },
    News {
        engagement_score: f64,
        content_length: usize,
        has_image: bool,
    },
    Twitter {
        retweet_count: i64,
        like_count: i64,
        reply_count: i64,
        quote_count: i64,
    },
    Generic,
}

impl Engagement {
    pub fn from_payload(kind: SourceKind, payload: &Value) -> Self {
        match kind {
            SourceKind::Reddit => Engagement::Reddit {
                score: int_field(payload, "score"),
                num_comments: int_field(payload, "num_comments"),
                upvote_ratio: payload
                    .get("upvote_ratio")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
            },
            SourceKind::News => Engagement::News {
                engagement_score: payload
                    .get("engagement_score")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
                content_length: payload
                    .get("content")
                    .and_then(Value::as_str)
                    .map_or(0, |s| s.chars().count()),
                has_image: is_present(payload.get("image_url")),
            },
            SourceKind::Twitter => Engagement::Twitter {
                retweet_count: int_field(payload, "retweet_count"),
                like_count: int_field(payload, "like_count"),
                reply_count: int_field(payload, "reply_count"),
                quote_count: int_field(payload, "quote_count"),
            },
            SourceKind::Generic => Engagement::Generic,
        }
    }

    /// Upvotes for reddit, likes for twitter.
    pub fn like_count(&self) -> i64 {
        match self {
            Engagement::Reddit { score, .. } => (*score).max(0),
            Engagement::Twitter { like_count, .. } => *like_count,
            _ => 0,
        }
    }

    pub fn retweet_count(&self) -> i64 {
        match self {
            Engagement::Twitter { retweet_count, .. } => *retweet_count,
            _ => 0,
        }
    }

    pub fn comment_count(&self) -> i64 {
        match self {
            Engagement::Reddit { num_comments, .. } => *num_comments,
            Engagement::Twitter { reply_count, .. } => *reply_count,
            _ => 0,
        }
    }

    pub fn share_count(&self) -> i64 {
        match self {
            Engagement::Twitter {
                retweet_count,
                quote_count,
                ..
            } => retweet_count.saturating_add(*quote_count),
            _ => 0,
        }
    }

    /// Weighted engagement: reddit `score + 2 * comments`, twitter
    /// `2 * retweets + likes + replies`, news the provider's own score.
    /// Sums saturate at the `i64` bounds.
    pub fn score(&self) -> f64 {
        match self {
            Engagement::Reddit {
                score,
                num_comments,
                ..
            } => score.saturating_add(num_comments.saturating_mul(2)) as f64,
            Engagement::News {
                engagement_score, ..
            } => *engagement_score,
            Engagement::Twitter {
                retweet_count,
                like_count,
                reply_count,
                ..
            } => retweet_count
                .saturating_mul(2)
                .saturating_add(*like_count)
                .saturating_add(*reply_count) as f64,
            Engagement::Generic => 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    pub text_length: usize,
    pub word_count: usize,
    pub hashtag_count: usize,
    pub mention_count: usize,
    pub url_count: usize,
}

impl ContentAnalysis {
    pub fn of(text: &str) -> Self {
        Self {
            text_length: text.chars().count(),
            word_count: text.split_whitespace().count(),
            hashtag_count: RE_HASHTAG.find_iter(text).count(),
            mention_count: RE_MENTION.find_iter(text).count(),
            url_count: RE_URL.find_iter(text).count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalFeatures {
    pub hour_of_day: u32,
    /// Monday = 0.
    pub day_of_week: u32,
    pub is_weekend: bool,
    pub age_hours: f64,
}

impl TemporalFeatures {
    pub fn at(published: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let day_of_week = published.weekday().num_days_from_monday();
        Self {
            hour_of_day: published.hour(),
            day_of_week,
            is_weekend: day_of_week >= 5,
            age_hours: (now - published).num_seconds() as f64 / 3600.0,
        }
    }
}

/// Descriptive analytics stored as the gold row's `analytics_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    pub engagement: Engagement,
    pub content: ContentAnalysis,
    pub temporal: Option<TemporalFeatures>,
    pub sentiment: Option<Sentiment>,
}

/// Derived business metrics stored as the gold row's `metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessMetrics {
    pub engagement_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viral_potential: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readability_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_reputation: Option<f64>,
    pub data_volume_bytes: usize,
    pub processed_at: DateTime<Utc>,
}

impl BusinessMetrics {
    pub fn derive(payload: &Value, engagement: &Engagement, now: DateTime<Utc>) -> Self {
        let viral_potential = match engagement {
            Engagement::Reddit { score, .. } => Some(*score > REDDIT_VIRAL_SCORE),
            Engagement::Twitter { retweet_count, .. } => {
                Some(*retweet_count > TWITTER_VIRAL_RETWEETS)
            }
            _ => None,
        };
        let (readability_score, source_reputation) = match engagement {
            Engagement::News { content_length, .. } => (
                Some((*content_length as f64 / 10.0).min(100.0)),
                Some(source_reputation(
                    payload.get("source_name").and_then(Value::as_str),
                )),
            ),
            _ => (None, None),
        };

        BusinessMetrics {
            engagement_score: engagement.score(),
            viral_potential,
            readability_score,
            source_reputation,
            data_volume_bytes: serde_json::to_string(payload).map_or(0, |s| s.len()),
            processed_at: now,
        }
    }
}

/// Reputation of a news outlet on a fixed three-step scale.
pub fn source_reputation(outlet: Option<&str>) -> f64 {
    const HIGH: [&str; 6] = ["BBC", "Reuters", "AP", "CNN", "NYT", "WSJ"];
    const MEDIUM: [&str; 4] = ["TechCrunch", "Wired", "Ars Technica", "The Verge"];

    let Some(outlet) = outlet else {
        return 0.5;
    };
    if HIGH.iter().any(|name| outlet.contains(name)) {
        0.9
    } else if MEDIUM.iter().any(|name| outlet.contains(name)) {
        0.7
    } else {
        0.5
    }
}

/// Text used for content analysis and sentiment: `text`, else `title`,
/// else `content`.
pub fn primary_text(payload: &Value) -> &str {
    ["text", "title", "content"]
        .iter()
        .filter_map(|field| payload.get(*field).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or("")
}

/// First parseable timestamp among the known timestamp fields.
pub fn published_at(payload: &Value) -> Option<DateTime<Utc>> {
    TIMESTAMP_FIELDS
        .iter()
        .filter_map(|field| payload.get(*field))
        .find_map(parse_timestamp)
}

/// Derives analytics and metrics for one valid item.
pub fn analyze(
    kind: SourceKind,
    payload: &Value,
    sentiment: Option<Sentiment>,
    now: DateTime<Utc>,
) -> (Analytics, BusinessMetrics) {
    let engagement = Engagement::from_payload(kind, payload);
    let metrics = BusinessMetrics::derive(payload, &engagement, now);
    let analytics = Analytics {
        engagement,
        content: ContentAnalysis::of(primary_text(payload)),
        temporal: published_at(payload).map(|ts| TemporalFeatures::at(ts, now)),
        sentiment,
    };
    (analytics, metrics)
}

fn int_field(payload: &Value, field: &str) -> i64 {
    match payload.get(field) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        _ => 0,
    }
}
