//! Maps a source payload onto the common silver-tier columns.

use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::db::format_timestamp;

/// Normalized fields shared by every source kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedFields {
    pub title: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<String>,
}

impl NormalizedFields {
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            title: first_text(payload, &["title", "text"]),
            content: first_text(payload, &["content", "selftext", "description"]),
            author: first_text(payload, &["author", "author_username"]),
            url: first_text(payload, &["url"]),
            published_at: published_at(payload),
        }
    }
}

fn first_text(payload: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| payload.get(*field).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// `created_at` as given, else `created_utc` (unix seconds) rendered as
/// RFC 3339, else `published_at` as given.
fn published_at(payload: &Value) -> Option<String> {
    if let Some(created_at) = first_text(payload, &["created_at"]) {
        return Some(created_at);
    }
    if let Some(secs) = payload.get("created_utc").and_then(Value::as_f64) {
        if let Some(ts) = Utc.timestamp_opt(secs as i64, 0).single() {
            return Some(format_timestamp(ts));
        }
    }
    first_text(payload, &["published_at"])
}
