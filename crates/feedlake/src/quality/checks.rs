//! The four sub-scores that make up an item's quality score.
//!
//! Each check returns a value in `[0, 1]`. Checks that cannot apply (a
//! field is absent) are left out of the denominator; with nothing to
//! check the sub-score is 0.0.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::collector::{FieldSchema, SourceKind};

const TWITTER_METRICS: [&str; 4] = ["retweet_count", "like_count", "reply_count", "quote_count"];

/// Present means the key exists and the value is neither null nor empty.
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(_) => true,
    }
}

pub fn missing_required<'a>(fields: &Map<String, Value>, schema: &'a FieldSchema) -> Vec<&'a str> {
    schema
        .required
        .iter()
        .copied()
        .filter(|field| !is_present(fields.get(*field)))
        .collect()
}

/// `0.7 * required ratio + 0.3 * optional ratio`.
pub fn completeness(fields: &Map<String, Value>, schema: &FieldSchema) -> f64 {
    let ratio = |names: &[&str]| {
        if names.is_empty() {
            return 0.0;
        }
        let present = names
            .iter()
            .filter(|field| is_present(fields.get(**field)))
            .count();
        present as f64 / names.len() as f64
    };
    0.7 * ratio(schema.required) + 0.3 * ratio(schema.optional)
}

/// Tallies passed checks over applicable checks.
#[derive(Debug, Default)]
struct Tally {
    passed: u32,
    checks: u32,
}

impl Tally {
    /// Records a check only when the field exists.
    fn check_field(&mut self, fields: &Map<String, Value>, field: &str, pass: fn(&Value) -> bool) {
        if let Some(value) = fields.get(field) {
            self.record(pass(value));
        }
    }

    fn record(&mut self, pass: bool) {
        self.checks += 1;
        if pass {
            self.passed += 1;
        }
    }

    fn score(&self) -> f64 {
        if self.checks == 0 {
            0.0
        } else {
            f64::from(self.passed) / f64::from(self.checks)
        }
    }
}

fn is_string_or_int(value: &Value) -> bool {
    value.is_string() || value.is_i64() || value.is_u64()
}

fn is_http_url(value: &Value) -> bool {
    value.as_str().is_some_and(|s| s.starts_with("http"))
}

fn is_non_negative_number(value: &Value) -> bool {
    value.as_f64().is_some_and(|n| n >= 0.0)
}

fn char_len(value: &Value) -> Option<usize> {
    value.as_str().map(|s| s.chars().count())
}

/// Fraction of per-field type expectations met.
pub fn type_conformance(kind: SourceKind, fields: &Map<String, Value>) -> f64 {
    let mut tally = Tally::default();
    match kind {
        SourceKind::Reddit => {
            tally.check_field(fields, "id", is_string_or_int);
            tally.check_field(fields, "score", Value::is_number);
            tally.check_field(fields, "created_utc", Value::is_number);
        }
        SourceKind::News => {
            tally.check_field(fields, "id", is_string_or_int);
            tally.check_field(fields, "url", is_http_url);
            tally.check_field(fields, "published_at", Value::is_string);
        }
        SourceKind::Twitter => {
            tally.check_field(fields, "id", Value::is_string);
            tally.check_field(fields, "text", Value::is_string);
            for metric in TWITTER_METRICS {
                tally.check_field(fields, metric, Value::is_number);
            }
        }
        SourceKind::Generic => {
            tally.check_field(fields, "id", is_string_or_int);
            tally.check_field(fields, "title", Value::is_string);
            tally.check_field(fields, "url", is_http_url);
        }
    }
    tally.score()
}

/// Fraction of per-kind content heuristics met.
pub fn content_quality(kind: SourceKind, fields: &Map<String, Value>) -> f64 {
    let mut tally = Tally::default();
    let text_len = |field: &str| {
        fields
            .get(field)
            .filter(|v| is_present(Some(*v)))
            .map(char_len)
    };

    match kind {
        SourceKind::Reddit => {
            if let Some(len) = text_len("title") {
                tally.record(len.is_some_and(|n| (5..=300).contains(&n)));
            }
            tally.check_field(fields, "score", is_non_negative_number);
        }
        SourceKind::News => {
            if let Some(len) = text_len("title") {
                tally.record(len.is_some_and(|n| (10..=200).contains(&n)));
            }
            if let Some(len) = text_len("description") {
                tally.record(len.is_some_and(|n| n >= 20));
            }
        }
        SourceKind::Twitter => {
            if let Some(len) = text_len("text") {
                tally.record(len.is_some_and(|n| (1..=280).contains(&n)));
            }
            for metric in TWITTER_METRICS {
                tally.check_field(fields, metric, is_non_negative_number);
            }
        }
        SourceKind::Generic => {
            if let Some(len) = text_len("title") {
                tally.record(len.is_some_and(|n| (1..=300).contains(&n)));
            }
        }
    }
    tally.score()
}

/// Field carrying the item's publication time for each kind.
pub fn timestamp_field(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Reddit => "created_utc",
        SourceKind::News => "published_at",
        SourceKind::Twitter => "created_at",
        SourceKind::Generic => "published_at",
    }
}

/// Parses a unix timestamp (seconds) or an ISO-8601 string.
///
/// Strings without an offset are taken as UTC.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let secs = n.as_f64()?;
            if !secs.is_finite() {
                return None;
            }
            let whole = secs.trunc() as i64;
            let nanos = ((secs - secs.trunc()) * 1e9).round() as u32;
            Utc.timestamp_opt(whole, nanos.min(999_999_999)).single()
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        _ => None,
    }
}

/// Outcome of the timeliness check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timeliness {
    Missing,
    Unparseable,
    Aged { score: f64 },
}

impl Timeliness {
    pub fn score(&self) -> f64 {
        match self {
            Timeliness::Missing | Timeliness::Unparseable => 0.0,
            Timeliness::Aged { score } => *score,
        }
    }
}

/// Newer is better: ≤1h 1.0, ≤24h 0.9, ≤1 week 0.7, older 0.5.
pub fn timeliness(value: Option<&Value>, now: DateTime<Utc>) -> Timeliness {
    let Some(value) = value.filter(|v| is_present(Some(*v))) else {
        return Timeliness::Missing;
    };
    let Some(published) = parse_timestamp(value) else {
        return Timeliness::Unparseable;
    };

    let age_hours = (now - published).num_seconds() as f64 / 3600.0;
    let score = if age_hours <= 1.0 {
        1.0
    } else if age_hours <= 24.0 {
        0.9
    } else if age_hours <= 168.0 {
        0.7
    } else {
        0.5
    };
    Timeliness::Aged { score }
}
