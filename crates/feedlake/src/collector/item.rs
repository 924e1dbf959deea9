use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Required and optional payload fields for one source kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

impl FieldSchema {
    pub fn contains(&self, field: &str) -> bool {
        self.required.contains(&field) || self.optional.contains(&field)
    }
}

const REDDIT_SCHEMA: FieldSchema = FieldSchema {
    required: &["id", "title", "author", "score", "created_utc"],
    optional: &["selftext", "url", "subreddit", "num_comments"],
};

const NEWS_SCHEMA: FieldSchema = FieldSchema {
    required: &["id", "title", "url", "source_name", "published_at"],
    optional: &["description", "content", "author", "image_url"],
};

const TWITTER_SCHEMA: FieldSchema = FieldSchema {
    required: &["id", "text", "created_at", "author_id"],
    optional: &["retweet_count", "like_count", "reply_count", "quote_count"],
};

const GENERIC_SCHEMA: FieldSchema = FieldSchema {
    required: &["id", "title"],
    optional: &["content", "url", "author", "published_at"],
};

/// The family of source an item came from.
///
/// Known sources get their own schema; any other source name maps to
/// `Generic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Reddit,
    News,
    Twitter,
    Generic,
}

impl SourceKind {
    pub fn from_source_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "reddit" => SourceKind::Reddit,
            "news" => SourceKind::News,
            "twitter" => SourceKind::Twitter,
            _ => SourceKind::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Reddit => "reddit",
            SourceKind::News => "news",
            SourceKind::Twitter => "twitter",
            SourceKind::Generic => "generic",
        }
    }

    /// Label stored alongside raw payloads in the bronze tier.
    pub fn data_type(&self) -> &'static str {
        match self {
            SourceKind::Reddit => "reddit_post",
            SourceKind::News => "news_article",
            SourceKind::Twitter => "twitter_post",
            SourceKind::Generic => "generic_item",
        }
    }

    pub fn schema(&self) -> &'static FieldSchema {
        match self {
            SourceKind::Reddit => &REDDIT_SCHEMA,
            SourceKind::News => &NEWS_SCHEMA,
            SourceKind::Twitter => &TWITTER_SCHEMA,
            SourceKind::Generic => &GENERIC_SCHEMA,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One collection call's inputs. Built per orchestration cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRequest {
    pub source_name: String,
    /// Source-specific knobs (`subreddit`, `query`, `sort`, ...).
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    pub limit: usize,
}

impl CollectionRequest {
    pub fn new(source_name: impl Into<String>, limit: usize) -> Self {
        Self {
            source_name: source_name.into(),
            parameters: BTreeMap::new(),
            limit,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}

/// A transformed item, ready for validation and storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedItem {
    pub external_id: String,
    pub source_name: String,
    pub kind: SourceKind,
    /// Expected to be a JSON object; anything else fails validation.
    pub payload: Value,
    pub collected_at: DateTime<Utc>,
}

impl CollectedItem {
    /// Wraps a payload, taking the external id from its `id` field.
    pub fn new(source_name: impl Into<String>, payload: Value) -> Self {
        let source_name = source_name.into();
        let external_id = match payload.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        Self {
            external_id,
            kind: SourceKind::from_source_name(&source_name),
            source_name,
            payload,
            collected_at: Utc::now(),
        }
    }

    pub fn fields(&self) -> Option<&Map<String, Value>> {
        self.payload.as_object()
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(Value::as_str)
    }

    /// Payload entries that are not part of the kind's schema.
    pub fn extra_fields(&self) -> BTreeMap<&str, &Value> {
        let schema = self.kind.schema();
        self.fields()
            .map(|fields| {
                fields
                    .iter()
                    .filter(|(key, _)| !schema.contains(key))
                    .map(|(key, value)| (key.as_str(), value))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_from_source_name() {
        assert_eq!(SourceKind::from_source_name("reddit"), SourceKind::Reddit);
        assert_eq!(SourceKind::from_source_name("News"), SourceKind::News);
        assert_eq!(SourceKind::from_source_name("twitter"), SourceKind::Twitter);
        assert_eq!(SourceKind::from_source_name("mastodon"), SourceKind::Generic);
    }

    #[test]
    fn test_schemas() {
        assert_eq!(SourceKind::Reddit.schema().required.len(), 5);
        assert!(SourceKind::News.schema().contains("image_url"));
        assert!(SourceKind::Twitter.schema().contains("author_id"));
        assert!(!SourceKind::Generic.schema().contains("score"));
    }

    #[test]
    fn test_item_external_id_from_payload() {
        let item = CollectedItem::new("twitter", json!({"id": "123", "text": "hi"}));
        assert_eq!(item.external_id, "123");
        assert_eq!(item.kind, SourceKind::Twitter);

        let numeric = CollectedItem::new("reddit", json!({"id": 42}));
        assert_eq!(numeric.external_id, "42");

        let missing = CollectedItem::new("news", json!({"title": "x"}));
        assert_eq!(missing.external_id, "");
    }

    #[test]
    fn test_extra_fields() {
        let item = CollectedItem::new(
            "reddit",
            json!({"id": "a", "title": "t", "upvote_ratio": 0.9, "over_18": false}),
        );
        let extras = item.extra_fields();
        assert_eq!(extras.len(), 2);
        assert_eq!(extras["upvote_ratio"], &json!(0.9));
        assert!(!extras.contains_key("title"));

        let scalar = CollectedItem::new("reddit", json!("not an object"));
        assert!(scalar.extra_fields().is_empty());
    }

    #[test]
    fn test_request_builder() {
        let request = CollectionRequest::new("reddit", 25).with_param("subreddit", "rust");
        assert_eq!(request.param("subreddit"), Some("rust"));
        assert_eq!(request.param("sort"), None);
        assert_eq!(request.limit, 25);
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SourceKind::News).unwrap(), "\"news\"");
    }
}
