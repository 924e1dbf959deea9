//! NewsAPI (`/v2/everything` and `/v2/top-headlines`).

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{check_status, http_client};
use crate::collector::{has_fields, CollectionRequest, Source};
use crate::config::NewsSourceConfig;
use crate::error::{ConfigError, SourceError};

const MAX_PAGE: usize = 100;
const DEFAULT_CATEGORY: &str = "technology";
const DEFAULT_COUNTRY: &str = "us";
const REQUIRED_FIELDS: [&str; 4] = ["id", "title", "source_name", "url"];

pub struct NewsSource {
    client: reqwest::Client,
    api_key: SecretString,
    api_url: String,
}

impl NewsSource {
    pub fn new(config: &NewsSourceConfig, api_key: SecretString) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http_client(&format!("feedlake/{}", env!("CARGO_PKG_VERSION")))?,
            api_key,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }
}

/// `/v2/everything` when a query is given, otherwise top headlines.
pub fn endpoint(request: &CollectionRequest) -> (&'static str, Vec<(&'static str, String)>) {
    let page_size = request.limit.clamp(1, MAX_PAGE).to_string();
    match request.param("query") {
        Some(query) => (
            "/v2/everything",
            vec![
                ("q", query.to_string()),
                ("language", request.param("language").unwrap_or("en").to_string()),
                ("sortBy", "publishedAt".to_string()),
                ("pageSize", page_size),
            ],
        ),
        None => (
            "/v2/top-headlines",
            vec![
                (
                    "category",
                    request.param("category").unwrap_or(DEFAULT_CATEGORY).to_string(),
                ),
                (
                    "country",
                    request.param("country").unwrap_or(DEFAULT_COUNTRY).to_string(),
                ),
                ("pageSize", page_size),
            ],
        ),
    }
}

/// Flattens a NewsAPI response into one object per article.
///
/// NewsAPI reports its own errors in the body (`status: "error"`); the
/// `rateLimited` code maps to `SourceError::RateLimited`.
pub fn parse_articles(body: &Value) -> Result<Vec<Value>, SourceError> {
    if body.get("status").and_then(Value::as_str) == Some("error") {
        let code = body.get("code").and_then(Value::as_str).unwrap_or("unknown");
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(match code {
            "rateLimited" => SourceError::RateLimited,
            "apiKeyInvalid" | "apiKeyMissing" | "apiKeyDisabled" => {
                SourceError::Authentication(message)
            }
            _ => SourceError::Other(format!("{}: {}", code, message)),
        });
    }

    let articles = body
        .get("articles")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Malformed("response has no articles".to_string()))?;
    Ok(articles.iter().map(flatten_article).collect())
}

fn flatten_article(article: &Value) -> Value {
    let text = |field: &str| article.get(field).cloned().unwrap_or(Value::Null);
    let url = article.get("url").and_then(Value::as_str);
    json!({
        "id": url.map(article_id),
        "title": text("title"),
        "description": text("description"),
        "content": text("content"),
        "url": text("url"),
        "image_url": text("urlToImage"),
        "source_name": article.pointer("/source/name").cloned().unwrap_or(Value::Null),
        "source_id": article.pointer("/source/id").cloned().unwrap_or(Value::Null),
        "author": text("author"),
        "published_at": text("publishedAt"),
    })
}

/// Stable id for an article, derived from its URL.
pub fn article_id(url: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes()).to_string()
}

#[async_trait]
impl Source for NewsSource {
    fn name(&self) -> &str {
        "news"
    }

    async fn collect(&self, request: &CollectionRequest) -> Result<Vec<Value>, SourceError> {
        let (path, params) = endpoint(request);
        let resp = self
            .client
            .get(format!("{}{}", self.api_url, path))
            .header("X-Api-Key", self.api_key.expose_secret())
            .query(&params)
            .send()
            .await?;
        let body: Value = check_status(resp).await?.json().await?;
        let mut articles = parse_articles(&body)?;
        articles.truncate(request.limit);
        Ok(articles)
    }

    fn validate_item(&self, raw: &Value) -> bool {
        has_fields(raw, &REQUIRED_FIELDS)
    }

    /// Drops null fields so absent values stay absent downstream.
    fn transform_item(&self, raw: Value) -> Value {
        match raw {
            Value::Object(fields) => {
                Value::Object(fields.into_iter().filter(|(_, v)| !v.is_null()).collect())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> Value {
        json!({
            "status": "ok",
            "totalResults": 2,
            "articles": [
                {
                    "source": {"id": "reuters", "name": "Reuters"},
                    "author": "Jane Doe",
                    "title": "Chipmakers report record quarter",
                    "description": "Demand for accelerators keeps climbing this year.",
                    "url": "https://www.reuters.com/tech/chips",
                    "urlToImage": "https://www.reuters.com/img.jpg",
                    "publishedAt": "2026-03-10T08:00:00Z",
                    "content": "Full text..."
                },
                {
                    "source": {"id": null, "name": "Some Blog"},
                    "author": null,
                    "title": "Untitled",
                    "url": null,
                    "publishedAt": "2026-03-10T09:00:00Z"
                }
            ]
        })
    }

    #[test]
    fn test_parse_articles() {
        let articles = parse_articles(&response()).unwrap();
        assert_eq!(articles.len(), 2);

        let first = &articles[0];
        assert_eq!(first["source_name"], "Reuters");
        assert_eq!(first["image_url"], "https://www.reuters.com/img.jpg");
        assert_eq!(first["published_at"], "2026-03-10T08:00:00Z");
        assert_eq!(
            first["id"].as_str(),
            Some(article_id("https://www.reuters.com/tech/chips").as_str())
        );

        assert!(articles[1]["id"].is_null());
    }

    #[test]
    fn test_article_id_is_stable() {
        assert_eq!(article_id("https://a.example/x"), article_id("https://a.example/x"));
        assert_ne!(article_id("https://a.example/x"), article_id("https://a.example/y"));
    }

    #[test]
    fn test_error_bodies() {
        let limited = json!({"status": "error", "code": "rateLimited", "message": "slow down"});
        assert!(parse_articles(&limited).unwrap_err().is_rate_limited());

        let bad_key = json!({"status": "error", "code": "apiKeyInvalid", "message": "nope"});
        assert!(matches!(
            parse_articles(&bad_key).unwrap_err(),
            SourceError::Authentication(_)
        ));

        assert!(matches!(
            parse_articles(&json!({"status": "ok"})).unwrap_err(),
            SourceError::Malformed(_)
        ));
    }

    #[test]
    fn test_validate_and_transform() {
        let source = NewsSource::new(
            &NewsSourceConfig::default(),
            SecretString::from("key".to_string()),
        )
        .unwrap();
        let articles = parse_articles(&response()).unwrap();

        assert!(source.validate_item(&articles[0]));
        assert!(!source.validate_item(&articles[1]));

        let payload = source.transform_item(articles[1].clone());
        assert!(payload.get("author").is_none());
        assert_eq!(payload["title"], "Untitled");
    }

    #[test]
    fn test_endpoint_selection() {
        let (path, params) = endpoint(&CollectionRequest::new("news", 250));
        assert_eq!(path, "/v2/top-headlines");
        assert!(params.contains(&("pageSize", "100".to_string())));

        let search = CollectionRequest::new("news", 20).with_param("query", "rust");
        let (path, params) = endpoint(&search);
        assert_eq!(path, "/v2/everything");
        assert_eq!(params[0], ("q", "rust".to_string()));
    }
}
