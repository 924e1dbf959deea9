//! Twitter API v2 recent search.

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use super::{check_status, http_client};
use crate::collector::{has_fields, CollectionRequest, Source};
use crate::config::TwitterSourceConfig;
use crate::error::{ConfigError, SourceError};

const DEFAULT_QUERY: &str = "#technology OR #AI OR #machinelearning -is:retweet lang:en";
/// The search endpoint refuses pages outside `10..=100`.
const MIN_PAGE: usize = 10;
const MAX_PAGE: usize = 100;
const METRICS: [&str; 4] = ["retweet_count", "like_count", "reply_count", "quote_count"];

pub struct TwitterSource {
    client: reqwest::Client,
    bearer_token: SecretString,
    api_url: String,
}

impl TwitterSource {
    pub fn new(
        config: &TwitterSourceConfig,
        bearer_token: SecretString,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http_client(&format!("feedlake/{}", env!("CARGO_PKG_VERSION")))?,
            bearer_token,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }
}

pub fn search_params(request: &CollectionRequest) -> Vec<(&'static str, String)> {
    vec![
        (
            "query",
            request.param("query").unwrap_or(DEFAULT_QUERY).to_string(),
        ),
        (
            "max_results",
            request.limit.clamp(MIN_PAGE, MAX_PAGE).to_string(),
        ),
        (
            "tweet.fields",
            "created_at,public_metrics,author_id,lang".to_string(),
        ),
        ("expansions", "author_id".to_string()),
        ("user.fields", "username,name,verified".to_string()),
    ]
}

/// Pairs each tweet in a search response with its expanded author.
///
/// Returns `{"tweet": .., "user": ..}` objects; `user` is null when the
/// author was not expanded. A response with no matches has no `data` key
/// and yields an empty vector.
pub fn parse_search(body: &Value) -> Result<Vec<Value>, SourceError> {
    if body.get("data").is_none() {
        if let Some(errors) = body.get("errors") {
            return Err(SourceError::Other(format!("search failed: {}", errors)));
        }
        return Ok(Vec::new());
    }
    let tweets = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Malformed("data is not an array".to_string()))?;

    let users: HashMap<&str, &Value> = body
        .pointer("/includes/users")
        .and_then(Value::as_array)
        .map(|users| {
            users
                .iter()
                .filter_map(|user| Some((user.get("id")?.as_str()?, user)))
                .collect()
        })
        .unwrap_or_default();

    Ok(tweets
        .iter()
        .map(|tweet| {
            let user = tweet
                .get("author_id")
                .and_then(Value::as_str)
                .and_then(|id| users.get(id))
                .map(|user| (*user).clone())
                .unwrap_or(Value::Null);
            json!({"tweet": tweet, "user": user})
        })
        .collect())
}

/// Flattens a `{"tweet", "user"}` pair into the payload shape.
pub fn transform_tweet(raw: Value) -> Value {
    let tweet = raw.get("tweet").unwrap_or(&Value::Null);
    let user = raw.get("user").unwrap_or(&Value::Null);

    let mut payload = json!({
        "id": tweet.get("id"),
        "text": tweet.get("text"),
        "created_at": tweet.get("created_at"),
        "author_id": tweet.get("author_id"),
        "lang": tweet.get("lang"),
        "author_username": user.get("username"),
        "author_name": user.get("name"),
        "author_verified": user.get("verified").and_then(Value::as_bool).unwrap_or(false),
    });
    for metric in METRICS {
        let count = tweet
            .pointer(&format!("/public_metrics/{}", metric))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        payload[metric] = json!(count);
    }
    if let Value::Object(fields) = &mut payload {
        fields.retain(|_, value| !value.is_null());
    }
    payload
}

#[async_trait]
impl Source for TwitterSource {
    fn name(&self) -> &str {
        "twitter"
    }

    async fn collect(&self, request: &CollectionRequest) -> Result<Vec<Value>, SourceError> {
        let resp = self
            .client
            .get(format!("{}/2/tweets/search/recent", self.api_url))
            .bearer_auth(self.bearer_token.expose_secret())
            .query(&search_params(request))
            .send()
            .await?;
        let body: Value = check_status(resp).await?.json().await?;
        let mut tweets = parse_search(&body)?;
        tweets.truncate(request.limit);
        Ok(tweets)
    }

    fn validate_item(&self, raw: &Value) -> bool {
        raw.get("tweet")
            .is_some_and(|tweet| has_fields(tweet, &["id", "text"]))
    }

    fn transform_item(&self, raw: Value) -> Value {
        transform_tweet(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> Value {
        json!({
            "data": [
                {
                    "id": "1001",
                    "text": "Rust 2026 edition is out #rust",
                    "author_id": "42",
                    "created_at": "2026-03-10T11:00:00.000Z",
                    "public_metrics": {
                        "retweet_count": 12, "reply_count": 3,
                        "like_count": 80, "quote_count": 1
                    }
                },
                {
                    "id": "1002",
                    "text": "no author expansion",
                    "author_id": "99",
                    "created_at": "2026-03-10T11:05:00.000Z"
                }
            ],
            "includes": {
                "users": [{"id": "42", "username": "rustlang", "name": "Rust", "verified": true}]
            },
            "meta": {"result_count": 2}
        })
    }

    #[test]
    fn test_parse_search_pairs_users() {
        let tweets = parse_search(&response()).unwrap();
        assert_eq!(tweets.len(), 2);
        assert_eq!(tweets[0]["user"]["username"], "rustlang");
        assert!(tweets[1]["user"].is_null());
    }

    #[test]
    fn test_parse_search_empty_and_error() {
        let empty = json!({"meta": {"result_count": 0}});
        assert!(parse_search(&empty).unwrap().is_empty());

        let failed = json!({"errors": [{"message": "invalid query"}]});
        assert!(matches!(
            parse_search(&failed).unwrap_err(),
            SourceError::Other(_)
        ));
    }

    #[test]
    fn test_transform_flattens_metrics() {
        let tweets = parse_search(&response()).unwrap();

        let first = transform_tweet(tweets[0].clone());
        assert_eq!(first["id"], "1001");
        assert_eq!(first["author_username"], "rustlang");
        assert_eq!(first["author_verified"], true);
        assert_eq!(first["retweet_count"], 12);
        assert_eq!(first["like_count"], 80);

        let second = transform_tweet(tweets[1].clone());
        assert_eq!(second["like_count"], 0);
        assert!(second.get("author_username").is_none());
        assert_eq!(second["author_verified"], false);
    }

    #[test]
    fn test_search_params_clamp_page() {
        let params = search_params(&CollectionRequest::new("twitter", 3));
        assert!(params.contains(&("max_results", "10".to_string())));
        assert_eq!(params[0].1, DEFAULT_QUERY);

        let custom = CollectionRequest::new("twitter", 500).with_param("query", "#rust");
        let params = search_params(&custom);
        assert_eq!(params[0], ("query", "#rust".to_string()));
        assert!(params.contains(&("max_results", "100".to_string())));
    }
}
