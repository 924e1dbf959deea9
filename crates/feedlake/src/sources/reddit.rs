//! Reddit via the OAuth API (application-only client credentials).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use super::{check_status, http_client};
use crate::collector::{has_fields, CollectionRequest, Source};
use crate::config::{RedditCredentials, RedditSourceConfig};
use crate::error::{ConfigError, SourceError};

const DEFAULT_SUBREDDIT: &str = "technology";
const DEFAULT_SORT: &str = "hot";
const SORTS: [&str; 5] = ["hot", "new", "top", "rising", "controversial"];
const MAX_PAGE: usize = 100;
/// Refresh this long before the token actually expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

const REQUIRED_FIELDS: [&str; 5] = ["id", "title", "author", "subreddit", "score"];
const KEPT_FIELDS: [&str; 13] = [
    "id",
    "title",
    "selftext",
    "url",
    "author",
    "subreddit",
    "score",
    "upvote_ratio",
    "num_comments",
    "created_utc",
    "permalink",
    "is_self",
    "over_18",
];

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    value: SecretString,
    expires_at: Instant,
}

pub struct RedditSource {
    client: reqwest::Client,
    credentials: RedditCredentials,
    auth_url: String,
    api_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl RedditSource {
    pub fn new(
        config: &RedditSourceConfig,
        credentials: RedditCredentials,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http_client(&config.user_agent)?,
            credentials,
            auth_url: config.auth_url.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<SecretString, SourceError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting reddit access token");
        let resp = self
            .client
            .post(&self.auth_url)
            .basic_auth(
                &self.credentials.client_id,
                Some(self.credentials.client_secret.expose_secret()),
            )
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;
        let token: TokenResponse = check_status(resp).await?.json().await?;

        let value = SecretString::from(token.access_token);
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_SLACK);
        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(value)
    }
}

/// Path and query for a request: search when `query` is set, otherwise a
/// subreddit listing.
pub fn listing_target(request: &CollectionRequest) -> (String, Vec<(&'static str, String)>) {
    let limit = request.limit.clamp(1, MAX_PAGE).to_string();
    if let Some(query) = request.param("query") {
        let mut params = vec![("q", query.to_string()), ("limit", limit)];
        let path = match request.param("subreddit") {
            Some(subreddit) => {
                params.push(("restrict_sr", "true".to_string()));
                format!("/r/{}/search", subreddit)
            }
            None => "/search".to_string(),
        };
        return (path, params);
    }

    let subreddit = request.param("subreddit").unwrap_or(DEFAULT_SUBREDDIT);
    let sort = request
        .param("sort")
        .filter(|sort| SORTS.contains(sort))
        .unwrap_or(DEFAULT_SORT);
    (
        format!("/r/{}/{}", subreddit, sort),
        vec![("limit", limit)],
    )
}

/// Extracts posts from a listing response (`data.children[].data`).
pub fn parse_listing(body: &Value) -> Result<Vec<Value>, SourceError> {
    let children = body
        .pointer("/data/children")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Malformed("listing has no data.children".to_string()))?;
    Ok(children
        .iter()
        .filter_map(|child| child.get("data").cloned())
        .collect())
}

#[async_trait]
impl Source for RedditSource {
    fn name(&self) -> &str {
        "reddit"
    }

    async fn collect(&self, request: &CollectionRequest) -> Result<Vec<Value>, SourceError> {
        let token = self.access_token().await?;
        let (path, params) = listing_target(request);
        let resp = self
            .client
            .get(format!("{}{}", self.api_url, path))
            .bearer_auth(token.expose_secret())
            .query(&params)
            .send()
            .await?;
        let body: Value = check_status(resp).await?.json().await?;
        let mut posts = parse_listing(&body)?;
        posts.truncate(request.limit);
        Ok(posts)
    }

    fn validate_item(&self, raw: &Value) -> bool {
        has_fields(raw, &REQUIRED_FIELDS)
    }

    fn transform_item(&self, raw: Value) -> Value {
        transform_post(raw)
    }
}

/// Keeps the fields the rest of the system uses; drops the rest.
pub fn transform_post(raw: Value) -> Value {
    let Value::Object(mut fields) = raw else {
        return raw;
    };
    let kept: Map<String, Value> = KEPT_FIELDS
        .iter()
        .filter_map(|key| fields.remove(*key).map(|value| (key.to_string(), value)))
        .collect();
    Value::Object(kept)
}
