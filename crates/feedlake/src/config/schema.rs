use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::ratelimit::RateLimitConfig;
use crate::secrets::{self, resolve_secret_optional};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    /// Per-source overrides layered over the built-in profiles.
    #[serde(default)]
    pub rate_limits: BTreeMap<String, RateLimitConfig>,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Falls back to `~/.feedlake/data/feedlake.db`.
    #[serde(default)]
    pub path: Option<String>,
}

impl DatabaseConfig {
    pub fn resolve_path(&self) -> Result<PathBuf, ConfigError> {
        match self.path.as_deref().filter(|p| !p.is_empty()) {
            Some(path) => Ok(PathBuf::from(secrets::expand_home(path))),
            None => crate::db::default_database_path().ok_or_else(|| ConfigError::Validation {
                message: "No database path configured and home directory is unknown".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Upper bound for one source's whole collection, retries included.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Floor when a total limit is split across sources.
    #[serde(default = "default_min_per_source")]
    pub min_per_source: usize,
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    /// Parameters used by `collect_default`, keyed by source name.
    #[serde(default)]
    pub default_requests: BTreeMap<String, BTreeMap<String, String>>,
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_min_per_source() -> usize {
    10
}

fn default_quality_threshold() -> f64 {
    0.8
}

fn default_limit() -> usize {
    100
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            min_per_source: default_min_per_source(),
            quality_threshold: default_quality_threshold(),
            default_limit: default_limit(),
            default_requests: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub reddit: RedditSourceConfig,
    #[serde(default)]
    pub news: NewsSourceConfig,
    #[serde(default)]
    pub twitter: TwitterSourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditSourceConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default = "default_reddit_client_id_env")]
    pub client_id_env_var: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub client_secret_file: Option<String>,
    #[serde(default = "default_reddit_client_secret_env")]
    pub client_secret_env_var: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_reddit_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_reddit_api_url")]
    pub api_url: String,
}

fn default_reddit_client_id_env() -> Option<String> {
    Some("REDDIT_CLIENT_ID".to_string())
}

fn default_reddit_client_secret_env() -> Option<String> {
    Some("REDDIT_CLIENT_SECRET".to_string())
}

fn default_user_agent() -> String {
    format!("feedlake/{}", env!("CARGO_PKG_VERSION"))
}

fn default_reddit_auth_url() -> String {
    "https://www.reddit.com/api/v1/access_token".to_string()
}

fn default_reddit_api_url() -> String {
    "https://oauth.reddit.com".to_string()
}

impl Default for RedditSourceConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_id_env_var: default_reddit_client_id_env(),
            client_secret: None,
            client_secret_file: None,
            client_secret_env_var: default_reddit_client_secret_env(),
            user_agent: default_user_agent(),
            auth_url: default_reddit_auth_url(),
            api_url: default_reddit_api_url(),
        }
    }
}

/// Reddit application credentials (client-credentials OAuth grant).
#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl RedditSourceConfig {
    /// Both halves must resolve; a partial pair excludes the source.
    pub fn credentials(&self) -> Result<Option<RedditCredentials>, ConfigError> {
        let client_id = resolve_secret_optional(
            self.client_id.as_deref(),
            None,
            self.client_id_env_var.as_deref(),
        )
        .map_err(|e| credentials_error("reddit", e))?;
        let client_secret = resolve_secret_optional(
            self.client_secret.as_deref(),
            self.client_secret_file.as_deref(),
            self.client_secret_env_var.as_deref(),
        )
        .map_err(|e| credentials_error("reddit", e))?;

        Ok(match (client_id, client_secret) {
            (Some(id), Some(secret)) => Some(RedditCredentials {
                client_id: secrecy::ExposeSecret::expose_secret(&id).to_string(),
                client_secret: secret,
            }),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSourceConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_news_api_key_env")]
    pub api_key_env_var: Option<String>,
    #[serde(default = "default_news_api_url")]
    pub api_url: String,
}

fn default_news_api_key_env() -> Option<String> {
    Some("NEWS_API_KEY".to_string())
}

fn default_news_api_url() -> String {
    "https://newsapi.org".to_string()
}

impl Default for NewsSourceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_news_api_key_env(),
            api_url: default_news_api_url(),
        }
    }
}

impl NewsSourceConfig {
    pub fn api_key(&self) -> Result<Option<SecretString>, ConfigError> {
        resolve_secret_optional(
            self.api_key.as_deref(),
            self.api_key_file.as_deref(),
            self.api_key_env_var.as_deref(),
        )
        .map_err(|e| credentials_error("news", e))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterSourceConfig {
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default)]
    pub bearer_token_file: Option<String>,
    #[serde(default = "default_twitter_token_env")]
    pub bearer_token_env_var: Option<String>,
    #[serde(default = "default_twitter_api_url")]
    pub api_url: String,
}

fn default_twitter_token_env() -> Option<String> {
    Some("TWITTER_BEARER_TOKEN".to_string())
}

fn default_twitter_api_url() -> String {
    "https://api.twitter.com".to_string()
}

impl Default for TwitterSourceConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            bearer_token_file: None,
            bearer_token_env_var: default_twitter_token_env(),
            api_url: default_twitter_api_url(),
        }
    }
}

impl TwitterSourceConfig {
    pub fn bearer_token(&self) -> Result<Option<SecretString>, ConfigError> {
        resolve_secret_optional(
            self.bearer_token.as_deref(),
            self.bearer_token_file.as_deref(),
            self.bearer_token_env_var.as_deref(),
        )
        .map_err(|e| credentials_error("twitter", e))
    }
}

fn credentials_error(source_name: &str, err: secrets::SecretError) -> ConfigError {
    ConfigError::Credentials {
        source_name: source_name.to_string(),
        reason: err.to_string(),
    }
}
