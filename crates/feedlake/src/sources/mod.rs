//! HTTP adapters for the known providers and the registry built from
//! configuration.
//!
//! Each adapter keeps its response mapping in a plain `parse_*` function
//! so it can be tested against canned JSON without a network.

pub mod news;
pub mod reddit;
pub mod twitter;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Response, StatusCode};
use tracing::info;

pub use news::NewsSource;
pub use reddit::RedditSource;
pub use twitter::TwitterSource;

use crate::collector::{Orchestrator, OrchestratorSettings, Source};
use crate::config::{Config, SourcesConfig};
use crate::error::{ConfigError, SourceError};
use crate::ratelimit::{merge_profiles, RateLimiter};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn http_client(user_agent: &str) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(ConfigError::HttpClient)
}

/// Maps non-success statuses onto `SourceError`, passing successes through.
pub(crate) async fn check_status(resp: Response) -> Result<Response, SourceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::Authentication(body),
        _ => SourceError::Status {
            status: status.as_u16(),
            body,
        },
    })
}

/// Instantiates every provider whose credentials resolve.
///
/// A provider without credentials is skipped with a log line, not an
/// error. Unreadable secret files and the like still fail.
pub fn build_sources(config: &SourcesConfig) -> Result<Vec<Arc<dyn Source>>, ConfigError> {
    let mut sources: Vec<Arc<dyn Source>> = Vec::new();

    match config.reddit.credentials()? {
        Some(credentials) => {
            sources.push(Arc::new(RedditSource::new(&config.reddit, credentials)?));
        }
        None => info!(source = "reddit", "No credentials configured, source disabled"),
    }

    match config.news.api_key()? {
        Some(api_key) => sources.push(Arc::new(NewsSource::new(&config.news, api_key)?)),
        None => info!(source = "news", "No API key configured, source disabled"),
    }

    match config.twitter.bearer_token()? {
        Some(token) => sources.push(Arc::new(TwitterSource::new(&config.twitter, token)?)),
        None => info!(source = "twitter", "No bearer token configured, source disabled"),
    }

    Ok(sources)
}

/// Orchestrator over every available provider with the configured rate
/// limits and collection settings.
pub fn build_orchestrator(config: &Config) -> Result<Orchestrator, ConfigError> {
    let limiter = RateLimiter::new(merge_profiles(&config.rate_limits));
    let mut orchestrator =
        Orchestrator::new(limiter, OrchestratorSettings::from(&config.collection));
    for source in build_sources(&config.sources)? {
        orchestrator.register(source);
    }
    info!(
        sources = ?orchestrator.source_names(),
        "Orchestrator ready with {} collector(s)",
        orchestrator.len()
    );
    Ok(orchestrator)
}
