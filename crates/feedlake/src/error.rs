use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedlakeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Collection error: {0}")]
    Collection(#[from] CollectionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid rate limit for source '{source_name}': {reason}")]
    InvalidRateLimit { source_name: String, reason: String },

    #[error("Failed to resolve credentials for source '{source_name}': {reason}")]
    Credentials { source_name: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Failure of a single `collect` call against an external source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

impl SourceError {
    /// Whether the provider pushed back on request volume.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            SourceError::RateLimited => true,
            SourceError::Status { status, .. } => *status == 429,
            _ => false,
        }
    }
}

/// Terminal failure of one source after every retry was spent.
#[derive(Error, Debug)]
#[error("Collection from '{source_name}' failed after {attempts} attempt(s): {cause}")]
pub struct CollectionError {
    pub source_name: String,
    #[source]
    pub cause: SourceError,
    pub attempts: u32,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Parent record '{id}' not found in {tier} tier")]
    MissingParent { tier: &'static str, id: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Database(crate::db::DatabaseError::Sqlite(err))
    }
}

pub type Result<T> = std::result::Result<T, FeedlakeError>;
