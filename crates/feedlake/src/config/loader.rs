use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    // An empty document deserializes to unit, not to an empty mapping.
    let config: Config = if content.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(content)?
    };

    validate_config(&config)?;

    Ok(config)
}

/// Loads `path` if given, else `~/.feedlake/config.yaml`.
///
/// A missing file yields the built-in defaults; any other read or parse
/// failure is an error.
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) => path,
            None => return Ok(Config::default()),
        },
    };

    if !path.exists() {
        log::info!(
            "Config file {} not found, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    load_config(&path)
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".feedlake").join("config.yaml"))
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let collection = &config.collection;

    if collection.max_retries == 0 {
        return Err(ConfigError::Validation {
            message: "collection.max_retries must be at least 1".to_string(),
        });
    }

    if collection.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "collection.timeout_secs must be greater than zero".to_string(),
        });
    }

    if collection.min_per_source == 0 {
        return Err(ConfigError::Validation {
            message: "collection.min_per_source must be at least 1".to_string(),
        });
    }

    if !(0.0..=1.0).contains(&collection.quality_threshold) {
        return Err(ConfigError::Validation {
            message: format!(
                "collection.quality_threshold must be within [0, 1], got {}",
                collection.quality_threshold
            ),
        });
    }

    for (name, limits) in &config.rate_limits {
        limits.validate(name)?;
    }

    Ok(())
}
