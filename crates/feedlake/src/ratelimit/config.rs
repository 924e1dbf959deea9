use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConfigError;

/// Per-source admission caps and failure backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    pub requests_per_day: u32,
    /// Admissions allowed inside any one-second span.
    #[serde(default = "default_burst_limit")]
    pub burst_limit: u32,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Upper bound on the failure backoff, in seconds.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: f64,
}

fn default_burst_limit() -> u32 {
    10
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_secs() -> f64 {
    60.0
}

impl RateLimitConfig {
    pub fn new(per_minute: u32, per_hour: u32, per_day: u32) -> Self {
        Self {
            requests_per_minute: per_minute,
            requests_per_hour: per_hour,
            requests_per_day: per_day,
            burst_limit: default_burst_limit(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }

    /// Rejects caps that could never admit a request and nonsensical backoff.
    pub fn validate(&self, source_name: &str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidRateLimit {
            source_name: source_name.to_string(),
            reason,
        };

        for (label, cap) in [
            ("requests_per_minute", self.requests_per_minute),
            ("requests_per_hour", self.requests_per_hour),
            ("requests_per_day", self.requests_per_day),
            ("burst_limit", self.burst_limit),
        ] {
            if cap == 0 {
                return Err(invalid(format!("{} must be greater than zero", label)));
            }
        }

        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(invalid(format!(
                "backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if !self.max_backoff_secs.is_finite() || self.max_backoff_secs < 0.0 {
            return Err(invalid(format!(
                "max_backoff_secs must be non-negative, got {}",
                self.max_backoff_secs
            )));
        }

        Ok(())
    }
}

/// Built-in profiles for the known sources.
///
/// The News and Twitter free tiers are budgeted per day and per month.
pub fn default_profiles() -> BTreeMap<String, RateLimitConfig> {
    let mut profiles = BTreeMap::new();
    profiles.insert("reddit".to_string(), RateLimitConfig::new(60, 3600, 86400));
    profiles.insert("news".to_string(), RateLimitConfig::new(1, 4, 100));
    profiles.insert("twitter".to_string(), RateLimitConfig::new(1, 2, 50));
    profiles
}

/// Layers configured overrides on top of the built-in profiles.
pub fn merge_profiles(
    overrides: &BTreeMap<String, RateLimitConfig>,
) -> BTreeMap<String, RateLimitConfig> {
    let mut profiles = default_profiles();
    for (name, config) in overrides {
        profiles.insert(name.clone(), config.clone());
    }
    profiles
}
