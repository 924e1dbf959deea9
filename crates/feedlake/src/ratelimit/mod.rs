//! Per-source sliding-window admission control with failure backoff.
//!
//! Each source owns its own `tokio::sync::Mutex<RateLimitState>`. The lock
//! is held across the admission sleep, so concurrent callers for one source
//! queue behind it in FIFO order while other sources proceed untouched.

pub mod config;
pub mod state;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use config::{default_profiles, merge_profiles, RateLimitConfig};
pub use state::{RateLimitState, Window};

struct SourceLimiter {
    config: RateLimitConfig,
    state: Mutex<RateLimitState>,
}

/// Point-in-time view of one source's limiter, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitSnapshot {
    pub requests_last_second: usize,
    pub requests_last_minute: usize,
    pub requests_last_hour: usize,
    pub requests_last_day: usize,
    pub consecutive_failures: u32,
    pub config: RateLimitConfig,
}

/// Admission control shared by every collector.
#[derive(Clone)]
pub struct RateLimiter {
    limiters: Arc<BTreeMap<String, SourceLimiter>>,
}

impl RateLimiter {
    pub fn new(profiles: BTreeMap<String, RateLimitConfig>) -> Self {
        let limiters = profiles
            .into_iter()
            .map(|(name, config)| {
                (
                    name,
                    SourceLimiter {
                        config,
                        state: Mutex::new(RateLimitState::default()),
                    },
                )
            })
            .collect();
        Self {
            limiters: Arc::new(limiters),
        }
    }

    /// Limiter with only the built-in profiles.
    pub fn with_defaults() -> Self {
        Self::new(default_profiles())
    }

    pub fn is_configured(&self, source: &str) -> bool {
        self.limiters.contains_key(source)
    }

    /// Waits until `source` may issue a request, then records the admission.
    ///
    /// Returns the delay that was applied. Unknown sources are admitted
    /// immediately.
    pub async fn admit_or_wait(&self, source: &str) -> Duration {
        let Some(limiter) = self.limiters.get(source) else {
            warn!(source = %source, "No rate limit configured, admitting immediately");
            return Duration::ZERO;
        };

        let mut state = limiter.state.lock().await;

        let now = Instant::now();
        state.prune(now);
        let capacity_wait = state.capacity_wait(&limiter.config, now);
        let backoff = failure_backoff(&limiter.config, state.consecutive_failures());
        let delay = capacity_wait.max(backoff);

        if !delay.is_zero() {
            info!(
                source = %source,
                delay_secs = delay.as_secs_f64(),
                failures = state.consecutive_failures(),
                "Rate limiting: waiting before request"
            );
            tokio::time::sleep(delay).await;
        }

        let admitted_at = Instant::now();
        state.prune(admitted_at);
        state.record(admitted_at);
        debug!(
            source = %source,
            minute = state.occupancy(Window::Minute),
            "Request admitted"
        );

        delay
    }

    pub async fn record_success(&self, source: &str) {
        if let Some(limiter) = self.limiters.get(source) {
            limiter.state.lock().await.record_success();
        }
    }

    pub async fn record_failure(&self, source: &str) {
        if let Some(limiter) = self.limiters.get(source) {
            limiter.state.lock().await.record_failure();
        }
    }

    /// Current window occupancy and failure streak, or `None` for an
    /// unconfigured source.
    pub async fn snapshot(&self, source: &str) -> Option<RateLimitSnapshot> {
        let limiter = self.limiters.get(source)?;
        let mut state = limiter.state.lock().await;
        state.prune(Instant::now());
        Some(RateLimitSnapshot {
            requests_last_second: state.occupancy(Window::Second),
            requests_last_minute: state.occupancy(Window::Minute),
            requests_last_hour: state.occupancy(Window::Hour),
            requests_last_day: state.occupancy(Window::Day),
            consecutive_failures: state.consecutive_failures(),
            config: limiter.config.clone(),
        })
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// `min(cap, multiplier^failures)` with ±10% jitter; zero without failures.
fn failure_backoff(config: &RateLimitConfig, failures: u32) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }
    let exponent = i32::try_from(failures).unwrap_or(i32::MAX);
    let base = config
        .backoff_multiplier
        .powi(exponent)
        .min(config.max_backoff_secs);
    let jitter = rand::rng().random_range(-0.1..=0.1);
    Duration::from_secs_f64((base * (1.0 + jitter)).max(0.0))
}
