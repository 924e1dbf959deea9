use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use super::config::RateLimitConfig;

/// A trailing time span whose admissions are capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Second,
    Minute,
    Hour,
    Day,
}

impl Window {
    pub const ALL: [Window; 4] = [Window::Second, Window::Minute, Window::Hour, Window::Day];

    pub fn span(self) -> Duration {
        match self {
            Window::Second => Duration::from_secs(1),
            Window::Minute => Duration::from_secs(60),
            Window::Hour => Duration::from_secs(3600),
            Window::Day => Duration::from_secs(86_400),
        }
    }

    pub fn cap(self, config: &RateLimitConfig) -> usize {
        let cap = match self {
            Window::Second => config.burst_limit,
            Window::Minute => config.requests_per_minute,
            Window::Hour => config.requests_per_hour,
            Window::Day => config.requests_per_day,
        };
        cap as usize
    }

    fn index(self) -> usize {
        match self {
            Window::Second => 0,
            Window::Minute => 1,
            Window::Hour => 2,
            Window::Day => 3,
        }
    }
}

/// Sliding windows and failure streak for one source.
///
/// Timestamps in each window are kept in admission order, so the oldest
/// entry is always at the front.
#[derive(Debug, Default)]
pub struct RateLimitState {
    windows: [VecDeque<Instant>; 4],
    consecutive_failures: u32,
}

impl RateLimitState {
    /// Drops entries that have aged out of their window.
    pub fn prune(&mut self, now: Instant) {
        for window in Window::ALL {
            let span = window.span();
            let entries = &mut self.windows[window.index()];
            while let Some(&oldest) = entries.front() {
                if now.duration_since(oldest) >= span {
                    entries.pop_front();
                } else {
                    break;
                }
            }
        }
    }

    /// How long until every full window frees a slot. Zero when none is full.
    ///
    /// Call after `prune`.
    pub fn capacity_wait(&self, config: &RateLimitConfig, now: Instant) -> Duration {
        Window::ALL
            .iter()
            .filter_map(|&window| {
                let entries = &self.windows[window.index()];
                if entries.len() < window.cap(config) {
                    return None;
                }
                entries
                    .front()
                    .map(|&oldest| (oldest + window.span()).saturating_duration_since(now))
            })
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Records one admission in every window.
    pub fn record(&mut self, at: Instant) {
        for entries in self.windows.iter_mut() {
            entries.push_back(at);
        }
    }

    pub fn occupancy(&self, window: Window) -> usize {
        self.windows[window.index()].len()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }
}
