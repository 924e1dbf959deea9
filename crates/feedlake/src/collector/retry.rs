use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Bounded retries with exponential spacing.
///
/// Attempt `n` (zero-based) that fails is followed by a sleep of
/// `backoff * 2^n`, except after the final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// How a retried operation ended.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Success { value: T, attempts: u32 },
    Exhausted { last_error: E, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Success { attempts, .. } | RetryOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryOutcome::Success { value, .. } => Ok(value),
            RetryOutcome::Exhausted { last_error, .. } => Err(last_error),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Sleep after failed attempt `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor)
    }

    /// Runs `op` until it succeeds or the attempts run out.
    ///
    /// `op` receives the zero-based attempt number. At least one attempt
    /// is always made.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    return RetryOutcome::Success {
                        value,
                        attempts: attempt + 1,
                    }
                }
                Err(err) => {
                    warn!(
                        source = %label,
                        attempt = attempt + 1,
                        max_attempts,
                        error = %err,
                        "Collection attempt failed"
                    );
                    if attempt + 1 >= max_attempts {
                        return RetryOutcome::Exhausted {
                            last_error: err,
                            attempts: attempt + 1,
                        };
                    }
                    tokio::time::sleep(self.delay_for(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}
