use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::event_sourcing::core::{EsError, EsResult};

// ============================================================================
// Conflict Retry - exponential backoff around a command cycle
// ============================================================================
//
// Command handlers own the decision to retry after a concurrency conflict:
// the whole load → mutate → save cycle runs again against fresh state so
// business rules are re-checked. Nothing below the handler retries.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(500),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// For aggregates many writers touch at once.
    pub fn hot_aggregate() -> Self {
        Self {
            max_attempts: 8,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }

    /// Fail on the first conflict.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Pause before attempt `attempt + 1`, capped at `max_delay`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        Duration::from_millis(millis as u64).min(self.max_delay)
    }
}

/// Errors that are worth another attempt against fresh state.
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

/// Only a lost optimistic-concurrency race is worth another attempt.
impl IsTransient for EsError {
    fn is_transient(&self) -> bool {
        self.is_conflict()
    }
}

/// Run `operation` until it succeeds, fails permanently, or exhausts
/// `config.max_attempts`. The closure receives the 1-based attempt number.
pub async fn retry_on_transient<F, Fut, T, E>(config: RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsTransient,
{
    let mut attempt = 1;

    loop {
        let error = match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Command landed after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !error.is_transient() {
            return Err(error);
        }
        if attempt >= config.max_attempts {
            tracing::error!(attempt, error = %error, "Giving up after repeated conflicts");
            return Err(error);
        }

        let delay = config.delay_after(attempt);
        tracing::warn!(
            attempt,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "Lost a concurrency race, retrying against fresh state"
        );
        sleep(delay).await;
        attempt += 1;
    }
}

/// Re-run a whole load → mutate → save cycle while it loses concurrency
/// races.
pub async fn retry_on_conflict<F, Fut, T>(config: RetryConfig, operation: F) -> EsResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = EsResult<T>>,
{
    retry_on_transient(config, operation).await
}
