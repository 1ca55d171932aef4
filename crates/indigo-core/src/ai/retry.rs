//! Rate limiting and retry logic
//!
//! Exponential backoff with jitter for rate limits (429) and transient
//! server errors (500, 502, 503, 504).

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::ai::generator::GenerationError;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryConfig {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (0-based), with up to 25% jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let jitter_ms = (base.as_millis() as u64) / 4;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        base + Duration::from_millis(jitter)
    }
}

pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Errors that may succeed on a second attempt
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for GenerationError {
    fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Transport(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| is_retryable_status(s.as_u16()))
            }
            GenerationError::Api { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or runs out of retries.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, E>
where
    E: IsRetryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < config.max_retries && e.is_retryable() => {
                let delay = config.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after transient error"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
