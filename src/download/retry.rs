//! Retry policy for page and player script fetches

use crate::error::MediaError;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::warn;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_jitter_factor(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `attempt` (0-based), without jitter
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        Duration::from_millis(millis as u64).min(self.max_delay)
    }

    fn with_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor <= 0.0 {
            return delay;
        }
        let range = delay.as_millis() as f64 * self.jitter_factor;
        let jitter = rand::random::<f64>() * range;
        delay + Duration::from_millis(jitter as u64)
    }
}

/// A boxed attempt future
pub type Attempt<T> = Pin<Box<dyn Future<Output = Result<T, MediaError>> + Send>>;

/// Runs an operation until it succeeds, fails permanently, or retries run out
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn with_config(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute `op`, retrying errors for which [`MediaError::is_retryable`] holds
    pub async fn execute<F, T>(&self, label: &str, mut op: F) -> Result<T, MediaError>
    where
        F: FnMut() -> Attempt<T>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.with_jitter(self.config.backoff(attempt));
                    warn!(
                        "{} failed (attempt {}/{}): {}, retrying in {}",
                        label,
                        attempt + 1,
                        self.config.max_retries + 1,
                        error,
                        humantime::format_duration(delay)
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
