use std::time::Duration;
use std::future::Future;

use crate::llm::types::ProviderFamily;
use super::types::ReverieError;
use tracing::warn;

/// Retry configuration for oracle calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait before retrying any non rate-limit failure.
    pub retry_delay: Duration,
    /// Groq-family wait when the provider sent no retry hint.
    pub rate_limit_delay: Duration,
    /// Gemini-family wait, multiplied by the 1-based attempt number.
    pub rate_limit_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            rate_limit_delay: Duration::from_secs(2),
            rate_limit_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Config with every wait set to zero, used by tests and dry runs.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            retry_delay: Duration::ZERO,
            rate_limit_delay: Duration::ZERO,
            rate_limit_backoff: Duration::ZERO,
        }
    }

    /// Calculate the wait before the next attempt.
    ///
    /// - Groq rate limit: provider `retry-after` hint, else `rate_limit_delay`
    /// - Gemini rate limit: `rate_limit_backoff * attempt`
    /// - Anything else: `retry_delay`
    ///
    /// `attempt` is the 1-based number of the attempt that just failed.
    pub fn delay_for(&self, error: &ReverieError, attempt: u32) -> Duration {
        match error {
            ReverieError::RateLimit { family: ProviderFamily::Groq, retry_after, .. } => {
                retry_after.unwrap_or(self.rate_limit_delay)
            }
            ReverieError::RateLimit { family: ProviderFamily::Gemini, .. } => {
                self.rate_limit_backoff * attempt
            }
            _ => self.retry_delay,
        }
    }
}

/// Execute an async operation with retry logic.
///
/// Retries only if the error is classified as retryable and we haven't
/// exceeded `max_retries`. The final error is returned unchanged.
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    config: &RetryConfig,
    mut factory: F,
) -> Result<T, ReverieError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ReverieError>>,
{
    let max_attempts = config.max_retries + 1;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let err = match factory().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        let classification = err.classify();
        if !classification.retryable {
            warn!(
                operation = operation_name,
                error_type = classification.error_type,
                "Non-retryable error, failing immediately"
            );
            return Err(err);
        }
        if attempt >= max_attempts {
            warn!(
                operation = operation_name,
                attempt,
                max = max_attempts,
                "Max retries exhausted"
            );
            return Err(err);
        }

        let delay = config.delay_for(&err, attempt);
        warn!(
            operation = operation_name,
            attempt,
            max = max_attempts,
            error_type = classification.error_type,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying after error"
        );
        tokio::time::sleep(delay).await;
    }
}
