//! Retry helpers for transient backend errors.
//!
//! Every backend call made by the pipeline goes through [`with_retry`], so
//! timeouts and rate limits are retried with exponential backoff while
//! persistent failures surface immediately.

use std::future::Future;
use std::time::Duration;

use crate::backend::BackendError;
use crate::config::RetryConfig;

/// Runs `op` until it succeeds, fails persistently, or `max_attempts`
/// attempts have been made.
///
/// The delay before retry `n` (1-based) is `base_delay * 2^(n - 1)`.
///
/// # Errors
///
/// Returns the last [`BackendError`] produced by `op`.
pub async fn with_retry<T, F, Fut>(policy: &RetryConfig, what: &str, op: F) -> Result<T, BackendError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let max_retries = policy.max_attempts.saturating_sub(1);
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = backoff(policy.base_delay(), attempt);
            log::warn!("  retry {attempt}/{max_retries} of {what} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_retries => {
                log::warn!("  transient error from {what}: {e}");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << (attempt - 1).min(16))
}
