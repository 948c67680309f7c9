//! Retry with exponential backoff for transient (network) failures.

use crate::error::{Error, Result};
use crate::types::RetryConfig;
use std::time::Duration;

/// Callback for retry progress notifications.
pub trait RetryCallback {
    /// Called before sleeping ahead of the next attempt.
    ///
    /// `attempt` is the 1-indexed attempt that just failed.
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay: Duration);
}

/// Callback that logs retry information.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay: Duration) {
        log::warn!(
            "Attempt {attempt}/{max_attempts} failed: {error}. Retrying in {}s...",
            delay.as_secs()
        );
    }
}

/// Execute an operation, retrying while it fails with a retryable error.
///
/// Non-retryable errors are returned immediately. After `max_attempts`
/// the last error is returned.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    callback: Option<&dyn RetryCallback>,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    retry_loop(config, callback, operation, std::thread::sleep)
}

fn retry_loop<T, F, S>(
    config: &RetryConfig,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
    mut sleep: S,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
    S: FnMut(Duration),
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let err = match operation() {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        attempt += 1;
        if !err.is_retryable() || attempt >= max_attempts {
            return Err(err);
        }

        let delay = config.delay_for_attempt(attempt - 1);
        if let Some(cb) = callback {
            cb.on_retry(attempt, max_attempts, &err, delay);
        }
        sleep(delay);
    }
}
