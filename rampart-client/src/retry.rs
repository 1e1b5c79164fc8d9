//! Retry with exponential backoff.
//!
//! The executor is the only component that swallows errors, and only while
//! attempts remain and the predicate allows it. The error finally surfaced is
//! the last attempt's, unwrapped.

use std::fmt::Display;
use std::future::Future;

use rampart_core::{Retryable, RetryPolicy};

/// Run `operation` under `policy`, retrying errors that report themselves
/// as [`Retryable`].
pub async fn retry_with_backoff<T, E, F, Fut>(operation: F, policy: &RetryPolicy) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    retry_with_backoff_if(operation, policy, |err: &E| err.is_retryable()).await
}

/// Run `operation` under `policy`, retrying errors for which `should_retry`
/// returns true.
///
/// `operation` is invoked at most `policy.max_retries + 1` times. After a
/// retryable failure the executor sleeps for the current delay, then grows
/// it by `backoff_multiplier` up to `max_delay`. Dropping the returned
/// future abandons any pending sleep.
pub async fn retry_with_backoff_if<T, E, F, Fut, P>(
    mut operation: F,
    policy: &RetryPolicy,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let mut delay = policy.initial_delay;
    let mut attempt: u32 = 0;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if attempt >= policy.max_retries {
            tracing::warn!(attempts = attempt + 1, error = %err, "Retries exhausted");
            return Err(err);
        }
        if !should_retry(&err) {
            tracing::debug!(attempt = attempt + 1, error = %err, "Error is not retryable");
            return Err(err);
        }

        tracing::warn!(
            attempt = attempt + 1,
            max_attempts = policy.max_attempts(),
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Operation failed, backing off"
        );
        tokio::time::sleep(delay).await;
        delay = policy.next_delay(delay);
        attempt += 1;
    }
}
