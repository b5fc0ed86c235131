//! Generic bounded retry with exponential backoff.
//!
//! Every network-facing operation in the pipeline goes through [`with_retry`]
//! with a call-site-specific [`RetryPolicy`]: the predicate decides which
//! errors are worth another attempt (typically timeouts, connection failures,
//! and 5xx responses), while validation and 4xx-class failures propagate
//! immediately.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Bounded retry policy with an exponential backoff schedule.
///
/// Stateless; construct one per call site. The delay before retry `n`
/// (attempts are 1-indexed) is `base_delay * 2^(n - 1)`.
pub struct RetryPolicy<E> {
    max_retries: u32,
    base_delay: Duration,
    predicate: Box<dyn Fn(&E) -> bool + Send + Sync>,
    on_retry: Option<Box<dyn Fn(&E, u32) + Send + Sync>>,
}

impl<E> RetryPolicy<E> {
    /// Creates a policy allowing `max_retries` retries after the first
    /// attempt, retrying only errors for which `predicate` returns `true`.
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        predicate: impl Fn(&E) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            max_retries,
            base_delay,
            predicate: Box::new(predicate),
            on_retry: None,
        }
    }

    /// Installs a hook invoked with the error and the 1-indexed attempt
    /// number before each backoff sleep.
    #[must_use]
    pub fn with_on_retry(mut self, hook: impl Fn(&E, u32) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Box::new(hook));
        self
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Runs `operation` up to `max_retries + 1` times under `policy`.
///
/// The last error propagates to the caller unchanged once the predicate
/// rejects it or attempts are exhausted.
///
/// # Errors
///
/// Returns the final error produced by `operation`.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy<E>, mut operation: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt > policy.max_retries || !(policy.predicate)(&err) {
                    return Err(err);
                }
                let delay = policy.delay_for(attempt);
                debug!(
                    error = %err,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "operation failed, retrying after backoff"
                );
                if let Some(hook) = &policy.on_retry {
                    hook(&err, attempt);
                }
                tokio::time::sleep(delay).await;
            }
        }
    }
}
