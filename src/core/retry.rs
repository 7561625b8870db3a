//! Bounded retry for transient storage contention.
//!
//! Only errors for which [`crate::errors::Error::is_transient`] holds are retried. Data-driven
//! rejections such as a full shift or a non-pending record return immediately.

use crate::config::RetryPolicy;
use crate::errors::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay_ms.saturating_mul(1_u64 << exponent);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Runs `operation` until it succeeds, fails with a non-transient error, or
/// `policy.max_attempts` is exhausted.
///
/// Each attempt must be a complete unit of work (its own database transaction)
/// so that a failed attempt leaves nothing behind.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt_fn: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match attempt_fn().await {
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Transient storage error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}
