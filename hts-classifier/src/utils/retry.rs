//! Oracle Retry Logic
//!
//! Bounded retry with exponential backoff for oracle calls. Only
//! [`OracleError::CallFailed`] is retried; schema violations surface at once.
//! Once the attempts are exhausted the last error is returned unchanged.

use crate::types::{CallContext, OracleError};
use std::future::Future;
use std::time::Duration;

/// Retry bounds for one oracle call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(4),
        }
    }

    /// Retry without sleeping between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Run `operation` until it succeeds, fails permanently, or runs out of attempts.
///
/// **Backoff Strategy:**
/// - Initial delay: `policy.initial_backoff`
/// - Multiplier: 2.0, capped at `policy.max_backoff`
pub async fn retry_oracle<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    ctx: &CallContext,
    mut operation: F,
) -> Result<T, OracleError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OracleError>>,
{
    let mut attempt = 0;
    let mut backoff = policy.initial_backoff;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        context = %ctx,
                        attempt,
                        "Oracle call succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if !err.is_retryable() => {
                tracing::warn!(
                    operation = operation_name,
                    context = %ctx,
                    error = %err,
                    "Oracle call failed permanently"
                );
                return Err(err);
            }
            Err(err) => {
                if attempt >= policy.max_attempts {
                    tracing::error!(
                        operation = operation_name,
                        context = %ctx,
                        attempt,
                        error = %err,
                        "Oracle call failed: attempts exhausted"
                    );
                    return Err(err);
                }

                tracing::warn!(
                    operation = operation_name,
                    context = %ctx,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Oracle call failed, will retry after backoff"
                );

                if !backoff.is_zero() {
                    tokio::time::sleep(backoff).await;
                }
                backoff = (backoff * 2).min(policy.max_backoff);
            }
        }
    }
}
