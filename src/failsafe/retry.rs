//! Retry executor with classification-aware backoff
//!
//! ```text
//! Attempting ──success──────────────────────────▶ Succeeded
//!     │  ▲
//!     │  └──── sleep(hint or policy delay) ◀── Retrying
//!     │                                            ▲
//!     ├──retryable, attempts left──────────────────┘
//!     └──terminal, or retryable on last attempt──▶ Exhausted
//! ```
//!
//! The error returned on exhaustion is the one the last attempt produced,
//! never a wrapper around it.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use super::backoff::BackoffPolicy;
use super::classify::ClassifiedOutcome;
use crate::Result;
use crate::config::RetryConfig;

/// Bookkeeping for a single [`RetryExecutor::execute`] call
#[derive(Debug)]
pub struct RetryContext {
    /// Index of the current attempt (0-based)
    pub attempt: u32,
    /// Attempt budget
    pub max_attempts: u32,
    /// Total time slept between attempts so far
    pub waited: Duration,
    /// Error from the previous failed attempt
    pub last_error: Option<crate::Error>,
}

impl RetryContext {
    fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            waited: Duration::ZERO,
            last_error: None,
        }
    }
}

/// Runs an operation until it succeeds, fails terminally, or runs out of
/// attempts
///
/// Sleeps happen on the calling task; concurrent calls back off
/// independently.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: BackoffPolicy,
}

impl RetryExecutor {
    /// Create from config
    #[must_use]
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            policy: BackoffPolicy::new(config),
        }
    }

    /// Create from an existing policy
    #[must_use]
    pub fn with_policy(policy: BackoffPolicy) -> Self {
        Self { policy }
    }

    /// Backoff policy in use
    #[must_use]
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Execute `f` with retry
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt when it was terminal or when the
    /// attempt budget is used up.
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut ctx = RetryContext::new(self.policy.max_attempts());

        loop {
            match ClassifiedOutcome::from(f().await) {
                ClassifiedOutcome::Success(value) => {
                    if let Some(previous) = ctx.last_error.take() {
                        debug!(
                            operation,
                            attempts = ctx.attempt + 1,
                            waited_ms = ctx.waited.as_millis(),
                            last_error = %previous,
                            "Recovered after retry"
                        );
                    }
                    return Ok(value);
                }
                ClassifiedOutcome::TerminalFailure(cause) => {
                    debug!(
                        operation,
                        attempt = ctx.attempt + 1,
                        error = %cause,
                        "Terminal failure, not retrying"
                    );
                    return Err(cause);
                }
                ClassifiedOutcome::RetryableFailure { cause, retry_after } => {
                    if self.policy.is_exhausted(ctx.attempt) {
                        warn!(
                            operation,
                            attempts = ctx.attempt + 1,
                            max_attempts = ctx.max_attempts,
                            waited_ms = ctx.waited.as_millis(),
                            error = %cause,
                            "Max retry attempts reached"
                        );
                        return Err(cause);
                    }

                    let delay = retry_after.unwrap_or_else(|| self.policy.next_delay(ctx.attempt));
                    debug!(
                        operation,
                        attempt = ctx.attempt + 1,
                        max_attempts = ctx.max_attempts,
                        delay_ms = delay.as_millis(),
                        upstream_hint = retry_after.is_some(),
                        error = %cause,
                        "Retrying after backoff"
                    );
                    telemetry_metrics::counter!("upstream_retries_total", "operation" => operation.to_string())
                        .increment(1);

                    ctx.last_error = Some(cause);
                    sleep(delay).await;
                    ctx.waited += delay;
                    ctx.attempt += 1;
                }
            }
        }
    }
}
