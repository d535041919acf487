//! Upstream outcome classification
//!
//! | Status | Outcome |
//! |---|---|
//! | 2xx | success |
//! | 408, 429, 5xx | retryable (429 carries the `Retry-After` hint) |
//! | 400, 401, 403, 404 and anything else | terminal |
//!
//! Unknown codes are terminal: nothing is assumed retryable unless listed.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use tracing::warn;

use super::rate_limit::RateLimitAdvisor;
use crate::{Error, Result};

/// Classification of a raw upstream status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// 2xx
    Success,
    /// Transient failure, eligible for another attempt
    Retryable {
        /// Wait requested by the upstream (429 only)
        retry_after: Option<Duration>,
    },
    /// Failure that must not be retried
    Terminal,
}

/// Classify an upstream response by status code and headers
///
/// Failures are logged here; the function has no other side effects.
pub fn classify(status: StatusCode, headers: &HeaderMap) -> OutcomeKind {
    if status.is_success() {
        return OutcomeKind::Success;
    }

    let reason = status.canonical_reason().unwrap_or("Unknown status");

    match status.as_u16() {
        429 => {
            let retry_after = RateLimitAdvisor::hint(headers);
            warn!(
                status = status.as_u16(),
                reason,
                retry_after_secs = retry_after.map(|d| d.as_secs()),
                "Upstream rate limited request"
            );
            OutcomeKind::Retryable { retry_after }
        }
        408 | 500..=599 => {
            warn!(status = status.as_u16(), reason, "Upstream transient failure");
            OutcomeKind::Retryable { retry_after: None }
        }
        _ => {
            warn!(status = status.as_u16(), reason, "Upstream terminal failure");
            OutcomeKind::Terminal
        }
    }
}

/// Result of one attempt, as seen by the retry loop
#[derive(Debug)]
pub enum ClassifiedOutcome<T> {
    /// The attempt produced a value
    Success(T),
    /// The attempt failed transiently
    RetryableFailure {
        /// Original error
        cause: Error,
        /// Upstream-requested wait before the next attempt
        retry_after: Option<Duration>,
    },
    /// The attempt failed and must not be repeated
    TerminalFailure(Error),
}

impl<T> From<Result<T>> for ClassifiedOutcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(cause) if cause.is_retryable() => Self::RetryableFailure {
                retry_after: cause.retry_after(),
                cause,
            },
            Err(cause) => Self::TerminalFailure(cause),
        }
    }
}
