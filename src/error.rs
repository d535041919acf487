//! Error types for the employee gateway

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for the employee gateway
pub type Result<T> = std::result::Result<T, Error>;

/// Employee gateway errors
///
/// Upstream failures keep the status code that produced them so callers can
/// tell a rate-limited call from a missing employee. The type is `Clone`
/// because one in-flight list load hands its outcome to every waiting reader.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Input rejected before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Upstream client error the caller cannot fix by retrying
    #[error("Upstream returned {status} for {target}")]
    TerminalUpstream {
        /// HTTP status code
        status: u16,
        /// Request target (`METHOD url`)
        target: String,
    },

    /// Transient upstream failure (408, 429, 5xx)
    #[error("Upstream returned {status} for {target} (retryable)")]
    RetryableUpstream {
        /// HTTP status code
        status: u16,
        /// Request target (`METHOD url`)
        target: String,
        /// Wait requested by the upstream through `Retry-After`
        retry_after: Option<Duration>,
    },

    /// Connection, timeout or other transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Successful response whose body did not match the expected envelope
    #[error("Decode error: {0}")]
    Decode(String),

    /// Employee does not exist (or the upstream refused to delete it)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

impl Error {
    /// Whether the failure is transient and may be re-attempted
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RetryableUpstream { .. } | Self::Transport(_))
    }

    /// Whether the upstream answered with a failure that must not be retried
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TerminalUpstream { .. } | Self::Decode(_))
    }

    /// Upstream-supplied wait before the next attempt, if any
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RetryableUpstream { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Upstream HTTP status behind this error, if any
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::TerminalUpstream { status, .. } | Self::RetryableUpstream { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}
