//! Rate limit advice from upstream responses

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use tracing::debug;

/// Reads the upstream's `Retry-After` instruction
///
/// Only the delta-seconds form is understood. Anything else (HTTP dates,
/// negative or fractional numbers, garbage) yields no hint so the retry loop
/// falls back to its own schedule instead of failing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimitAdvisor;

impl RateLimitAdvisor {
    /// Wait requested by the upstream, if it sent a usable one
    #[must_use]
    pub fn hint(headers: &HeaderMap) -> Option<Duration> {
        let raw = headers.get(RETRY_AFTER)?;

        let Ok(text) = raw.to_str() else {
            debug!("Ignoring non-ASCII Retry-After header");
            return None;
        };

        match text.trim().parse::<u64>() {
            Ok(secs) => Some(Duration::from_secs(secs)),
            Err(e) => {
                debug!(value = %text, error = %e, "Ignoring unparsable Retry-After header");
                None
            }
        }
    }
}
