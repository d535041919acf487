//! Backoff schedules between retry attempts

use std::time::Duration;

use backon::{BackoffBuilder, ConstantBuilder, ExponentialBuilder};

use crate::config::{BackoffConfig, RetryConfig};

/// Maps an attempt index to the wait before the next attempt
///
/// Attempt indices are 0-based: `next_delay(0)` is the wait after the first
/// attempt failed. The exponential schedule never decreases and never
/// exceeds `max_interval`.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    max_attempts: u32,
    schedule: BackoffConfig,
}

impl BackoffPolicy {
    /// Create from config
    #[must_use]
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            // A disabled retry config still makes the one attempt
            max_attempts: if config.enabled {
                config.max_attempts.max(1)
            } else {
                1
            },
            schedule: config.backoff.clone(),
        }
    }

    /// Maximum number of attempts, including the first
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether the attempt with this index is the last one allowed
    #[must_use]
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) >= self.max_attempts
    }

    /// Wait after the attempt with this index failed
    #[must_use]
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let steps = attempt as usize + 1;

        match self.schedule {
            BackoffConfig::Fixed { interval } => ConstantBuilder::default()
                .with_delay(interval)
                .with_max_times(steps)
                .build()
                .last()
                .unwrap_or(interval),
            BackoffConfig::Exponential {
                initial_interval,
                multiplier,
                max_interval,
            } => {
                #[allow(clippy::cast_possible_truncation)]
                let factor = multiplier.max(1.0) as f32;
                ExponentialBuilder::default()
                    .with_min_delay(initial_interval)
                    .with_max_delay(max_interval)
                    .with_factor(factor)
                    .with_max_times(steps)
                    .build()
                    // running max keeps float rounding from ever stepping back
                    .fold(Duration::ZERO, Duration::max)
                    .min(max_interval)
            }
        }
    }
}
