//! Failsafe mechanisms: outcome classification, rate limit advice, backoff,
//! retry

mod backoff;
mod classify;
mod rate_limit;
mod retry;

pub use backoff::BackoffPolicy;
pub use classify::{ClassifiedOutcome, OutcomeKind, classify};
pub use rate_limit::RateLimitAdvisor;
pub use retry::{RetryContext, RetryExecutor};
