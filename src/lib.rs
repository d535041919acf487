//! Employee Gateway Library
//!
//! Resilient gateway in front of a rate-limited employee API.
//!
//! # Features
//!
//! - **Classification-aware retries**: 408/429/5xx and transport failures are
//!   retried with fixed or exponential backoff, other 4xx fail immediately
//! - **Retry-After**: a 429 hint from the upstream overrides the computed wait
//! - **Single-flight cache**: concurrent list reads share one upstream load;
//!   writes invalidate before they return
//! - **Observability**: structured request/response logging with header
//!   redaction, optional Prometheus metrics
//! - **Thin HTTP surface**: axum router with graceful shutdown

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod failsafe;
pub mod gateway;
pub mod model;
pub mod transport;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// `RUST_LOG` takes precedence over `level`.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| Error::Config(format!("Invalid log level '{level}': {e}")))?;

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Config(e.to_string())),
        _ => subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| Error::Config(e.to_string())),
    }
}
