//! Configuration management

use std::{collections::HashMap, env, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Prefix for configuration environment variables
pub const ENV_PREFIX: &str = "EMPLOYEE_GATEWAY_";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Inbound server configuration
    pub server: ServerConfig,
    /// Upstream employee API
    pub upstream: UpstreamConfig,
    /// Retry configuration
    pub retry: RetryConfig,
    /// List cache configuration
    pub cache: CacheConfig,
    /// Request/response logging
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be parsed,
    /// or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // EMPLOYEE_GATEWAY_RETRY__MAX_ATTEMPTS=5 -> retry.max_attempts
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.expand_env_vars();
        config.validate()?;

        Ok(config)
    }

    /// Semantic checks serde cannot express
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.upstream.base_url)
            .map_err(|e| Error::Config(format!("Invalid upstream.base_url: {e}")))?;

        if self.upstream.connect_timeout.is_zero() || self.upstream.request_timeout.is_zero() {
            return Err(Error::Config(
                "upstream timeouts must be greater than zero".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if let BackoffConfig::Exponential {
            initial_interval,
            multiplier,
            max_interval,
        } = &self.retry.backoff
        {
            if *multiplier < 1.0 {
                return Err(Error::Config(format!(
                    "retry.backoff.multiplier must be >= 1.0, got {multiplier}"
                )));
            }
            if initial_interval > max_interval {
                return Err(Error::Config(
                    "retry.backoff.initial_interval exceeds max_interval".to_string(),
                ));
            }
        }

        if !self.server.base_path.starts_with('/') {
            return Err(Error::Config(format!(
                "server.base_path must start with '/', got {:?}",
                self.server.base_path
            )));
        }

        for origin in &self.server.cors.allowed_origins {
            if origin == "*" {
                // credentialed requests cannot use a wildcard origin
                if self.server.cors.allow_credentials {
                    return Err(Error::Config(
                        "server.cors.allowed_origins cannot contain '*' when allow_credentials is set"
                            .to_string(),
                    ));
                }
                continue;
            }
            let url = Url::parse(origin).map_err(|e| {
                Error::Config(format!("Invalid CORS origin {origin:?}: {e}"))
            })?;
            if url.origin().ascii_serialization() != origin.as_str() {
                return Err(Error::Config(format!(
                    "CORS origin {origin:?} must be scheme://host[:port] with no path"
                )));
            }
        }

        Ok(())
    }

    /// Expand ${VAR} and ${VAR:-default} patterns in upstream headers
    fn expand_env_vars(&mut self) {
        let Ok(re) = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}") else {
            return;
        };

        for value in self.upstream.headers.values_mut() {
            *value = Self::expand_string(&re, value);
        }
    }

    /// Expand environment variables in a string
    fn expand_string(re: &Regex, value: &str) -> String {
        re.replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map_or("", |m| m.as_str());
            env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .into_owned()
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Graceful shutdown timeout
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    /// Prometheus exporter port (requires the `metrics` feature)
    pub metrics_port: Option<u16>,
    /// Path prefix of the employee routes (`/health` stays at the root)
    pub base_path: String,
    /// Cross-origin access for browser clients
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8111,
            shutdown_timeout: Duration::from_secs(30),
            metrics_port: None,
            base_path: "/api/v1/employee".to_string(),
            cors: CorsConfig::default(),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable the CORS layer
    pub enabled: bool,
    /// Exact origins allowed to call the gateway
    pub allowed_origins: Vec<String>,
    /// Send `Access-Control-Allow-Credentials: true`
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["http://localhost:3000".to_string()],
            allow_credentials: true,
        }
    }
}

/// Upstream employee API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the employee resource
    pub base_url: String,
    /// Connection establishment timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Per-attempt request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Extra headers sent with every request (supports ${VAR})
    pub headers: HashMap<String, String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8112/api/v1/employee".to_string(),
            connect_timeout: Duration::from_secs(10),
            // covers the upstream's longest observed rate-limit window (90s)
            request_timeout: Duration::from_secs(120),
            headers: HashMap::new(),
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries
    pub enabled: bool,
    /// Maximum attempts, including the first
    pub max_attempts: u32,
    /// Wait schedule between attempts
    pub backoff: BackoffConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Backoff schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum BackoffConfig {
    /// Same wait after every attempt
    Fixed {
        /// Wait between attempts
        #[serde(with = "humantime_serde")]
        interval: Duration,
    },
    /// Wait grows by `multiplier` per attempt, capped at `max_interval`
    Exponential {
        /// Wait after the first failed attempt
        #[serde(with = "humantime_serde")]
        initial_interval: Duration,
        /// Growth factor
        multiplier: f64,
        /// Upper bound for any single wait
        #[serde(with = "humantime_serde")]
        max_interval: Duration,
    },
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::Exponential {
            initial_interval: Duration::from_secs(1),
            multiplier: 2.0,
            max_interval: Duration::from_secs(10),
        }
    }
}

/// Cache configuration for the employee list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable list caching
    pub enabled: bool,
    /// Entry lifetime; `None` keeps entries until a write invalidates them
    #[serde(with = "humantime_serde")]
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: None,
        }
    }
}

/// Upstream request/response logging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log request bodies (as a separate record from metadata)
    pub log_bodies: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_bodies: true }
    }
}
