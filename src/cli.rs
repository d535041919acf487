//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;

/// Resilient employee API gateway
#[derive(Parser, Debug)]
#[command(name = "employee-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "EMPLOYEE_GATEWAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "EMPLOYEE_GATEWAY_PORT", global = true)]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "EMPLOYEE_GATEWAY_HOST", global = true)]
    pub host: Option<String>,

    /// Upstream employee API base URL
    #[arg(long, env = "EMPLOYEE_GATEWAY_UPSTREAM_URL", global = true)]
    pub upstream_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "EMPLOYEE_GATEWAY_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "EMPLOYEE_GATEWAY_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start the gateway server (default)
    Serve,

    /// Load and validate the configuration, then print it as YAML
    CheckConfig,
}

impl Cli {
    /// Apply command-line overrides on top of loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref host) = self.host {
            config.server.host.clone_from(host);
        }
        if let Some(ref url) = self.upstream_url {
            config.upstream.base_url.clone_from(url);
        }
    }
}
