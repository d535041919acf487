//! Employee Gateway - resilient front for a rate-limited employee API

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use employee_gateway::{
    cli::{Cli, Command},
    config::Config,
    gateway::Server,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Some(Command::CheckConfig) => check_config(&config),
        Some(Command::Serve) | None => run_server(config).await,
    }
}

/// Load file + environment configuration, then apply CLI overrides
fn load_config(cli: &Cli) -> employee_gateway::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    // overrides can break what the file alone passed
    config.validate()?;
    Ok(config)
}

/// Print the effective configuration
fn check_config(config: &Config) -> ExitCode {
    match serde_yaml::to_string(config) {
        Ok(yaml) => {
            println!("{yaml}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to render configuration: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run the gateway server
async fn run_server(config: Config) -> ExitCode {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        upstream = %config.upstream.base_url,
        "Starting employee gateway"
    );

    let server = match Server::new(config) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        error!("Gateway error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Gateway shutdown complete");
    ExitCode::SUCCESS
}
