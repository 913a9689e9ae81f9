//! duet: two-player pairing lobby and video relay.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use duet_config::{validation, DuetConfig, LogLevel};
use duet_relay::Server;

#[derive(Parser)]
#[command(name = "duet", about = "Pair players and relay their video streams")]
struct Args {
    /// Config file to load instead of the platform default.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Control port override.
    #[arg(short, long)]
    port: Option<u16>,

    /// Player capacity override.
    #[arg(long)]
    capacity: Option<u32>,

    /// Log level override.
    #[arg(long, value_enum, ignore_case = true)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let loaded = duet_config::load_config(args.config.as_deref());
    let level = args
        .log_level
        .or_else(|| loaded.as_ref().ok().map(|config| config.logging.level))
        .unwrap_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.directive().into()),
        )
        .init();

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = apply_overrides(&mut config, &args) {
        tracing::error!(error = %e, "Invalid command line override");
        return ExitCode::FAILURE;
    }

    let server = match Server::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start");
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        _ = server.run() => ExitCode::SUCCESS,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            ExitCode::SUCCESS
        }
    }
}

fn apply_overrides(
    config: &mut DuetConfig,
    args: &Args,
) -> Result<(), duet_common::ConfigError> {
    if let Some(port) = args.port {
        config.control.port = port;
    }
    if let Some(capacity) = args.capacity {
        config.pool.capacity = capacity;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    validation::validate(config)
}
