//! muting - mutating admission webhook for Ingress hosts.
//!
//! This is the main entry point that:
//! - Parses flags and environment
//! - Initializes structured logging
//! - Validates the configuration and creates the Kubernetes client
//! - Runs startup and serves until SIGTERM or SIGINT

use std::process::ExitCode;

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use muting::{Config, Error, app};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    if let Err(e) = init_tracing(&config) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting muting");

    let client = match app::connect(&config).await {
        Ok(client) => client,
        Err(e) => return fail(e),
    };
    info!("Connected to Kubernetes cluster");

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match shutdown_signal().await {
                Ok(()) => info!("Received shutdown signal, draining"),
                Err(e) => warn!(error = %e, "Signal handlers unavailable, shutting down"),
            }
            shutdown.cancel();
        });
    }

    match app::run(config, client, shutdown).await {
        Ok(()) => {
            info!("muting stopped");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn fail(e: Error) -> ExitCode {
    error!(phase = e.phase(), error = %e, "muting failed");
    ExitCode::FAILURE
}

fn init_tracing(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut filter = EnvFilter::from_default_env();
    for directive in config.log_directives() {
        filter = filter.add_directive(directive.parse()?);
    }
    tracing_subscriber::fmt().with_env_filter(filter).json().init();
    Ok(())
}

/// Wait for SIGTERM or SIGINT
async fn shutdown_signal() -> std::io::Result<()> {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    #[cfg(unix)]
    let terminate = terminate.recv();

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Option<()>>();

    tokio::select! {
        result = ctrl_c => result,
        _ = terminate => Ok(()),
    }
}
