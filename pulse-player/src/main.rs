//! Pulse Player - Main entry point
//!
//! Runs one sonification session from a TOML configuration file until the
//! source ends by itself or the process receives Ctrl+C / SIGTERM.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pulse_common::config::PulseConfig;
use pulse_common::events::PulseEvent;
use pulse_player::PulseRunner;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for pulse-player
#[derive(Parser, Debug)]
#[command(name = "pulse-player")]
#[command(about = "Event-stream sonification player")]
#[command(version)]
struct Args {
    /// Session configuration file (TOML)
    #[arg(short, long, env = "PULSE_CONFIG")]
    config: PathBuf,

    /// Root folder containing acoustic style sample directories
    #[arg(short, long, default_value = "sounds", env = "PULSE_STYLES_DIR")]
    styles_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse_player=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = PulseConfig::from_toml_file(&args.config)
        .context("failed to load session configuration")?;
    info!(
        resource_id = config.resource_id,
        name = config.name.as_str(),
        transport = config.transport.kind(),
        "loaded session configuration"
    );

    let runner = PulseRunner::new(args.styles_dir);
    let mut events = runner.subscribe();

    runner.start(config).await.context("failed to start session")?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutting down");
                runner.stop().await;
                break;
            }
            event = events.recv() => match event {
                Ok(PulseEvent::SessionStopped { resource_id, .. }) => {
                    info!(resource_id, "session reached Stopped, exiting");
                    break;
                }
                Ok(PulseEvent::TransportError { message, .. }) => {
                    error!("transport error: {message}");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    error!(skipped, "event bus lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
