//! ring-minion binary entry point.
//!
//! Usage:
//! ```bash
//! ring-minion --config /etc/swift/ring-minion.toml
//! ring-minion --config ring-minion.toml once
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ringsync_minion::{Config, Minion};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Keeps the local Swift rings in sync with a ring-master.
#[derive(Parser, Debug)]
#[command(name = "ring-minion")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, short, default_value = "/etc/swift/ring-minion.toml")]
    config: PathBuf,

    /// Log at debug level
    #[arg(long, short)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Poll forever (default)
    Run,
    /// Check every ring once and exit
    Once,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        Config::from_file(&cli.config)?
    } else {
        Config::default()
    };

    let default_level = if cli.debug || config.minion.debug {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("ringsync_minion={default_level},ring_minion={default_level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate().context("Refusing to start")?;
    let minion = Minion::from_config(&config).context("Failed to build ring-minion")?;

    tracing::info!(
        ring_master = %config.minion.ring_master,
        swift_dir = %config.minion.swift_dir.display(),
        "ring-minion v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Once => {
            let reports = minion.run_once().await;
            if reports.iter().any(|r| r.failure_kind().is_some()) {
                anyhow::bail!("one or more rings failed to sync");
            }
        }
        Commands::Run => {
            let shutdown = CancellationToken::new();
            tokio::spawn(wait_for_signal(shutdown.clone()));
            minion.run_forever(shutdown).await;
        }
    }

    Ok(())
}

/// Cancel `shutdown` on ctrl-c or SIGTERM.
async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutting down");
    shutdown.cancel();
}
