//! ring-master binary entry point.
//!
//! Usage:
//! ```bash
//! ring-master --config /etc/swift/ring-master.toml
//! ring-master --swift-dir /etc/swift --bind 127.0.0.1:8090
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use ringsync_master::{http, Config, MasterError, RingMaster};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Serves Swift ring files to ring-minions.
#[derive(Parser, Debug)]
#[command(name = "ring-master")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, short, default_value = "/etc/swift/ring-master.toml")]
    config: PathBuf,

    /// Override the directory holding the rings
    #[arg(long)]
    swift_dir: Option<PathBuf>,

    /// Override the listen address
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ringsync_master=info,ring_master=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = if cli.config.exists() {
        Config::from_file(&cli.config)?
    } else {
        Config::default()
    };
    if let Some(dir) = cli.swift_dir {
        config.master.swift_dir = dir;
    }
    if let Some(bind) = cli.bind {
        config.master.bind_address = bind;
    }

    http::health::init_start_time();
    let address = config.master.bind_address.clone();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|source| MasterError::Bind {
            address: address.clone(),
            source,
        })
        .context("Failed to start ring-master")?;

    let master = Arc::new(RingMaster::new(config.master));
    master.prime().await;

    tracing::info!(%address, "ring-master v{} listening", env!("CARGO_PKG_VERSION"));

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down");
        }
        signal.cancel();
    });

    ringsync_master::serve(listener, master, shutdown).await?;
    Ok(())
}
