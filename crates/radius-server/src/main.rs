// SPDX-License-Identifier: Apache-2.0 OR MIT

//! RADIUS authentication and accounting daemon.
//!
//! # Usage
//!
//! ```bash
//! # Start with compiled-in defaults
//! radiusd
//!
//! # Custom ports and a config file
//! radiusd --auth-port 1812 --acct-port 1813 --config radiusd.json
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod acct_engine;
mod app_state;
mod auth_engine;
mod config;
mod dispatcher;
mod jobs;
mod log_layer;
mod registry;
mod scheduler;
mod session_buffer;

use app_state::AppState;
use config::Config;
use dispatcher::Dispatcher;
use log_layer::StoreLogLayer;
use radius_store::Db;
use scheduler::Scheduler;

/// RADIUS (RFC 2865/2866) authentication and accounting daemon.
#[derive(Parser, Debug)]
#[command(name = "radiusd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind address for both the auth and accounting sockets.
    #[arg(long)]
    bind_address: Option<String>,

    /// UDP port for Access-Request packets.
    #[arg(long)]
    auth_port: Option<u16>,

    /// UDP port for Accounting-Request packets.
    #[arg(long)]
    acct_port: Option<u16>,

    /// Configuration file (JSON format).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the SQLite database file.
    #[arg(long)]
    database_path: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env_overrides();

    if let Some(bind_address) = &args.bind_address {
        config.bind_address = bind_address.parse()?;
    }
    if let Some(port) = args.auth_port {
        config.auth_port = port;
    }
    if let Some(port) = args.acct_port {
        config.acct_port = port;
    }
    if let Some(path) = args.database_path {
        config.database_path = path;
    }
    config.validate()?;

    let log_db = Db::open(&config.database_path)?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(StoreLogLayer::new(log_db))
        .init();

    if let Some(path) = &args.config {
        info!(?path, "loaded config from file");
    }
    info!(
        bind_address = %config.bind_address,
        auth_port = config.auth_port,
        acct_port = config.acct_port,
        database_path = %config.database_path,
        "radiusd starting"
    );

    let db = Db::open(&config.database_path)?;
    let state = AppState::new(db, config);

    let shutdown = Arc::new(tokio::sync::Notify::new());

    let dispatcher = Dispatcher::new(state.clone(), shutdown.clone());
    let scheduler = Scheduler::new(state.clone(), shutdown.clone());

    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown signal received");
        shutdown_signal.notify_waiters();
    });

    let scheduler_task = tokio::spawn(async move { scheduler.run().await });
    dispatcher.run().await?;
    scheduler_task.await?;

    info!("radiusd stopped");
    Ok(())
}
