//! printwatch Daemon - Main entry point
//!
//! Polls a Klipper printer through Moonraker and republishes its state to UI
//! clients over HTTP and WebSocket.

mod api;
mod config;
mod poller;
mod server;
mod state;
mod ws;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "printwatch")]
#[command(about = "Klipper printer state synchronization daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "printwatch.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Fetch the printer state once, print it as JSON and exit
    #[arg(long)]
    once: bool,

    /// Write a default configuration file to the config path and exit
    #[arg(long)]
    write_config: bool,
}

// Everything runs on one thread: the poll loop, the web server and the
// signal handlers are multiplexed on the same task.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("printwatch v{}", env!("CARGO_PKG_VERSION"));

    if args.write_config {
        config::save_default_config(&args.config)?;
        info!(path = %args.config.display(), "Wrote default configuration");
        return Ok(());
    }

    // Load configuration
    let mut config = config::load_config(&args.config)?;

    // Override bind address if specified
    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }

    info!(
        host = %config.controller.host,
        port = config.controller.port,
        poll_interval_ms = config.controller.poll_interval_ms,
        "Configuration loaded"
    );

    let (state, mut scheduler) = state::AppState::new(args.config.clone(), config.clone())?;

    if args.once {
        scheduler.setup().await;
        println!("{}", serde_json::to_string_pretty(scheduler.snapshot())?);
        return Ok(());
    }

    tokio::select! {
        result = server::run(state.clone(), &config.daemon.bind) => result?,
        _ = poller::run(state.clone(), scheduler) => {}
        _ = poller::reload_on_hangup(state.clone()) => {}
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
