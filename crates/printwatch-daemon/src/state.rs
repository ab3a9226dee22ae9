//! Application state management

use anyhow::{Context, Result};
use printwatch_client::{ControllerClient, ControllerEndpoint, PollScheduler};
use printwatch_core::{BroadcastSink, LogSink, PrinterEvent, PrinterSnapshot, SnapshotFeed};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::info;

use crate::config::{load_config, Config};

/// Scheduler type used by the daemon
pub type Scheduler = PollScheduler<ControllerClient, (BroadcastSink, LogSink)>;

/// Shared application state
///
/// The snapshot itself lives in the [`Scheduler`], which is driven by the
/// poll loop. Everything here only sees published copies.
pub struct AppState {
    /// Path the configuration was loaded from
    pub config_path: PathBuf,
    /// Current configuration
    pub config: RwLock<Config>,
    /// Client used for commands issued through the API
    pub client: ControllerClient,
    /// Published snapshots and events
    pub feed: SnapshotFeed,
    endpoint: watch::Sender<ControllerEndpoint>,
    poll_interval: watch::Sender<Duration>,
}

impl AppState {
    /// Create application state and the scheduler that feeds it
    pub fn new(config_path: PathBuf, config: Config) -> Result<(Arc<Self>, Scheduler)> {
        let (endpoint, endpoint_rx) = watch::channel(config.controller.endpoint());
        let (poll_interval, _) = watch::channel(config.controller.poll_interval());

        let client = ControllerClient::with_timeouts(
            endpoint_rx,
            config.controller.request_timeout(),
            config.controller.command_timeout(),
        )
        .context("Failed to create HTTP client")?;

        let (sink, feed) = BroadcastSink::new(config.daemon.event_capacity);
        let scheduler = PollScheduler::new(client.clone(), (sink, LogSink))
            .with_interval(config.controller.poll_interval());

        let state = Arc::new(Self {
            config_path,
            config: RwLock::new(config),
            client,
            feed,
            endpoint,
            poll_interval,
        });

        Ok((state, scheduler))
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> PrinterSnapshot {
        self.feed.latest()
    }

    /// Subscribe to printer events
    pub fn subscribe(&self) -> broadcast::Receiver<PrinterEvent> {
        self.feed.subscribe()
    }

    /// Receiver for poll interval changes
    pub fn poll_interval(&self) -> watch::Receiver<Duration> {
        self.poll_interval.subscribe()
    }

    /// Re-read the configuration file
    ///
    /// The controller endpoint and poll interval take effect on the next
    /// request / tick. Timeouts and the bind address need a restart.
    pub async fn reload_config(&self) -> Result<()> {
        let config = load_config(&self.config_path)?;

        self.endpoint.send_replace(config.controller.endpoint());
        self.poll_interval.send_replace(config.controller.poll_interval());

        info!(
            host = %config.controller.host,
            port = config.controller.port,
            poll_interval_ms = config.controller.poll_interval_ms,
            "Configuration reloaded"
        );

        let mut current = self.config.write().await;
        // Keep the effective bind address, it cannot change without a restart
        let bind = std::mem::take(&mut current.daemon.bind);
        *current = config;
        current.daemon.bind = bind;
        Ok(())
    }
}
