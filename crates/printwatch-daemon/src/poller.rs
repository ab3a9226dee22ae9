//! Driving loop for the poll scheduler

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::state::{AppState, Scheduler};

/// Populate the snapshot, then tick the scheduler forever
///
/// The scheduler decides on each tick whether a poll cycle is due, so the
/// tick period only bounds how late a cycle can start.
pub async fn run(state: Arc<AppState>, mut scheduler: Scheduler) {
    let tick_ms = state.config.read().await.daemon.tick_ms.max(1);
    let mut ticker = interval(Duration::from_millis(tick_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut poll_interval = state.poll_interval();

    info!(endpoint = %state.client.endpoint().url(""), "Running initial printer fetch");
    scheduler.setup().await;
    info!(state = %scheduler.snapshot().state, "Printer poller started");

    loop {
        ticker.tick().await;

        if poll_interval.has_changed().unwrap_or(false) {
            let interval = *poll_interval.borrow_and_update();
            info!(interval_ms = interval.as_millis() as u64, "Poll interval changed");
            scheduler.set_interval(interval);
        }

        scheduler.tick().await;
    }
}

/// Reload configuration whenever the process receives SIGHUP
#[cfg(unix)]
pub async fn reload_on_hangup(state: Arc<AppState>) {
    use tokio::signal::unix::{signal, SignalKind};
    use tracing::warn;

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGHUP handler, config reload disabled");
            return;
        }
    };

    while hangup.recv().await.is_some() {
        info!(path = %state.config_path.display(), "SIGHUP received, reloading configuration");
        if let Err(e) = state.reload_config().await {
            warn!(error = %e, "Failed to reload configuration, keeping current settings");
        }
    }
}

#[cfg(not(unix))]
pub async fn reload_on_hangup(_state: Arc<AppState>) {
    std::future::pending::<()>().await
}
