//! Poll scheduler
//!
//! Driven from an outer loop that calls [`PollScheduler::tick`] much more
//! often than the poll interval. Each eligible tick runs one cycle: the
//! liveness fetch, then the telemetry fetch unless the printer is in `Error`.

use printwatch_core::{NotificationSink, PrinterSnapshot, PrinterState, ReconcileReport, Reconciler};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::client::ControllerApi;

/// Minimum time between two poll cycles
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Sequences controller fetches and owns the reconciled snapshot
pub struct PollScheduler<A, S> {
    api: A,
    sink: S,
    reconciler: Reconciler,
    interval: Duration,
    last_cycle: Option<Instant>,
}

impl<A: ControllerApi, S: NotificationSink> PollScheduler<A, S> {
    pub fn new(api: A, sink: S) -> Self {
        Self {
            api,
            sink,
            reconciler: Reconciler::new(),
            interval: DEFAULT_POLL_INTERVAL,
            last_cycle: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Change the poll interval; applies from the next tick
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn snapshot(&self) -> &PrinterSnapshot {
        self.reconciler.snapshot()
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Populate the snapshot before first display
    ///
    /// Runs one liveness fetch and one telemetry fetch regardless of the
    /// interval gate or the resulting state.
    pub async fn setup(&mut self) {
        self.last_cycle = Some(Instant::now());
        self.fetch_liveness_state().await;
        self.fetch_telemetry().await;
    }

    /// Run a poll cycle if the interval has elapsed; returns whether one ran
    pub async fn tick(&mut self) -> bool {
        self.tick_at(Instant::now()).await
    }

    /// [`PollScheduler::tick`] with an explicit notion of "now"
    pub async fn tick_at(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_cycle {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_cycle = Some(now);

        self.fetch_liveness_state().await;
        if self.reconciler.state() == PrinterState::Error {
            debug!("Printer in error state, skipping telemetry fetch");
        } else {
            self.fetch_telemetry().await;
        }
        true
    }

    /// Fetch `/printer/info` and reconcile it; `None` if the fetch failed
    pub async fn fetch_liveness_state(&mut self) -> Option<ReconcileReport> {
        match self.api.printer_info().await {
            Ok(info) => Some(self.reconciler.apply_liveness(&info, &mut self.sink)),
            Err(e) => {
                warn!(error = %e, "Failed to fetch printer state");
                None
            }
        }
    }

    /// Fetch the object query and reconcile it; `None` if the fetch failed
    pub async fn fetch_telemetry(&mut self) -> Option<ReconcileReport> {
        match self.api.query_status().await {
            Ok(query) => Some(self.reconciler.apply_telemetry(&query, &mut self.sink)),
            Err(e) => {
                warn!(error = %e, "Failed to fetch printer data");
                None
            }
        }
    }
}
