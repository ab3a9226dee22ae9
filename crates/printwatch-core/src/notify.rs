//! Change notification sinks

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::printer::PrinterSnapshot;

/// Which part of the snapshot a notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChangeKind {
    /// Telemetry fields were refreshed
    #[serde(rename = "printer-data-changed")]
    DataChanged,
    /// Operating state or state message changed
    #[serde(rename = "printer-state-changed")]
    StateChanged,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataChanged => "printer-data-changed",
            Self::StateChanged => "printer-state-changed",
        }
    }
}

/// Receiver of snapshot change notifications
///
/// Called synchronously from inside the fetch that produced the change. The
/// snapshot is only borrowed for the duration of the call.
pub trait NotificationSink {
    fn notify(&mut self, kind: ChangeKind, snapshot: &PrinterSnapshot);
}

impl<T: NotificationSink + ?Sized> NotificationSink for &mut T {
    fn notify(&mut self, kind: ChangeKind, snapshot: &PrinterSnapshot) {
        (**self).notify(kind, snapshot)
    }
}

impl<T: NotificationSink + ?Sized> NotificationSink for Box<T> {
    fn notify(&mut self, kind: ChangeKind, snapshot: &PrinterSnapshot) {
        (**self).notify(kind, snapshot)
    }
}

/// Fan out to two sinks, in order
impl<A: NotificationSink, B: NotificationSink> NotificationSink for (A, B) {
    fn notify(&mut self, kind: ChangeKind, snapshot: &PrinterSnapshot) {
        self.0.notify(kind, snapshot);
        self.1.notify(kind, snapshot);
    }
}

/// Published copy of a notification
#[derive(Debug, Clone, Serialize)]
pub struct PrinterEvent {
    pub kind: ChangeKind,
    pub snapshot: PrinterSnapshot,
    pub at: DateTime<Utc>,
}

/// Sink that republishes notifications on tokio channels
///
/// Every notification goes out on a broadcast channel, and the most recent
/// snapshot is kept in a watch channel for readers that only need the
/// current value.
pub struct BroadcastSink {
    events: broadcast::Sender<PrinterEvent>,
    latest: watch::Sender<PrinterSnapshot>,
}

/// Read side of a [`BroadcastSink`]
#[derive(Clone)]
pub struct SnapshotFeed {
    events: broadcast::Sender<PrinterEvent>,
    latest: watch::Receiver<PrinterSnapshot>,
}

impl BroadcastSink {
    /// Create a sink and its feed; `capacity` bounds the event backlog per subscriber
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> (Self, SnapshotFeed) {
        let (events, _) = broadcast::channel(capacity.max(1));
        let (latest, latest_rx) = watch::channel(PrinterSnapshot::default());
        let feed = SnapshotFeed {
            events: events.clone(),
            latest: latest_rx,
        };
        (Self { events, latest }, feed)
    }
}

impl NotificationSink for BroadcastSink {
    fn notify(&mut self, kind: ChangeKind, snapshot: &PrinterSnapshot) {
        self.latest.send_replace(snapshot.clone());
        // No subscribers is fine
        let _ = self.events.send(PrinterEvent {
            kind,
            snapshot: snapshot.clone(),
            at: Utc::now(),
        });
    }
}

impl SnapshotFeed {
    /// Subscribe to notifications published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<PrinterEvent> {
        self.events.subscribe()
    }

    /// Copy of the most recently published snapshot
    pub fn latest(&self) -> PrinterSnapshot {
        self.latest.borrow().clone()
    }

    /// Watch receiver for the most recent snapshot
    pub fn watch(&self) -> watch::Receiver<PrinterSnapshot> {
        self.latest.clone()
    }
}

/// Sink that logs notifications
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&mut self, kind: ChangeKind, snapshot: &PrinterSnapshot) {
        match kind {
            ChangeKind::StateChanged => info!(
                state = %snapshot.state,
                message = snapshot.state_message.as_deref().unwrap_or(""),
                "Printer state changed"
            ),
            ChangeKind::DataChanged => debug!(
                extruder = snapshot.extruder_temp,
                bed = snapshot.bed_temp,
                progress = snapshot.print_progress,
                file = %snapshot.print_filename,
                "Printer data updated"
            ),
        }
    }
}
