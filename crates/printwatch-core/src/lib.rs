//! printwatch Core - Printer snapshot, controller wire types and reconciliation
//!
//! This crate provides the foundational pieces of the printwatch system:
//! - The printer snapshot record and its coarse operating state
//! - Moonraker response types for the info and object-query endpoints
//! - The reconciler that merges responses into the snapshot
//! - Notification sinks that publish snapshot changes to consumers

pub mod moonraker;
pub mod notify;
pub mod printer;
pub mod reconcile;

pub use moonraker::{LivenessSignal, PrinterInfo, StatusQuery};
pub use notify::{BroadcastSink, ChangeKind, LogSink, NotificationSink, PrinterEvent, SnapshotFeed};
pub use printer::{set_truncated, FilenameBuf, PrinterSnapshot, PrinterState, FILENAME_CAPACITY};
pub use reconcile::{reconcile_state, ReconcileReport, Reconciler};
