//! Reconciliation of controller responses into the printer snapshot
//!
//! The state machine is kept in plain functions so it can be exercised
//! without any network I/O:
//!
//! ```text
//! Error --ready--> Idle --printing--> Printing <--> Paused
//!   ^                ^                    |           |
//!   |                +--complete/cancelled/standby----+
//!   +------------------- shutdown (from any state) ---+
//! ```
//!
//! `Error` is sticky: telemetry proposals are ignored while in it, and only
//! a liveness `ready` signal leaves it.

use tracing::{debug, warn};

use crate::moonraker::{LivenessSignal, PrinterInfo, StatusQuery};
use crate::notify::{ChangeKind, NotificationSink};
use crate::printer::{set_truncated, PrinterSnapshot, PrinterState, FILENAME_CAPACITY};

/// State after a liveness signal
pub fn after_liveness(current: PrinterState, signal: LivenessSignal) -> PrinterState {
    match signal {
        LivenessSignal::Ready if current == PrinterState::Error => PrinterState::Idle,
        LivenessSignal::Shutdown => PrinterState::Error,
        _ => current,
    }
}

/// State after a telemetry proposal derived from the job state
pub fn after_telemetry(current: PrinterState, proposed: Option<PrinterState>) -> PrinterState {
    match proposed {
        Some(proposed) if current != PrinterState::Error => proposed,
        _ => current,
    }
}

/// Next state for one poll cycle; liveness is applied before telemetry
pub fn reconcile_state(
    current: PrinterState,
    liveness: Option<LivenessSignal>,
    telemetry: Option<PrinterState>,
) -> PrinterState {
    let state = match liveness {
        Some(signal) => after_liveness(current, signal),
        None => current,
    };
    after_telemetry(state, telemetry)
}

/// Map a `print_stats.state` value to the state it proposes, if any
pub fn job_state_proposal(job_state: &str) -> Option<PrinterState> {
    match job_state {
        "printing" => Some(PrinterState::Printing),
        "paused" => Some(PrinterState::Paused),
        "complete" | "cancelled" | "standby" => Some(PrinterState::Idle),
        _ => None,
    }
}

/// Remaining print time extrapolated from elapsed time and progress
pub fn estimate_remaining(elapsed_s: f64, progress: f64) -> f64 {
    elapsed_s / progress - elapsed_s
}

/// Outcome of applying one response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub state_changed: bool,
    pub message_changed: bool,
    pub filename_truncated: bool,
}

/// Owner of the printer snapshot
///
/// All mutation of the snapshot goes through [`Reconciler::apply_liveness`]
/// and [`Reconciler::apply_telemetry`]; everything else only gets a shared
/// reference.
#[derive(Debug, Default)]
pub struct Reconciler {
    snapshot: PrinterSnapshot,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &PrinterSnapshot {
        &self.snapshot
    }

    pub fn state(&self) -> PrinterState {
        self.snapshot.state
    }

    /// Merge a `/printer/info` result
    ///
    /// Publishes one state-changed notification if either the state or the
    /// state message changed.
    pub fn apply_liveness<S: NotificationSink + ?Sized>(
        &mut self,
        info: &PrinterInfo,
        sink: &mut S,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let next = after_liveness(self.snapshot.state, info.signal());
        if next != self.snapshot.state {
            debug!(from = %self.snapshot.state, to = %next, klippy = %info.state, "Liveness transition");
            self.snapshot.state = next;
            report.state_changed = true;
        }

        if self.snapshot.state_message.as_deref() != Some(info.state_message.as_str()) {
            self.snapshot.state_message = Some(info.state_message.clone());
            report.message_changed = true;
        }

        if report.state_changed || report.message_changed {
            sink.notify(ChangeKind::StateChanged, &self.snapshot);
        }

        report
    }

    /// Merge a `/printer/objects/query` result
    ///
    /// Objects missing from the response leave their fields untouched. Always
    /// publishes a data-changed notification, followed by a state-changed
    /// notification if the job state moved the printer state.
    pub fn apply_telemetry<S: NotificationSink + ?Sized>(
        &mut self,
        query: &StatusQuery,
        sink: &mut S,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let status = &query.status;
        let snapshot = &mut self.snapshot;

        if let Some(extruder) = &status.extruder {
            merge(&mut snapshot.extruder_temp, extruder.temperature);
            merge(&mut snapshot.extruder_target_temp, extruder.target);
            merge(&mut snapshot.can_extrude, extruder.can_extrude);
        }

        if let Some(bed) = &status.heater_bed {
            merge(&mut snapshot.bed_temp, bed.temperature);
            merge(&mut snapshot.bed_target_temp, bed.target);
        }

        if let Some(toolhead) = &status.toolhead {
            if let Some(position) = &toolhead.position {
                for (axis, value) in snapshot.position.iter_mut().zip(position) {
                    *axis = *value;
                }
            }
            if let Some(homed) = &toolhead.homed_axes {
                snapshot.homed_axis = homed == "xyz";
            }
        }

        if let Some(gcode_move) = &status.gcode_move {
            merge(&mut snapshot.absolute_coords, gcode_move.absolute_coordinates);
        }

        if let Some(sdcard) = &status.virtual_sdcard {
            merge(&mut snapshot.print_progress, sdcard.progress.map(|p| p.clamp(0.0, 1.0)));
        }

        let mut proposed = None;
        if let Some(stats) = &status.print_stats {
            if let Some(filename) = &stats.filename {
                if set_truncated(&mut snapshot.print_filename, filename) {
                    warn!(
                        capacity = FILENAME_CAPACITY,
                        len = filename.len(),
                        "Print filename too long, truncated"
                    );
                    report.filename_truncated = true;
                }
            }
            merge(&mut snapshot.elapsed_time_s, stats.print_duration);
            merge(&mut snapshot.filament_used_mm, stats.filament_used);
            proposed = stats.state.as_deref().and_then(job_state_proposal);
        }

        let next = after_telemetry(snapshot.state, proposed);
        if next == PrinterState::Printing && snapshot.print_progress > 0.0 {
            snapshot.remaining_time_s =
                estimate_remaining(snapshot.elapsed_time_s, snapshot.print_progress);
        }

        // Data subscribers see the state as it was before this response
        sink.notify(ChangeKind::DataChanged, &self.snapshot);

        if next != self.snapshot.state {
            debug!(from = %self.snapshot.state, to = %next, "Job state transition");
            self.snapshot.state = next;
            report.state_changed = true;
            sink.notify(ChangeKind::StateChanged, &self.snapshot);
        }

        report
    }
}

fn merge<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}
