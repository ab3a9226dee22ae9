//! Printer snapshot types for tracking last-known controller state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Capacity of the print filename buffer in bytes
pub const FILENAME_CAPACITY: usize = 512;

/// Coarse operating state of the printer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterState {
    /// Controller reported shutdown, or no successful fetch yet
    Error,
    /// Ready and not running a job
    Idle,
    /// Running a print job
    Printing,
    /// Print job paused
    Paused,
}

impl Default for PrinterState {
    fn default() -> Self {
        Self::Error
    }
}

impl PrinterState {
    /// Human-readable name shown to users
    pub fn name(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Idle => "Idle",
            Self::Printing => "Printing",
            Self::Paused => "Paused",
        }
    }
}

impl fmt::Display for PrinterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-capacity buffer holding the print filename
pub type FilenameBuf = heapless::String<FILENAME_CAPACITY>;

/// Overwrite `target` with as much of `value` as fits, returning `true` if
/// anything was dropped
///
/// Characters are pushed whole, so the cut always lands on a UTF-8 boundary.
pub fn set_truncated<const N: usize>(target: &mut heapless::String<N>, value: &str) -> bool {
    target.clear();
    for ch in value.chars() {
        if target.push(ch).is_err() {
            return true;
        }
    }
    false
}

/// Last-known printer state, as reconciled from controller responses
#[derive(Debug, Clone, Default, Serialize)]
pub struct PrinterSnapshot {
    /// Coarse operating state
    pub state: PrinterState,
    /// Status or error detail reported by the controller
    pub state_message: Option<String>,
    /// Hotend temperature in degrees C
    pub extruder_temp: f64,
    /// Hotend target temperature in degrees C
    pub extruder_target_temp: f64,
    /// Whether the hotend is hot enough to extrude
    pub can_extrude: bool,
    /// Bed temperature in degrees C
    pub bed_temp: f64,
    /// Bed target temperature in degrees C
    pub bed_target_temp: f64,
    /// Toolhead position (X, Y, Z) in mm
    pub position: [f64; 3],
    /// True only when all three axes are homed
    pub homed_axis: bool,
    /// G-code absolute positioning mode
    pub absolute_coords: bool,
    /// Print progress in [0, 1]
    pub print_progress: f64,
    /// File of the current or last print job
    pub print_filename: FilenameBuf,
    /// Time spent printing in seconds
    pub elapsed_time_s: f64,
    /// Filament used in mm
    pub filament_used_mm: f64,
    /// Estimated remaining time in seconds; see [`PrinterSnapshot::remaining_time`]
    pub remaining_time_s: f64,
}

impl PrinterSnapshot {
    /// Remaining time estimate, only while it is meaningful
    ///
    /// The stored `remaining_time_s` is left stale outside of an active print,
    /// so consumers should go through this accessor.
    pub fn remaining_time(&self) -> Option<f64> {
        if self.state == PrinterState::Printing && self.print_progress > 0.0 {
            Some(self.remaining_time_s)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot() {
        let snapshot = PrinterSnapshot::default();
        assert_eq!(snapshot.state, PrinterState::Error);
        assert!(snapshot.state_message.is_none());
        assert!(snapshot.print_filename.is_empty());
        assert_eq!(snapshot.position, [0.0; 3]);
        assert_eq!(snapshot.remaining_time(), None);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(PrinterState::Error.to_string(), "Error");
        assert_eq!(PrinterState::Paused.to_string(), "Paused");
        assert_eq!(
            serde_json::to_string(&PrinterState::Printing).unwrap(),
            "\"printing\""
        );
    }

    #[test]
    fn test_set_truncated_fits() {
        let mut text: heapless::String<8> = heapless::String::new();
        assert!(!set_truncated(&mut text, "cube.gco"));
        assert_eq!(text.as_str(), "cube.gco");
        assert!(!set_truncated(&mut text, "a"));
        assert_eq!(text.as_str(), "a");
    }

    #[test]
    fn test_set_truncated_cuts_long_input() {
        let mut text: heapless::String<8> = heapless::String::new();
        assert!(set_truncated(&mut text, "benchy.gcode"));
        assert_eq!(text.as_str(), "benchy.g");
    }

    #[test]
    fn test_set_truncated_on_char_boundary() {
        let mut text: heapless::String<4> = heapless::String::new();
        // "ab" + two-byte 'é' + 'c' = 5 bytes, the cut must not split 'é'
        assert!(set_truncated(&mut text, "abéc"));
        assert_eq!(text.as_str(), "abé");

        let mut text: heapless::String<3> = heapless::String::new();
        assert!(set_truncated(&mut text, "abé"));
        assert_eq!(text.as_str(), "ab");
    }

    #[test]
    fn test_remaining_time_gated() {
        let mut snapshot = PrinterSnapshot {
            remaining_time_s: 42.0,
            print_progress: 0.5,
            ..Default::default()
        };
        assert_eq!(snapshot.remaining_time(), None);

        snapshot.state = PrinterState::Printing;
        assert_eq!(snapshot.remaining_time(), Some(42.0));

        snapshot.print_progress = 0.0;
        assert_eq!(snapshot.remaining_time(), None);
    }

    #[test]
    fn test_snapshot_serializes_filename_as_string() {
        let mut snapshot = PrinterSnapshot::default();
        set_truncated(&mut snapshot.print_filename, "part.gcode");
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["print_filename"], "part.gcode");
        assert_eq!(json["state"], "error");
    }
}
