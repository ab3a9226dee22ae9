//! Moonraker API response types
//!
//! Only the endpoints and fields printwatch consumes are modelled. Required
//! fields are plain types so a response missing them fails to decode; every
//! field inside a printer object is optional because Moonraker omits fields
//! it has no value for.

use serde::Deserialize;

/// Liveness / state query endpoint
pub const PRINTER_INFO_PATH: &str = "/printer/info";

/// G-code execution endpoint, takes a `script` query parameter
pub const GCODE_SCRIPT_PATH: &str = "/printer/gcode/script";

/// Compound object query selecting every object the reconciler merges
pub const OBJECTS_QUERY_PATH: &str =
    "/printer/objects/query?extruder&heater_bed&toolhead&gcode_move&virtual_sdcard&print_stats";

/// All Moonraker JSON-RPC style responses wrap their payload in `result`
#[derive(Debug, Clone, Deserialize)]
struct Envelope<T> {
    result: T,
}

/// `GET /printer/info` result
#[derive(Debug, Clone, Deserialize)]
pub struct PrinterInfo {
    /// Klippy state: `ready`, `startup`, `shutdown` or `error`
    pub state: String,
    /// Human-readable detail for the state
    pub state_message: String,
}

impl PrinterInfo {
    /// Decode an info response body
    pub fn from_response(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice::<Envelope<Self>>(body).map(|e| e.result)
    }

    pub fn signal(&self) -> LivenessSignal {
        LivenessSignal::from_state(&self.state)
    }
}

/// Coarse liveness signal derived from the Klippy state text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessSignal {
    Ready,
    Shutdown,
    /// Any other state (`startup`, `error`, ...); carries no transition
    Other,
}

impl LivenessSignal {
    pub fn from_state(state: &str) -> Self {
        match state {
            "ready" => Self::Ready,
            "shutdown" => Self::Shutdown,
            _ => Self::Other,
        }
    }
}

/// `GET /printer/objects/query` result
#[derive(Debug, Clone, Deserialize)]
pub struct StatusQuery {
    pub status: ObjectStatus,
}

impl StatusQuery {
    /// Decode an object query response body
    pub fn from_response(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice::<Envelope<Self>>(body).map(|e| e.result)
    }
}

/// Printer objects returned by the query; each may be absent
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectStatus {
    pub extruder: Option<ExtruderStatus>,
    pub heater_bed: Option<HeaterBedStatus>,
    pub toolhead: Option<ToolheadStatus>,
    pub gcode_move: Option<GcodeMoveStatus>,
    pub virtual_sdcard: Option<VirtualSdcardStatus>,
    pub print_stats: Option<PrintStatsStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtruderStatus {
    pub temperature: Option<f64>,
    pub target: Option<f64>,
    pub can_extrude: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeaterBedStatus {
    pub temperature: Option<f64>,
    pub target: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolheadStatus {
    /// X, Y, Z, E
    pub position: Option<Vec<f64>>,
    pub homed_axes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GcodeMoveStatus {
    pub absolute_coordinates: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VirtualSdcardStatus {
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrintStatsStatus {
    pub filename: Option<String>,
    pub print_duration: Option<f64>,
    pub filament_used: Option<f64>,
    /// Job state: `standby`, `printing`, `paused`, `complete`, `cancelled` or `error`
    pub state: Option<String>,
}
