//! Status snapshots published by the Cyclic Engine and consumed by the
//! Drive Handle (and any other non-real-time reader).

use crate::error::LastFailureKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Health of a canonical PDO object for one drive, as observed at the last
/// offset-map lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdoHealth {
    /// The object is mapped in PDO at a known offset.
    Mapped,
    /// The object is not present in the offset map; SDO fallback is used.
    Missing,
    /// The object was expected to be mapped but a wire read/write failed.
    Error,
}

/// Immutable per-drive status, as of the end of some cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveStatus {
    /// Bus position of this drive.
    pub position: u16,
    /// Raw statusword (0x6041).
    pub statusword: u16,
    /// Modes-of-operation display (0x6061).
    pub mode_display: i8,
    /// Actual position (0x6064), in user units.
    pub position_actual: f64,
    /// Actual velocity (0x606C), in user units/s.
    pub velocity_actual: f64,
    /// Whether the touch probe is currently armed/active (0x60B9 bit 0/4).
    pub probe_active: bool,
    /// Latched positive-edge capture position (0x60BA), user units, if valid.
    pub probe_positive_edge: Option<f64>,
    /// Latched negative-edge capture position (0x60BB/0x60BC), user units, if valid.
    pub probe_negative_edge: Option<f64>,
    /// Raw digital inputs word.
    pub digital_inputs: u32,
    /// Drive-reported fault code, if the drive is currently in FAULT.
    pub fault_code: Option<u16>,
    /// Whether the active mode intent has been verified against 0x6061.
    pub mode_verified: bool,
    /// Most recent per-drive failure kind recorded by the engine.
    pub last_failure: LastFailureKind,
    /// PDO-presence health for the canonical objects this drive maintains.
    pub pdo_health: Vec<(u16, PdoHealth)>,
}

/// Immutable network-wide status snapshot, offered on the status queue with
/// latest-wins semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatus {
    /// Monotonic timestamp, nanoseconds since an arbitrary epoch.
    pub timestamp_ns: u64,
    /// Configured cycle time, echoed for consumers that did not load the config.
    pub cycle_period: Duration,
    /// Whether the network is running in SDO-only mode.
    pub sdo_only: bool,
    /// Per-drive status records, in configured drive order.
    pub drives: Vec<DriveStatus>,
}

impl NetworkStatus {
    /// Find the status record for a given bus position, if present.
    #[must_use]
    pub fn drive(&self, position: u16) -> Option<&DriveStatus> {
        self.drives.iter().find(|d| d.position == position)
    }
}
