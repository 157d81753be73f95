//! Command records sent from the Drive Handle to the Cyclic Engine.
//!
//! Commands are applied in enqueue order, within the per-cycle drain budget;
//! the engine never blocks waiting for one.

use serde::{Deserialize, Serialize};

/// Which edge of a touch-probe capture to arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeEdge {
    /// Positive-edge single-shot (0x0011).
    Positive,
    /// Negative-edge single-shot (0x0021).
    Negative,
    /// Both edges (0x0031).
    Both,
}

impl ProbeEdge {
    /// Raw 0x60B8 function value for this edge selection.
    #[must_use]
    pub fn function_value(self) -> u16 {
        match self {
            Self::Positive => 0x0011,
            Self::Negative => 0x0021,
            Self::Both => 0x0031,
        }
    }
}

/// A command targeting one drive, tagged by kind.
///
/// The wire transport serialises this as an opaque byte frame across the
/// process boundary; in-process deployments pass it directly through the
/// bounded command channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Bus position of the target drive.
    pub drive: u16,
    /// The command payload.
    pub kind: CommandKind,
}

/// Tagged command payloads, one variant per Drive Handle call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CommandKind {
    /// Switch the drive to Profile Velocity mode.
    SetVelocityMode,
    /// Switch the drive to Profile Position mode.
    SetPositionMode,
    /// Switch the drive to Cyclic Synchronous Position mode.
    SetCspMode,
    /// Switch the drive to Homing mode.
    SetHomingMode,
    /// Set the velocity intent, in user units.
    SetVelocity(f64),
    /// Set the position intent, in user units, for Profile Position mode.
    SetPositionAbsolute(f64),
    /// Set the position intent, in user units, for Cyclic Synchronous Position mode.
    SetPositionCsp(f64),
    /// Arm the touch probe for the given edge.
    ArmProbe(ProbeEdge),
    /// Disable the touch probe (write 0x0000 to 0x60B8 and clear the intent).
    DisableProbe,
    /// Request a CiA 402 fault-reset edge on the next cycle.
    ClearFault,
    /// Start the configured homing sequence.
    StartHoming,
}
