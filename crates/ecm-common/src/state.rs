//! CiA 402 power-state machine, walked one edge per cycle by the engine.
//!
//! Transitions follow the profile's state diagram:
//! FAULT -> SWITCH_ON_DISABLED -> READY_TO_SWITCH_ON -> SWITCHED_ON -> OPERATION_ENABLED
//!
//! Unlike a blocking client, the engine never waits inside a transition: each
//! call to `step` inspects the drive's statusword and advances at most one
//! edge, pacing itself by the configured enable-transition period.

use serde::{Deserialize, Serialize};
use std::fmt;

/// CiA 402 power-state machine states (DS402 state diagram, §3.1 naming).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PowerState {
    /// Drive reports a fault; awaiting fault-reset edge.
    #[default]
    Fault,
    /// Power stage disabled, no fault.
    SwitchOnDisabled,
    /// Ready to switch on main contactor.
    ReadyToSwitchOn,
    /// Main contactor closed, power stage still disabled.
    SwitchedOn,
    /// Power stage enabled; drive follows setpoints.
    OperationEnabled,
    /// Transient quick-stop state (not normally commanded by this engine).
    QuickStopActive,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fault => write!(f, "FAULT"),
            Self::SwitchOnDisabled => write!(f, "SWITCH_ON_DISABLED"),
            Self::ReadyToSwitchOn => write!(f, "READY_TO_SWITCH_ON"),
            Self::SwitchedOn => write!(f, "SWITCHED_ON"),
            Self::OperationEnabled => write!(f, "OPERATION_ENABLED"),
            Self::QuickStopActive => write!(f, "QUICK_STOP_ACTIVE"),
        }
    }
}

/// Statusword bit masks relevant to the power-state machine (DS402 §6041h).
pub mod statusword_bits {
    /// Bit 0: ready to switch on.
    pub const READY_TO_SWITCH_ON: u16 = 1 << 0;
    /// Bit 1: switched on.
    pub const SWITCHED_ON: u16 = 1 << 1;
    /// Bit 2: operation enabled.
    pub const OPERATION_ENABLED: u16 = 1 << 2;
    /// Bit 3: fault.
    pub const FAULT: u16 = 1 << 3;
    /// Bit 5: quick stop (active low: 0 means quick stop active).
    pub const QUICK_STOP: u16 = 1 << 5;
    /// Bit 6: switch on disabled.
    pub const SWITCH_ON_DISABLED: u16 = 1 << 6;
    /// Bit 12: vendor-default set-point-acknowledged bit for PP moves.
    pub const PP_SET_POINT_ACK_DEFAULT: u16 = 1 << 12;
}

/// Controlword edges used to walk the power-state machine (DS402 §6040h).
pub mod controlword {
    /// Shutdown: SWITCH_ON_DISABLED -> READY_TO_SWITCH_ON.
    pub const SHUTDOWN: u16 = 0x0006;
    /// Switch on: READY_TO_SWITCH_ON -> SWITCHED_ON.
    pub const SWITCH_ON: u16 = 0x0007;
    /// Enable operation: SWITCHED_ON -> OPERATION_ENABLED.
    pub const ENABLE_OPERATION: u16 = 0x000F;
    /// Fault reset edge (bit 7, rising).
    pub const FAULT_RESET: u16 = 0x0080;
    /// New set-point bit (bit 4) used by Profile Position mode.
    pub const NEW_SET_POINT: u16 = 1 << 4;
    /// Halt bit (bit 8).
    pub const HALT: u16 = 1 << 8;
}

impl PowerState {
    /// Decode the power state from a raw statusword value.
    ///
    /// Follows the DS402 decision tree on bits 0,1,2,3,5,6 in that priority
    /// order (fault dominates, then the mutually exclusive enabled states).
    #[must_use]
    pub fn from_statusword(sw: u16) -> Self {
        use statusword_bits::{
            FAULT, OPERATION_ENABLED, QUICK_STOP, READY_TO_SWITCH_ON, SWITCHED_ON,
            SWITCH_ON_DISABLED,
        };

        if sw & FAULT != 0 {
            return Self::Fault;
        }
        if sw & SWITCH_ON_DISABLED != 0 {
            return Self::SwitchOnDisabled;
        }
        let ready = sw & READY_TO_SWITCH_ON != 0;
        let on = sw & SWITCHED_ON != 0;
        let enabled = sw & OPERATION_ENABLED != 0;
        let quick_stop = sw & QUICK_STOP != 0;

        match (ready, on, enabled, quick_stop) {
            (true, false, false, _) => Self::ReadyToSwitchOn,
            (true, true, false, true) => Self::SwitchedOn,
            (true, true, false, false) => Self::QuickStopActive,
            (true, true, true, true) => Self::OperationEnabled,
            (true, true, true, false) => Self::QuickStopActive,
            _ => Self::SwitchOnDisabled,
        }
    }

    /// The controlword edge that advances one step toward `OPERATION_ENABLED`,
    /// or `None` if already there (or in a state this engine does not drive,
    /// e.g. a fault awaiting external reset).
    #[must_use]
    pub fn next_edge(self) -> Option<u16> {
        match self {
            Self::Fault | Self::QuickStopActive => None,
            Self::SwitchOnDisabled => Some(controlword::SHUTDOWN),
            Self::ReadyToSwitchOn => Some(controlword::SWITCH_ON),
            Self::SwitchedOn => Some(controlword::ENABLE_OPERATION),
            Self::OperationEnabled => None,
        }
    }

    /// True once the drive is ready to accept motion setpoints.
    #[must_use]
    pub fn is_operation_enabled(self) -> bool {
        matches!(self, Self::OperationEnabled)
    }
}

/// Tracks the power-state walk for one drive, pacing transitions by the
/// configured enable-transition period so drives that need settle time are
/// not overrun with back-to-back controlword edges.
#[derive(Debug, Clone)]
pub struct PowerStateTracker {
    last_seen: PowerState,
    last_edge_at: Option<std::time::Instant>,
    pacing: std::time::Duration,
}

impl PowerStateTracker {
    /// Create a tracker pacing edges by `pacing` (the configured
    /// enable-transition period, default 100 ms).
    #[must_use]
    pub fn new(pacing: std::time::Duration) -> Self {
        Self {
            last_seen: PowerState::Fault,
            last_edge_at: None,
            pacing,
        }
    }

    /// Inspect the current statusword and, if enough time has elapsed since
    /// the last edge, return the controlword edge to issue this cycle.
    pub fn step(&mut self, statusword: u16, now: std::time::Instant) -> Option<u16> {
        self.last_seen = PowerState::from_statusword(statusword);

        let ready = self
            .last_edge_at
            .map_or(true, |t| now.duration_since(t) >= self.pacing);
        if !ready {
            return None;
        }

        let edge = self.last_seen.next_edge()?;
        self.last_edge_at = Some(now);
        Some(edge)
    }

    /// Current decoded power state.
    #[must_use]
    pub fn state(&self) -> PowerState {
        self.last_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn decodes_switch_on_disabled() {
        let sw = statusword_bits::SWITCH_ON_DISABLED;
        assert_eq!(PowerState::from_statusword(sw), PowerState::SwitchOnDisabled);
    }

    #[test]
    fn decodes_operation_enabled() {
        let sw = statusword_bits::READY_TO_SWITCH_ON
            | statusword_bits::SWITCHED_ON
            | statusword_bits::OPERATION_ENABLED
            | statusword_bits::QUICK_STOP;
        assert_eq!(PowerState::from_statusword(sw), PowerState::OperationEnabled);
    }

    #[test]
    fn decodes_fault_regardless_of_other_bits() {
        let sw = statusword_bits::FAULT | statusword_bits::OPERATION_ENABLED;
        assert_eq!(PowerState::from_statusword(sw), PowerState::Fault);
    }

    #[test]
    fn walks_one_edge_per_cycle_paced() {
        let mut tracker = PowerStateTracker::new(Duration::from_millis(100));
        let t0 = std::time::Instant::now();

        // SWITCH_ON_DISABLED -> edge SHUTDOWN issued immediately (no prior edge).
        let edge = tracker.step(statusword_bits::SWITCH_ON_DISABLED, t0);
        assert_eq!(edge, Some(controlword::SHUTDOWN));

        // Immediately after, still within pacing window: no edge even if
        // statusword already reflects READY_TO_SWITCH_ON.
        let edge2 = tracker.step(statusword_bits::READY_TO_SWITCH_ON, t0);
        assert_eq!(edge2, None);

        // After the pacing interval elapses, the next edge is issued.
        let t1 = t0 + Duration::from_millis(101);
        let edge3 = tracker.step(statusword_bits::READY_TO_SWITCH_ON, t1);
        assert_eq!(edge3, Some(controlword::SWITCH_ON));
    }

    #[test]
    fn operation_enabled_yields_no_further_edge() {
        let mut tracker = PowerStateTracker::new(Duration::from_millis(0));
        let sw = statusword_bits::READY_TO_SWITCH_ON
            | statusword_bits::SWITCHED_ON
            | statusword_bits::OPERATION_ENABLED
            | statusword_bits::QUICK_STOP;
        assert_eq!(tracker.step(sw, std::time::Instant::now()), None);
        assert!(tracker.state().is_operation_enabled());
    }
}
