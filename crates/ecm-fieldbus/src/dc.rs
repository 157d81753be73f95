//! Distributed Clocks reference-clock selection.
//!
//! The first DC-capable slave in bus-position order becomes the reference
//! clock; `assign_activate` register values follow the ETG.1020 convention
//! (0x0000 = DC off, 0x0300 = Sync0 only, 0x0700 = Sync0 + Sync1).

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// `assign_activate` register values recognised by this engine.
pub mod assign_activate {
    /// DC disabled for this slave.
    pub const DISABLED: u16 = 0x0000;
    /// Sync0 only.
    pub const SYNC0: u16 = 0x0300;
    /// Sync0 and Sync1.
    pub const SYNC0_SYNC1: u16 = 0x0700;
}

/// DC parameters for one slave, taken from [`ecm_common::config::DcConfig`]
/// once the slave's position is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcSlaveParams {
    /// Bus position.
    pub position: u16,
    /// `assign_activate` register value.
    pub assign_activate: u16,
    /// Sync0 cycle time, nanoseconds.
    pub sync0_cycle_ns: u32,
    /// Sync0 shift time, nanoseconds.
    pub sync0_shift_ns: i32,
    /// Sync1 cycle time, nanoseconds (only meaningful under `SYNC0_SYNC1`).
    pub sync1_cycle_ns: u32,
    /// Sync1 shift time, nanoseconds.
    pub sync1_shift_ns: i32,
}

impl DcSlaveParams {
    /// Whether this slave asked for DC at all.
    #[must_use]
    pub fn dc_enabled(&self) -> bool {
        self.assign_activate != assign_activate::DISABLED
    }
}

/// Selects and tracks the reference clock for the network.
///
/// Only one slave drives `set_application_time`/DC propagation; every other
/// DC-capable slave just gets `configure_dc` with its own sync parameters.
#[derive(Debug, Default)]
pub struct DcController {
    reference: Option<u16>,
}

impl DcController {
    /// Create an empty controller.
    #[must_use]
    pub fn new() -> Self {
        Self { reference: None }
    }

    /// Offer a slave's DC parameters; the first DC-enabled slave observed (in
    /// call order, which the caller must drive in ascending bus position) is
    /// latched as the reference clock.
    pub fn offer(&mut self, params: &DcSlaveParams) {
        if !params.dc_enabled() {
            return;
        }
        if self.reference.is_none() {
            self.reference = Some(params.position);
            info!(position = params.position, "selected DC reference clock");
        } else {
            debug!(position = params.position, "DC slave, not reference");
        }
    }

    /// The selected reference clock's bus position, if any DC-enabled slave
    /// was offered.
    #[must_use]
    pub fn reference_clock(&self) -> Option<u16> {
        self.reference
    }

    /// Whether a given position is the reference clock.
    #[must_use]
    pub fn is_reference(&self, position: u16) -> bool {
        self.reference == Some(position)
    }

    /// Reset before a fresh topology scan.
    pub fn clear(&mut self) {
        if self.reference.take().is_some() {
            warn!("DC reference clock cleared for re-scan");
        }
    }
}
