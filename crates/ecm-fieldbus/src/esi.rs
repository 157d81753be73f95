//! Contract for the ESI Decoder collaborator.
//!
//! Parsing vendor ESI (EtherCAT Slave Information) XML files is out of scope
//! for this crate; the Master Adapter only needs the handful of facts an ESI
//! decoder would hand it before configuration starts. [`EsiDecoder`] states
//! that contract so a real decoder can be substituted without touching the
//! adapter, and [`StaticEsiDecoder`] gives configuration-driven drives (no
//! ESI file available) a trivial implementation.

use ecm_common::config::DriveConfig;

/// What the Master Adapter needs to know about a drive before mapping PDOs
/// and configuring DC, as an ESI decoder would supply it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EsiFacts {
    /// Whether the drive's ESC supports Distributed Clocks at all.
    pub dc_capable: bool,
    /// The CoE object index used for touch-probe negative-edge capture,
    /// when the ESI vendor-specific section disagrees with the configured
    /// default (0x60BB vs 0x60BC across vendors).
    pub probe_negative_edge_index: u16,
}

/// Supplies [`EsiFacts`] for a drive, given its position and configuration.
///
/// A real implementation would parse the vendor's ESI XML (referenced by
/// [`DriveConfig::esi_path`](ecm_common::config::DriveConfig::esi_path)); that
/// parser lives outside this crate.
pub trait EsiDecoder: Send {
    /// Resolve the facts needed to configure one drive.
    fn facts(&self, drive: &DriveConfig) -> EsiFacts;
}

/// Decoder that never reads an ESI file: it assumes DC capability and takes
/// the negative-edge object index straight from configuration.
///
/// This is the only decoder this crate ships; it is the correct choice
/// whenever `esi_path` is unset, and a reasonable fallback otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticEsiDecoder;

impl EsiDecoder for StaticEsiDecoder {
    fn facts(&self, drive: &DriveConfig) -> EsiFacts {
        EsiFacts {
            dc_capable: true,
            probe_negative_edge_index: drive.probe_negative_edge_index,
        }
    }
}
