//! PDO entry descriptions and the offset map built from them.
//!
//! The Master Adapter registers each drive's canonical CiA 402 objects (plus
//! any [`PdoOverrides`] from configuration) against the master, which returns
//! a byte offset into the domain buffer for every entry. [`PdoOffsetMap`]
//! remembers those offsets so the Cyclic Engine can read/write the domain
//! buffer directly without re-resolving index:subindex pairs every cycle.

use ecm_common::config::PdoOverrides;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One object to be mapped into a slave's PDO, with its domain-relative
/// length in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdoEntry {
    /// CoE object index.
    pub index: u16,
    /// CoE object subindex.
    pub subindex: u8,
    /// Bit length of this entry.
    pub bit_length: u16,
}

impl PdoEntry {
    /// Create a new PDO entry request.
    #[must_use]
    pub fn new(index: u16, subindex: u8, bit_length: u16) -> Self {
        Self {
            index,
            subindex,
            bit_length,
        }
    }
}

/// A Sync Manager's PDO assignment, built from the slave's `PdoOverrides` (or
/// the canonical CiA 402 default if none were configured).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncManager {
    /// PDO index assigned to this sync manager (e.g. 0x1600 RxPDO, 0x1A00 TxPDO).
    pub pdo_index: u16,
    /// Whether this sync manager carries master->slave (Rx) or slave->master (Tx) data.
    pub is_output: bool,
    /// Entries mapped into this PDO, in wire order.
    pub entries: Vec<PdoEntry>,
}

impl SyncManager {
    /// Total byte length of this sync manager's mapped entries.
    #[must_use]
    pub fn byte_length(&self) -> usize {
        let bits: u32 = self.entries.iter().map(|e| u32::from(e.bit_length)).sum();
        ((bits + 7) / 8) as usize
    }
}

/// The canonical CiA 402 RxPDO (master -> slave) objects this engine drives.
///
/// Controlword and target values are always present; the touch-probe
/// function word is included so probe arm/disarm commands ride the normal
/// cyclic exchange rather than falling back to SDO.
#[must_use]
pub fn default_rx_entries() -> Vec<PdoEntry> {
    vec![
        PdoEntry::new(0x6040, 0, 16), // controlword
        PdoEntry::new(0x6060, 0, 8),  // modes of operation
        PdoEntry::new(0x607A, 0, 32), // target position
        PdoEntry::new(0x60FF, 0, 32), // target velocity
        PdoEntry::new(0x60B8, 0, 16), // touch probe function
    ]
}

/// The canonical CiA 402 TxPDO (slave -> master) objects this engine reads.
#[must_use]
pub fn default_tx_entries(negative_edge_index: u16) -> Vec<PdoEntry> {
    vec![
        PdoEntry::new(0x6041, 0, 16),          // statusword
        PdoEntry::new(0x6061, 0, 8),           // modes of operation display
        PdoEntry::new(0x6064, 0, 32),          // position actual value
        PdoEntry::new(0x606C, 0, 32),          // velocity actual value
        PdoEntry::new(0x60B9, 0, 16),          // touch probe status
        PdoEntry::new(0x60BA, 0, 32),          // touch probe 1 positive edge
        PdoEntry::new(negative_edge_index, 0, 32), // touch probe 1 negative edge (0x60BB or 0x60BC)
        PdoEntry::new(0x60FD, 0, 32),           // digital inputs
    ]
}

/// Build the RxPDO/TxPDO sync manager assignment for one drive, applying any
/// `PdoOverrides` from configuration over the canonical default.
#[must_use]
pub fn build_sync_managers(
    overrides: Option<&PdoOverrides>,
    negative_edge_index: u16,
) -> Vec<SyncManager> {
    let rx_index = overrides.and_then(|o| o.rx_pdo_index).unwrap_or(0x1600);
    let tx_index = overrides.and_then(|o| o.tx_pdo_index).unwrap_or(0x1A00);

    let to_entries = |tuples: &[(u16, u8, u8)]| -> Vec<PdoEntry> {
        tuples
            .iter()
            .map(|&(index, subindex, bit_length)| PdoEntry::new(index, subindex, u16::from(bit_length)))
            .collect()
    };

    let rx_entries = overrides
        .filter(|o| !o.entries.is_empty())
        .map(|o| to_entries(&o.entries))
        .unwrap_or_else(default_rx_entries);

    let tx_entries = overrides
        .filter(|o| !o.tx_entries.is_empty())
        .map(|o| to_entries(&o.tx_entries))
        .unwrap_or_else(|| default_tx_entries(negative_edge_index));

    vec![
        SyncManager {
            pdo_index: rx_index,
            is_output: true,
            entries: rx_entries,
        },
        SyncManager {
            pdo_index: tx_index,
            is_output: false,
            entries: tx_entries,
        },
    ]
}

/// Maps `(index, subindex)` CoE addresses to byte offsets in the domain
/// buffer, per slave position.
///
/// Built once during the startup sequence from the offsets the master
/// returns for each registered PDO entry; consulted every cycle by the
/// engine and never mutated again except across a full re-scan.
#[derive(Debug, Clone, Default)]
pub struct PdoOffsetMap {
    offsets: HashMap<(u16, u16, u8), u32>,
}

impl PdoOffsetMap {
    /// Create an empty offset map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the offset assigned to one drive's object.
    pub fn insert(&mut self, position: u16, index: u16, subindex: u8, offset: u32) {
        self.offsets.insert((position, index, subindex), offset);
    }

    /// Look up the domain-buffer offset for a drive's object, if it was
    /// mapped into PDO at startup.
    #[must_use]
    pub fn offset(&self, position: u16, index: u16, subindex: u8) -> Option<u32> {
        self.offsets.get(&(position, index, subindex)).copied()
    }

    /// Whether the given object is mapped for this drive.
    #[must_use]
    pub fn is_mapped(&self, position: u16, index: u16, subindex: u8) -> bool {
        self.offsets.contains_key(&(position, index, subindex))
    }
}
