#![doc = "Master Adapter crate: the narrow, memory-exact wrapper over the EtherCAT kernel library.\n\nExposes [`master::MasterAdapter`] (master lifecycle, domain/PDO registration, SDO access, DC\nreference-clock selection), the PDO entry/offset-map types in [`pdo`], distributed-clock\nselection in [`dc`], and the ESI Decoder collaborator contract in [`esi`]. The real kernel\nbinding and an in-process simulation share one [`master::MasterTransport`] surface so the\nCyclic Engine and its tests never depend on which backend is wired in."]
pub mod dc;
pub mod esi;
pub mod master;
pub mod pdo;

pub use dc::{DcController, DcSlaveParams};
pub use esi::{EsiDecoder, EsiFacts, StaticEsiDecoder};
pub use master::{MasterAdapter, MasterTransport, SimulatedTransport};
pub use pdo::{PdoEntry, PdoOffsetMap, SyncManager};
