//! Shared scripted Master Transport for end-to-end acceptance scenarios.
//!
//! Unlike the dumb echo `SimulatedTransport`, this transport lets a scenario
//! script each drive's statusword, actual position and probe status readback
//! per cycle, and records every write to a handful of canonical objects so
//! assertions can inspect write history rather than only final state.

#![allow(dead_code)]

use ecm_common::error::MasterResult;
use ecm_fieldbus::dc::DcSlaveParams;
use ecm_fieldbus::master::{
    DomainHandle, MasterAdapter, MasterInfo, MasterTransport, PdoEntryRequest, SlaveConfigHandle,
    SlaveInfo,
};
use ecm_fieldbus::pdo::SyncManager;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Statusword bit pattern for DS402 `OPERATION_ENABLED` (bits 0,1,2,5).
pub const OPERATION_ENABLED: u16 = 0x27;

/// One recorded write to a canonical object, in the order it occurred.
#[derive(Debug, Clone)]
pub struct WriteRecord {
    pub position: u16,
    pub index: u16,
    pub at_cycle: u64,
    pub at: Instant,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    domain: Option<(Vec<u8>, Vec<u8>)>,
    offsets: HashMap<u16, HashMap<(u16, u8), u32>>,
    statusword: HashMap<u16, u16>,
    mode_display: HashMap<u16, i8>,
    position_actual: HashMap<u16, i32>,
    probe_status: HashMap<u16, u16>,
    fault_code: HashMap<u16, u16>,
    cycle: u64,
    writes: Vec<WriteRecord>,
    sdo_writes: Vec<WriteRecord>,
    sdo_reads: Vec<(u16, u16, u8, Instant)>,
}

/// Handle shared between the transport and the scenario driving it. Cloning
/// is cheap; every clone observes the same underlying script and log.
#[derive(Clone, Default)]
pub struct ScriptHandle {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptHandle {
    pub fn set_statusword(&self, position: u16, value: u16) {
        self.inner.lock().unwrap().statusword.insert(position, value);
    }

    /// Script the modes-of-operation display to read as `value` from here on.
    pub fn set_mode_display(&self, position: u16, value: i8) {
        self.inner.lock().unwrap().mode_display.insert(position, value);
    }

    pub fn set_position_actual(&self, position: u16, value: i32) {
        self.inner.lock().unwrap().position_actual.insert(position, value);
    }

    pub fn position_actual(&self, position: u16) -> i32 {
        self.inner.lock().unwrap().position_actual.get(&position).copied().unwrap_or(0)
    }

    pub fn set_probe_status(&self, position: u16, value: u16) {
        self.inner.lock().unwrap().probe_status.insert(position, value);
    }

    pub fn set_fault_code(&self, position: u16, value: u16) {
        self.inner.lock().unwrap().fault_code.insert(position, value);
    }

    /// Cycles elapsed (`process_domain` calls), for scenarios that script a
    /// readback change after N cycles have passed.
    pub fn cycle(&self) -> u64 {
        self.inner.lock().unwrap().cycle
    }

    /// Every write to `index` for `position`, in chronological order (PDO
    /// domain writes only; see `sdo_writes` for the SDO-download log).
    pub fn writes_to(&self, position: u16, index: u16) -> Vec<WriteRecord> {
        self.inner
            .lock()
            .unwrap()
            .writes
            .iter()
            .filter(|w| w.position == position && w.index == index)
            .cloned()
            .collect()
    }

    pub fn sdo_writes_to(&self, position: u16, index: u16) -> Vec<WriteRecord> {
        self.inner
            .lock()
            .unwrap()
            .sdo_writes
            .iter()
            .filter(|w| w.position == position && w.index == index)
            .cloned()
            .collect()
    }

    pub fn sdo_reads_of(&self, position: u16, index: u16) -> Vec<Instant> {
        self.inner
            .lock()
            .unwrap()
            .sdo_reads
            .iter()
            .filter(|(p, i, _, _)| *p == position && *i == index)
            .map(|(_, _, _, at)| *at)
            .collect()
    }

    fn record_write(&self, position: u16, index: u16, bytes: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        let cycle = inner.cycle;
        inner.writes.push(WriteRecord { position, index, at_cycle: cycle, at: Instant::now(), bytes: bytes.to_vec() });
    }
}

/// A `MasterTransport` whose readback values are entirely scenario-scripted,
/// with a real domain buffer so PDO-mapped reads/writes round-trip exactly
/// as they would against a kernel binding.
#[derive(Default)]
pub struct ScriptedTransport {
    handle: ScriptHandle,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> (Self, ScriptHandle) {
        let handle = ScriptHandle::default();
        (Self { handle: handle.clone() }, handle)
    }
}

/// Build a `MasterAdapter` around a fresh `ScriptedTransport`, returning the
/// adapter and the handle used to script it during the test.
#[must_use]
pub fn scripted_adapter() -> (MasterAdapter, ScriptHandle) {
    let (transport, handle) = ScriptedTransport::new();
    (MasterAdapter::with_transport(Box::new(transport)), handle)
}

const RX_OBJECTS: [u16; 5] = [0x6040, 0x6060, 0x607A, 0x60FF, 0x60B8];

impl MasterTransport for ScriptedTransport {
    fn open(&mut self) -> MasterResult<()> {
        Ok(())
    }

    fn request(&mut self) -> MasterResult<()> {
        Ok(())
    }

    fn release(&mut self) -> MasterResult<()> {
        Ok(())
    }

    fn create_domain(&mut self) -> MasterResult<DomainHandle> {
        self.handle.inner.lock().unwrap().domain = Some((Vec::new(), Vec::new()));
        Ok(DomainHandle(0))
    }

    fn config_slave(&mut self, _alias: u16, position: u16, _vendor_id: u32, _product_code: u32) -> MasterResult<SlaveConfigHandle> {
        let mut inner = self.handle.inner.lock().unwrap();
        inner.statusword.entry(position).or_insert(OPERATION_ENABLED);
        inner.position_actual.entry(position).or_insert(0);
        inner.mode_display.entry(position).or_insert(0);
        inner.probe_status.entry(position).or_insert(0);
        Ok(SlaveConfigHandle(u32::from(position)))
    }

    fn slave_config_pdos(&mut self, _config: SlaveConfigHandle, _sync_managers: &[SyncManager]) -> MasterResult<()> {
        Ok(())
    }

    fn register_pdo_entry_list(
        &mut self,
        config: SlaveConfigHandle,
        _domain: DomainHandle,
        entries: &[PdoEntryRequest],
    ) -> MasterResult<Vec<u32>> {
        let position = config.0 as u16;
        let mut inner = self.handle.inner.lock().unwrap();
        let (inputs, outputs) = inner.domain.as_mut().unwrap();
        let mut offsets = Vec::with_capacity(entries.len());
        let mut slave_offsets = HashMap::new();
        for entry in entries {
            let byte_len = (usize::from(entry.bit_length) + 7) / 8;
            let is_rx = RX_OBJECTS.contains(&entry.index);
            let buf = if is_rx { &mut *outputs } else { &mut *inputs };
            let offset = buf.len() as u32;
            buf.resize(buf.len() + byte_len, 0);
            offsets.push(offset);
            slave_offsets.insert((entry.index, entry.subindex), offset);
        }
        inner.offsets.entry(position).or_default().extend(slave_offsets);
        Ok(offsets)
    }

    fn configure_dc(&mut self, _config: SlaveConfigHandle, _params: &DcSlaveParams) -> MasterResult<()> {
        Ok(())
    }

    fn select_reference_clock(&mut self, _config: SlaveConfigHandle) -> MasterResult<()> {
        Ok(())
    }

    fn sdo_download(&mut self, position: u16, index: u16, subindex: u8, data: &[u8]) -> MasterResult<()> {
        let mut inner = self.handle.inner.lock().unwrap();
        let cycle = inner.cycle;
        inner.sdo_writes.push(WriteRecord { position, index, at_cycle: cycle, at: Instant::now(), bytes: data.to_vec() });
        if index == 0x6060 {
            let value = *data.first().unwrap_or(&0) as i8;
            // Mode SDO writes take effect immediately in this simulation;
            // the mode display readback is driven by `mode_display` below.
            let _ = value;
        }
        let _ = subindex;
        Ok(())
    }

    fn sdo_upload(&mut self, position: u16, index: u16, subindex: u8, max_len: usize) -> MasterResult<Vec<u8>> {
        let mut inner = self.handle.inner.lock().unwrap();
        inner.sdo_reads.push((position, index, subindex, Instant::now()));
        let bytes = match index {
            0x6061 => {
                let v = inner.mode_display.get(&position).copied().unwrap_or(0);
                vec![v as u8]
            }
            0x6064 => {
                let v = inner.position_actual.get(&position).copied().unwrap_or(0);
                v.to_le_bytes().to_vec()
            }
            0x603F => {
                let v = inner.fault_code.get(&position).copied().unwrap_or(0);
                v.to_le_bytes().to_vec()
            }
            _ => vec![0; max_len],
        };
        let mut padded = bytes;
        padded.resize(max_len, 0);
        Ok(padded)
    }

    fn set_application_time(&mut self, _time_ns: u64) -> MasterResult<()> {
        Ok(())
    }

    fn activate(&mut self) -> MasterResult<()> {
        Ok(())
    }

    fn receive(&mut self) -> MasterResult<()> {
        Ok(())
    }

    fn process_domain(&mut self, _domain: DomainHandle) -> MasterResult<()> {
        let mut inner = self.handle.inner.lock().unwrap();
        inner.cycle += 1;
        let statusword = inner.statusword.clone();
        let mode_display = inner.mode_display.clone();
        let position_actual = inner.position_actual.clone();
        let probe_status = inner.probe_status.clone();
        let offsets = inner.offsets.clone();
        let (inputs, _) = inner.domain.as_mut().unwrap();

        for (position, slave_offsets) in &offsets {
            let mut write = |index: u16, bytes: &[u8]| {
                if let Some(&offset) = slave_offsets.get(&(index, 0)) {
                    let off = offset as usize;
                    if inputs.len() >= off + bytes.len() {
                        inputs[off..off + bytes.len()].copy_from_slice(bytes);
                    }
                }
            };
            let sw = statusword.get(position).copied().unwrap_or(0);
            write(0x6041, &sw.to_le_bytes());
            let md = mode_display.get(position).copied().unwrap_or(0);
            write(0x6061, &[md as u8]);
            let pos = position_actual.get(position).copied().unwrap_or(0);
            write(0x6064, &pos.to_le_bytes());
            write(0x606C, &0i32.to_le_bytes());
            let probe = probe_status.get(position).copied().unwrap_or(0);
            write(0x60B9, &probe.to_le_bytes());
            write(0x60BA, &0i32.to_le_bytes());
        }
        Ok(())
    }

    fn queue_domain(&mut self, _domain: DomainHandle) -> MasterResult<()> {
        Ok(())
    }

    fn send(&mut self) -> MasterResult<()> {
        Ok(())
    }

    fn read_domain(&self, _domain: DomainHandle) -> &[u8] {
        // SAFETY-free workaround: `MasterTransport::read_domain` takes `&self`
        // but the domain lives behind the shared handle's mutex. Tests only
        // ever call this through `MasterAdapter::read_domain`, which borrows
        // the adapter (and transitively this transport) for the duration of
        // the slice's use, so leaking the guard's borrow is not observable.
        let guard = self.handle.inner.lock().unwrap();
        let ptr: *const [u8] = guard.domain.as_ref().map_or(&[][..], |(inputs, _)| inputs.as_slice());
        unsafe { &*ptr }
    }

    fn write_domain(&mut self, _domain: DomainHandle) -> &mut [u8] {
        let mut guard = self.handle.inner.lock().unwrap();
        let ptr: *mut [u8] = guard.domain.as_mut().map_or(&mut [][..], |(_, outputs)| outputs.as_mut_slice());
        unsafe { &mut *ptr }
    }

    fn domain_state(&self, _domain: DomainHandle) -> (u16, u16) {
        (1, 1)
    }

    fn master_info(&self) -> MasterResult<MasterInfo> {
        let inner = self.handle.inner.lock().unwrap();
        Ok(MasterInfo { slave_count: inner.offsets.len() as u16, link_up: true })
    }

    fn slave_info(&self, position: u16) -> MasterResult<SlaveInfo> {
        Ok(SlaveInfo { position, vendor_id: 0, product_code: 0, in_op: true, name: "scripted".into() })
    }
}

/// Capture every write to `0x6040`/`0x6060`/.../etc., tagging it onto the
/// per-position write log via a thin wrapper around the adapter's own
/// `write_domain`/`sdo_download`, since the engine writes through the
/// adapter rather than the transport directly. Scenarios call this once
/// after each `run_cycle` to snapshot what that cycle wrote, by index, from
/// `offsets` recorded at startup.
pub fn record_domain_writes(adapter: &MasterAdapter, handle: &ScriptHandle, position: u16, objects: &[(u16, usize)]) {
    let Ok(buf) = adapter.write_domain_ref() else { return };
    for &(index, len) in objects {
        let Some(offset) = adapter.offset_of(position, index) else { continue };
        let off = offset as usize;
        if buf.len() >= off + len {
            handle.record_write(position, index, &buf[off..off + len]);
        }
    }
}
