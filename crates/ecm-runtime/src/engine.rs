//! The Cyclic Engine: the fixed-period loop that drives the EtherCAT PDO
//! exchange and every drive's CiA 402 state machine.
//!
//! [`CyclicEngine::startup`] runs the one-time configuration sequence
//! (slave config, PDO mapping, DC, activation, OP verification). Once
//! started, [`CyclicEngine::run_cycle`] is called once per period by the
//! Process Supervisor's worker: it never blocks on anything but the bus
//! itself and the pacing sleep at the very end, so a slow command producer
//! or a stalled drive never holds up the rest of the network.

use crate::fault_recorder::{DriveSnapshot, FaultRecorder};
use crate::intent::{DriveIntent, ProbeTransition};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use ecm_common::config::{DriveConfig, NetworkConfig};
use ecm_common::error::{EngineError, EngineResult, MasterError};
use ecm_common::metrics::CycleMetrics;
use ecm_common::state::PowerState;
use ecm_common::status::{DriveStatus, NetworkStatus, PdoHealth};
use ecm_common::{Command, LastFailureKind};
use ecm_fieldbus::dc::{DcController, DcSlaveParams};
use ecm_fieldbus::esi::EsiDecoder;
use ecm_fieldbus::master::{MasterAdapter, PdoEntryRequest};
use ecm_fieldbus::pdo::{build_sync_managers, PdoOffsetMap};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Canonical objects every drive is expected to expose, used both for PDO
/// registration and for the per-drive health snapshot published in status.
fn canonical_objects(negative_edge_index: u16) -> [u16; 11] {
    [
        0x6040, 0x6041, 0x6060, 0x6061, 0x607A, 0x60FF, 0x60B8, 0x60B9, 0x60BA, negative_edge_index, 0x60FD,
    ]
}

/// What one `run_cycle` call did, for the supervisor's own metrics/logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Cycle sequence number, starting at 1.
    pub cycle: u64,
    /// Wall-clock time spent inside this call, excluding the pacing sleep.
    pub execution_time: Duration,
    /// Whether `execution_time` exceeded the configured cycle period.
    pub overrun: bool,
    /// Whether a status snapshot was published this cycle.
    pub status_published: bool,
}

/// Bounded, latest-wins status channel. The engine is the sole producer;
/// consumers (the Drive Handle, diagnostics) hold their own receiver clone.
/// `crossbeam_channel` has no built-in "force send", so the drop-oldest
/// policy is implemented here: when the queue is full, the oldest entry is
/// popped before the new one is pushed.
pub struct StatusPublisher {
    tx: Sender<NetworkStatus>,
    rx: Receiver<NetworkStatus>,
}

impl StatusPublisher {
    /// Create a bounded status channel of the given capacity, returning the
    /// publisher (for the engine) and a receiver for the first reader.
    /// Further reader clones can be made from the returned receiver.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, Receiver<NetworkStatus>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (Self { tx: tx.clone(), rx: rx.clone() }, rx)
    }

    /// Publish a snapshot, dropping the oldest entry if the queue is full.
    ///
    /// Exposed beyond the engine so a child-process worker's forwarding
    /// thread can inject status frames read from the wire with the same
    /// drop-oldest policy the in-process engine uses.
    pub fn publish(&self, status: NetworkStatus) {
        if self.tx.try_send(status.clone()).is_err() {
            let _ = self.rx.try_recv();
            let _ = self.tx.try_send(status);
        }
    }
}

/// Tracks the last SDO-written bytes and timestamp for one object not mapped
/// in PDO: write immediately on change, otherwise keep-alive once per
/// `sdo_fallback_interval`.
#[derive(Default)]
struct SdoPacer {
    last: HashMap<(u16, u16, u8), (Instant, Vec<u8>)>,
}

impl SdoPacer {
    fn due(&mut self, key: (u16, u16, u8), bytes: &[u8], now: Instant, interval: Duration) -> bool {
        match self.last.get(&key) {
            Some((at, prev)) => prev.as_slice() != bytes || now.duration_since(*at) >= interval,
            None => true,
        }
    }

    fn record(&mut self, key: (u16, u16, u8), bytes: Vec<u8>, now: Instant) {
        self.last.insert(key, (now, bytes));
    }
}

/// The Cyclic Engine. One instance owns the master, the per-drive intents,
/// and every piece of bookkeeping the per-cycle sequence needs.
pub struct CyclicEngine {
    config: NetworkConfig,
    adapter: MasterAdapter,
    offsets: PdoOffsetMap,
    intents: Vec<DriveIntent>,
    current: Vec<DriveStatus>,
    cycle: u64,
    start: Instant,
    last_status_publish: Option<Instant>,
    next_deadline: Option<Instant>,
    metrics: CycleMetrics,
    fault_recorder: FaultRecorder,
    fault_recorded: bool,
    sdo_writes: SdoPacer,
    watchdog: Option<crate::watchdog::Watchdog>,
}

impl CyclicEngine {
    /// Run the one-time startup sequence: configure every drive, map PDOs,
    /// configure DC, activate the bus and verify OP, then build the initial
    /// per-drive intents.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RequiredPdoMissing`] if `sdo_only` is false and
    /// a drive's controlword or statusword is not mapped in PDO, and
    /// [`EngineError::SlaveNeverReachedOp`] if a slave never reports OP
    /// within `op_timeout`. Any Master Adapter failure is surfaced via
    /// [`EngineError::Master`].
    pub fn startup(
        config: NetworkConfig,
        mut adapter: MasterAdapter,
        decoder: &dyn EsiDecoder,
    ) -> EngineResult<Self> {
        adapter.open()?;
        if let Err(err) = adapter.request() {
            if config.preflight.enabled {
                warn!(error = %err, "master request failed, retrying once after preflight delay");
                std::thread::sleep(config.preflight.release_delay);
                adapter.request()?;
            } else {
                return Err(err.into());
            }
        }

        adapter.create_domain()?;
        let mut offsets = PdoOffsetMap::new();
        let mut dc = DcController::new();

        for drive in &config.drives {
            adapter.config_slave(drive.alias, drive.position, drive.vendor_id, drive.product_code)?;

            let facts = decoder.facts(drive);
            let sync_managers = build_sync_managers(drive.pdo_overrides.as_ref(), drive.probe_negative_edge_index);
            adapter.slave_config_pdos(drive.position, &sync_managers)?;

            let entries: Vec<PdoEntryRequest> = sync_managers
                .iter()
                .flat_map(|sm| sm.entries.iter())
                .map(|e| PdoEntryRequest {
                    index: e.index,
                    subindex: e.subindex,
                    bit_length: e.bit_length,
                })
                .collect();
            adapter.register_pdo_entry_list(drive.position, &entries, &mut offsets)?;

            let dc_params = DcSlaveParams {
                position: drive.position,
                assign_activate: if drive.dc.enabled { drive.dc.assign_activate } else { 0x0000 },
                sync0_cycle_ns: drive.dc.sync0_cycle.unwrap_or(config.cycle_period).as_nanos() as u32,
                sync0_shift_ns: drive.dc.sync0_shift.as_nanos() as i32,
                sync1_cycle_ns: drive.dc.sync1_cycle.map(|d| d.as_nanos() as u32).unwrap_or(0),
                sync1_shift_ns: drive.dc.sync1_shift.as_nanos() as i32,
            };
            if facts.dc_capable && dc_params.dc_enabled() {
                adapter.configure_dc(drive.position, &dc_params)?;
            }
            dc.offer(&dc_params);

            // Polarity (0x607E) is PREOP-only on some firmware; write it here,
            // before activate(), while the bus is still guaranteed PREOP.
            if let Err(err) = adapter.sdo_download(drive.position, 0x607E, 0, &drive.polarity.to_le_bytes()) {
                warn!(position = drive.position, error = %err, "PREOP polarity write rejected");
                return Err(EngineError::PreopWriteRejected { index: 0x607E, position: drive.position });
            }
        }

        if !config.sdo_only {
            for drive in &config.drives {
                if !offsets.is_mapped(drive.position, 0x6040, 0) {
                    return Err(EngineError::RequiredPdoMissing { index: 0x6040, position: drive.position });
                }
                if !offsets.is_mapped(drive.position, 0x6041, 0) {
                    return Err(EngineError::RequiredPdoMissing { index: 0x6041, position: drive.position });
                }
            }
        }

        if let Some(reference) = dc.reference_clock() {
            adapter.select_reference_clock(reference)?;
        }

        adapter.set_application_time(0)?;
        adapter.activate()?;

        let deadline = Instant::now() + config.op_timeout;
        loop {
            let mut offender = None;
            for drive in &config.drives {
                let info = adapter.slave_info(drive.position)?;
                if !info.in_op {
                    offender = Some(drive.position);
                    break;
                }
            }
            match offender {
                None => break,
                Some(position) if Instant::now() >= deadline => {
                    return Err(EngineError::SlaveNeverReachedOp { position });
                }
                Some(_) => std::thread::sleep(Duration::from_secs(1)),
            }
        }

        let intents = config
            .drives
            .iter()
            .map(|d| DriveIntent::new(d.position, config.enable_transition_period))
            .collect();
        let current = config.drives.iter().map(|d| empty_status(d, &offsets)).collect();

        info!(drives = config.drives.len(), "cyclic engine started, bus at OP");

        Ok(Self {
            metrics: CycleMetrics::new(config.metrics.histogram_size, config.cycle_period),
            fault_recorder: FaultRecorder::with_default_capacity(),
            fault_recorded: false,
            sdo_writes: SdoPacer::default(),
            watchdog: None,
            config,
            adapter,
            offsets,
            intents,
            current,
            cycle: 0,
            start: Instant::now(),
            last_status_publish: None,
            next_deadline: None,
        })
    }

    /// Attach a watchdog to be kicked once per cycle. The supervisor owns its
    /// lifetime (start/stop); the engine only calls `kick`.
    pub fn set_watchdog(&mut self, watchdog: crate::watchdog::Watchdog) {
        self.watchdog = Some(watchdog);
    }

    /// Run one cycle: drain commands, exchange process data, apply every
    /// drive's intent, publish status if due, then sleep to the next
    /// deadline. Per-drive errors are recorded in status and do not abort
    /// the cycle for the remaining drives.
    ///
    /// # Errors
    ///
    /// Only master-wide failures (receive/process_domain/queue_domain/send)
    /// propagate; a single drive's wire failure is caught and recorded.
    pub fn run_cycle(&mut self, commands: &Receiver<Command>, status: &StatusPublisher) -> EngineResult<CycleOutcome> {
        let cycle_start = Instant::now();
        self.cycle += 1;

        if let Some(watchdog) = &self.watchdog {
            watchdog.kick();
        }

        let mut drained = 0usize;
        while drained < self.config.command_drain_budget {
            match commands.try_recv() {
                Ok(cmd) => {
                    if let Some(idx) = self.intents.iter().position(|i| i.position == cmd.drive) {
                        let drive_cfg = &self.config.drives[idx];
                        self.intents[idx].apply_command(cmd.kind, drive_cfg);
                    }
                    drained += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }

        let now = Instant::now();
        if !self.config.sdo_only {
            let app_time = self.start.elapsed().as_nanos() as u64;
            self.adapter.set_application_time(app_time)?;
            self.adapter.receive()?;
            self.adapter.process_domain()?;
        }

        let mut fault_position = None;
        for idx in 0..self.intents.len() {
            let position = self.config.drives[idx].position;
            if let Err(err) = self.apply_drive_intent(idx, now) {
                warn!(position, error = %err, "drive intent application failed this cycle");
                for (_, health) in &mut self.current[idx].pdo_health {
                    *health = PdoHealth::Error;
                }
            }
            if self.current[idx].last_failure != LastFailureKind::None && fault_position.is_none() {
                fault_position = Some(position);
            }
        }

        if !self.config.sdo_only {
            self.adapter.queue_domain()?;
            self.adapter.send()?;
            if let Ok((actual, expected)) = self.adapter.domain_wkc() {
                self.fault_recorder.set_last_wkc(actual, expected);
            }
        }

        let execution_time = cycle_start.elapsed();
        let overrun = execution_time > self.config.cycle_period;
        self.metrics.record(execution_time);

        let snapshots: Vec<DriveSnapshot> = self.current.iter().map(DriveSnapshot::from).collect();
        self.fault_recorder.record_cycle(self.cycle, execution_time, overrun, snapshots.clone());
        if let Some(position) = fault_position {
            if !self.fault_recorded {
                self.fault_recorder.record_fault(self.cycle, position, execution_time, snapshots);
                self.fault_recorded = true;
            }
        }

        let due = self
            .last_status_publish
            .map_or(true, |t| now.duration_since(t) >= self.config.status_publish_interval);
        let status_published = if due {
            status.publish(self.snapshot_status(now));
            self.last_status_publish = Some(now);
            true
        } else {
            false
        };

        let deadline = self.next_deadline.unwrap_or(cycle_start) + self.config.cycle_period;
        self.next_deadline = Some(deadline);
        self.sleep_until(deadline);

        Ok(CycleOutcome { cycle: self.cycle, execution_time, overrun, status_published })
    }

    /// Release the master. Called once, after the supervisor has signalled
    /// shutdown and the worker has stopped calling `run_cycle`.
    pub fn shutdown(&mut self) -> EngineResult<()> {
        self.adapter.release()?;
        info!(cycles = self.cycle, "cyclic engine released master");
        Ok(())
    }

    /// Cycle-timing metrics collected so far.
    #[must_use]
    pub fn metrics(&self) -> &CycleMetrics {
        &self.metrics
    }

    /// The fault recorder, for postmortem inspection after a shutdown.
    #[must_use]
    pub fn fault_recorder(&self) -> &FaultRecorder {
        &self.fault_recorder
    }

    fn apply_drive_intent(&mut self, idx: usize, now: Instant) -> EngineResult<()> {
        let position = self.config.drives[idx].position;
        let drive_cfg = self.config.drives[idx].clone();
        let negative_edge_index = drive_cfg.probe_negative_edge_index;

        let statusword = self.read_u16(position, 0x6041, 0)?;
        let power_state = PowerState::from_statusword(statusword);
        let mode_display = self.read_i8(position, 0x6061, 0)?;
        let position_actual = self.read_i32(position, 0x6064, 0)?;
        let velocity_actual = self.read_i32(position, 0x606C, 0)?;
        let probe_status = self.read_u16(position, 0x60B9, 0)?;
        let digital_inputs = self.read_u32(position, 0x60FD, 0)?;

        if !self.intents[idx].mode_verified {
            self.intents[idx].observe_mode_display(mode_display);
        }

        if !self.intents[idx].polarity_checked {
            self.intents[idx].polarity_checked = true;
            self.verify_polarity(position, drive_cfg.polarity, idx)?;
        }

        let via_pdo = !self.config.sdo_only && self.offsets.is_mapped(position, 0x6060, 0);
        if let Some(wire_value) = self.intents[idx].mode_write_due(&self.config, self.cycle, via_pdo, now) {
            self.write_value(position, 0x6060, 0, &wire_value.to_le_bytes())?;
        }

        if let Some(pulses) = self.intents[idx].velocity_maintenance(power_state) {
            self.write_value(position, 0x60FF, 0, &pulses.to_le_bytes())?;
        }

        match self.intents[idx].desired_mode {
            Some(crate::intent::Mode::Position) => {
                if let Some(target) = self.intents[idx].pp_maintenance(&self.config, power_state, position_actual, statusword, now) {
                    self.write_value(position, 0x607A, 0, &target.to_le_bytes())?;
                }
            }
            Some(crate::intent::Mode::Csp) => {
                if let Some(target) = self.intents[idx].csp_maintenance(power_state) {
                    self.write_value(position, 0x607A, 0, &target.to_le_bytes())?;
                }
            }
            _ => {}
        }

        if let Some(function_value) = self.intents[idx].probe_maintenance(&self.config, now) {
            self.write_value(position, 0x60B8, 0, &function_value.to_le_bytes())?;
        }
        // 0x60B8 is an RxPDO (master->slave) object, not present in the input
        // domain; verifying the arm took effect means reading it back via SDO
        // rather than comparing the unrelated 0x60B9 status word.
        if self.intents[idx].probe_transition == ProbeTransition::Idle {
            let function_readback = self.adapter.sdo_upload(position, 0x60B8, 0, 2)?;
            let function_readback = u16::from_le_bytes(function_readback.get(0..2).unwrap_or(&[0, 0]).try_into().unwrap());
            self.intents[idx].observe_probe_function(&self.config, function_readback);
        }

        let mode_ready = matches!(self.intents[idx].desired_mode, Some(crate::intent::Mode::Homing)) && self.intents[idx].mode_verified;
        self.intents[idx].homing_maintenance(&drive_cfg.homing, mode_ready, statusword, now);

        let controlword = self.intents[idx].compute_controlword(statusword, now);
        self.write_value(position, 0x6040, 0, &controlword.to_le_bytes())?;

        let fault_code = if power_state == PowerState::Fault {
            self.adapter
                .sdo_upload(position, 0x603F, 0, 2)
                .ok()
                .map(|bytes| u16::from_le_bytes(bytes.get(0..2).unwrap_or(&[0, 0]).try_into().unwrap()))
        } else {
            None
        };

        let probe_active = probe_status & 0x0001 != 0;
        let probe_positive_edge = if probe_status & (1 << 1) != 0 {
            Some(drive_cfg.unit_conversion.to_user_units(self.read_i32(position, 0x60BA, 0)?))
        } else {
            None
        };
        let probe_negative_edge = if probe_status & (1 << 2) != 0 {
            Some(drive_cfg.unit_conversion.to_user_units(self.read_i32(position, negative_edge_index, 0)?))
        } else {
            None
        };

        let pdo_health = canonical_objects(negative_edge_index)
            .iter()
            .map(|&index| {
                let health = if self.config.sdo_only {
                    PdoHealth::Missing
                } else if self.offsets.is_mapped(position, index, 0) {
                    PdoHealth::Mapped
                } else {
                    PdoHealth::Missing
                };
                (index, health)
            })
            .collect();

        self.current[idx] = DriveStatus {
            position,
            statusword,
            mode_display,
            position_actual: drive_cfg.unit_conversion.to_user_units(position_actual),
            velocity_actual: drive_cfg.unit_conversion.to_user_units(velocity_actual),
            probe_active,
            probe_positive_edge,
            probe_negative_edge,
            digital_inputs,
            fault_code,
            mode_verified: self.intents[idx].mode_verified,
            last_failure: self.intents[idx].last_failure,
            pdo_health,
        };

        Ok(())
    }

    /// Confirm the configured polarity (0x607E) took effect and correct it
    /// once if not. Some drives only accept this object in PREOP; on those,
    /// the correction attempt is rejected, and the failure is recorded
    /// rather than retried every cycle thereafter.
    fn verify_polarity(&mut self, position: u16, configured: u8, idx: usize) -> EngineResult<()> {
        let actual = self.adapter.sdo_upload(position, 0x607E, 0, 1)?;
        if actual.first().copied() == Some(configured) {
            return Ok(());
        }

        match self.adapter.sdo_download(position, 0x607E, 0, &[configured]) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(position, error = %err, "polarity correction rejected post-activation, not retrying");
                self.intents[idx].last_failure = LastFailureKind::PreopWriteRejected;
                Ok(())
            }
        }
    }

    fn snapshot_status(&self, now: Instant) -> NetworkStatus {
        NetworkStatus {
            timestamp_ns: now.duration_since(self.start).as_nanos() as u64,
            cycle_period: self.config.cycle_period,
            sdo_only: self.config.sdo_only,
            drives: self.current.clone(),
        }
    }

    fn domain_bounds_error() -> EngineError {
        EngineError::Master(MasterError::DomainError("buffer too short for offset".into()))
    }

    fn read_u16(&mut self, position: u16, index: u16, subindex: u8) -> EngineResult<u16> {
        if let Some(offset) = self.offsets.offset(position, index, subindex) {
            let buf = self.adapter.read_domain()?;
            let off = offset as usize;
            let bytes = buf.get(off..off + 2).ok_or_else(Self::domain_bounds_error)?;
            Ok(u16::from_le_bytes(bytes.try_into().unwrap()))
        } else {
            let bytes = self.adapter.sdo_upload(position, index, subindex, 2)?;
            Ok(u16::from_le_bytes(bytes.get(0..2).unwrap_or(&[0, 0]).try_into().unwrap()))
        }
    }

    fn read_i8(&mut self, position: u16, index: u16, subindex: u8) -> EngineResult<i8> {
        if let Some(offset) = self.offsets.offset(position, index, subindex) {
            let buf = self.adapter.read_domain()?;
            let off = offset as usize;
            let byte = *buf.get(off).ok_or_else(Self::domain_bounds_error)?;
            Ok(byte as i8)
        } else {
            let bytes = self.adapter.sdo_upload(position, index, subindex, 1)?;
            Ok(*bytes.first().unwrap_or(&0) as i8)
        }
    }

    fn read_i32(&mut self, position: u16, index: u16, subindex: u8) -> EngineResult<i32> {
        if let Some(offset) = self.offsets.offset(position, index, subindex) {
            let buf = self.adapter.read_domain()?;
            let off = offset as usize;
            let bytes = buf.get(off..off + 4).ok_or_else(Self::domain_bounds_error)?;
            Ok(i32::from_le_bytes(bytes.try_into().unwrap()))
        } else {
            let bytes = self.adapter.sdo_upload(position, index, subindex, 4)?;
            let mut padded = [0u8; 4];
            let n = bytes.len().min(4);
            padded[..n].copy_from_slice(&bytes[..n]);
            Ok(i32::from_le_bytes(padded))
        }
    }

    fn read_u32(&mut self, position: u16, index: u16, subindex: u8) -> EngineResult<u32> {
        if let Some(offset) = self.offsets.offset(position, index, subindex) {
            let buf = self.adapter.read_domain()?;
            let off = offset as usize;
            let bytes = buf.get(off..off + 4).ok_or_else(Self::domain_bounds_error)?;
            Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
        } else {
            let bytes = self.adapter.sdo_upload(position, index, subindex, 4)?;
            let mut padded = [0u8; 4];
            let n = bytes.len().min(4);
            padded[..n].copy_from_slice(&bytes[..n]);
            Ok(u32::from_le_bytes(padded))
        }
    }

    fn write_value(&mut self, position: u16, index: u16, subindex: u8, bytes: &[u8]) -> EngineResult<()> {
        if let Some(offset) = self.offsets.offset(position, index, subindex) {
            let buf = self.adapter.write_domain()?;
            let off = offset as usize;
            let dest = buf.get_mut(off..off + bytes.len()).ok_or_else(Self::domain_bounds_error)?;
            dest.copy_from_slice(bytes);
            Ok(())
        } else {
            let key = (position, index, subindex);
            let now = Instant::now();
            if self.sdo_writes.due(key, bytes, now, self.config.sdo_fallback_interval) {
                self.adapter.sdo_download(position, index, subindex, bytes)?;
                self.sdo_writes.record(key, bytes.to_vec(), now);
            }
            Ok(())
        }
    }

    /// Drift-compensated sleep: computes the remaining time to `deadline`
    /// from the monotonic clock at the point of the call, rather than
    /// sleeping a fixed duration, so per-cycle jitter does not accumulate.
    fn sleep_until(&self, deadline: Instant) {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        let remaining = deadline - now;

        #[cfg(target_os = "linux")]
        {
            let ts = libc::timespec {
                tv_sec: remaining.as_secs() as libc::time_t,
                tv_nsec: remaining.subsec_nanos() as libc::c_long,
            };
            // SAFETY: clock_nanosleep is safe with valid parameters.
            unsafe {
                libc::clock_nanosleep(libc::CLOCK_MONOTONIC, 0, &ts, std::ptr::null_mut());
            }
        }
        #[cfg(not(target_os = "linux"))]
        {
            std::thread::sleep(remaining);
        }
    }
}

fn empty_status(drive: &DriveConfig, offsets: &PdoOffsetMap) -> DriveStatus {
    let pdo_health = canonical_objects(drive.probe_negative_edge_index)
        .iter()
        .map(|&index| {
            let health = if offsets.is_mapped(drive.position, index, 0) {
                PdoHealth::Mapped
            } else {
                PdoHealth::Missing
            };
            (index, health)
        })
        .collect();
    DriveStatus {
        position: drive.position,
        statusword: 0,
        mode_display: 0,
        position_actual: 0.0,
        velocity_actual: 0.0,
        probe_active: false,
        probe_positive_edge: None,
        probe_negative_edge: None,
        digital_inputs: 0,
        fault_code: None,
        mode_verified: false,
        last_failure: LastFailureKind::None,
        pdo_health,
    }
}
