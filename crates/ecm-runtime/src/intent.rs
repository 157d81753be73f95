//! The Intent Model: per-drive desired state and the bookkeeping needed to
//! drive it onto the wire one cycle at a time.
//!
//! A [`DriveIntent`] never blocks and never talks to the bus directly; the
//! Cyclic Engine reads a drive's statusword/actual values, asks the intent
//! what (if anything) needs writing this cycle, and applies the answer to
//! the domain buffer or an SDO. This keeps every retry/pacing/stall decision
//! in one place, independent of whether the underlying object happens to be
//! mapped in PDO this cycle.

use ecm_common::config::{DriveConfig, NetworkConfig};
use ecm_common::state::{controlword, PowerState, PowerStateTracker};
use ecm_common::{Command, CommandKind, LastFailureKind, ProbeEdge};
use std::time::{Duration, Instant};

/// CiA 402 modes of operation (0x6060/0x6061), DS402 standard values.
pub mod modes {
    pub const PROFILE_POSITION: i8 = 1;
    pub const PROFILE_VELOCITY: i8 = 3;
    pub const HOMING: i8 = 6;
    pub const CYCLIC_SYNC_POSITION: i8 = 8;
}

/// Desired mode of operation, mirroring the subset of `CommandKind` that
/// selects a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Velocity,
    Position,
    Csp,
    Homing,
}

impl Mode {
    #[must_use]
    pub fn wire_value(self) -> i8 {
        match self {
            Self::Velocity => modes::PROFILE_VELOCITY,
            Self::Position => modes::PROFILE_POSITION,
            Self::Csp => modes::CYCLIC_SYNC_POSITION,
            Self::Homing => modes::HOMING,
        }
    }
}

/// Disable-first probe-arm transition, per §4.3.1: the function register is
/// always written 0x0000 before a new arm value, with a settle window in
/// between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeTransition {
    #[default]
    Idle,
    /// Disable write issued; waiting for the transition window to elapse,
    /// at which point the arm value is written.
    Disabling {
        deadline: Instant,
    },
}

/// Staged homing sequence, walked one step per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HomingState {
    #[default]
    Idle,
    /// Homing parameters are being staged via SDO.
    Staging,
    /// Waiting for the mode switch to Homing to verify.
    AwaitingMode,
    /// Controlword bit 4 pulse issued to start the search.
    Started { deadline: Instant },
    /// Search/zero in progress; waiting for the statusword completion bits.
    InProgress { deadline: Instant },
    Complete,
    Failed,
}

/// Per-drive desired state and the transient state machines needed to apply
/// it. One instance per configured drive, indexed by bus position.
#[derive(Debug)]
pub struct DriveIntent {
    pub position: u16,

    pub desired_mode: Option<Mode>,
    pub mode_verified: bool,
    pub mode_attempts: u32,
    pub mode_last_written_cycle: Option<u64>,
    pub mode_last_sdo_write_at: Option<Instant>,

    pub desired_velocity_pulses: Option<i32>,

    pub desired_position_pulses: Option<i32>,
    pub last_written_position_pulses: Option<i32>,
    pub bit4_pulse_pending: bool,
    pub pp_ack_pending: bool,
    pub pp_ack_deadline: Option<Instant>,
    pub pp_stall_reference_position: Option<i32>,
    pub pp_stall_reference_at: Option<Instant>,
    pub pp_last_rescue_at: Option<Instant>,
    pub pp_rescue_count: u32,

    pub probe_active_value: u16,
    pub probe_desired_value: Option<u16>,
    pub probe_transition: ProbeTransition,
    pub probe_retry_count: u32,

    pub fault_reset_requested: bool,

    pub homing_state: HomingState,

    pub last_commanded_controlword: u16,
    pub power: PowerStateTracker,

    pub last_failure: LastFailureKind,

    /// Set once the post-activation polarity readback has been checked, so
    /// a rejected correction is reported once rather than retried forever.
    pub polarity_checked: bool,
}

impl DriveIntent {
    #[must_use]
    pub fn new(position: u16, enable_transition_period: Duration) -> Self {
        Self {
            position,
            desired_mode: None,
            mode_verified: false,
            mode_attempts: 0,
            mode_last_written_cycle: None,
            mode_last_sdo_write_at: None,
            desired_velocity_pulses: None,
            desired_position_pulses: None,
            last_written_position_pulses: None,
            bit4_pulse_pending: false,
            pp_ack_pending: false,
            pp_ack_deadline: None,
            pp_stall_reference_position: None,
            pp_stall_reference_at: None,
            pp_last_rescue_at: None,
            pp_rescue_count: 0,
            probe_active_value: 0,
            probe_desired_value: None,
            probe_transition: ProbeTransition::Idle,
            probe_retry_count: 0,
            fault_reset_requested: false,
            homing_state: HomingState::Idle,
            last_commanded_controlword: 0,
            power: PowerStateTracker::new(enable_transition_period),
            last_failure: LastFailureKind::None,
            polarity_checked: false,
        }
    }

    /// Apply a drained command, updating the relevant piece of desired state.
    /// Never blocks, never touches the wire.
    pub fn apply_command(&mut self, kind: CommandKind, drive: &DriveConfig) {
        match kind {
            CommandKind::SetVelocityMode => self.request_mode(Mode::Velocity),
            CommandKind::SetPositionMode => self.request_mode(Mode::Position),
            CommandKind::SetCspMode => self.request_mode(Mode::Csp),
            CommandKind::SetHomingMode => {
                self.request_mode(Mode::Homing);
                self.homing_state = HomingState::Staging;
            }
            CommandKind::SetVelocity(value) => {
                let mut pulses = drive.unit_conversion.to_pulses(value);
                let cap = drive.profile.max_velocity;
                if pulses > cap {
                    pulses = cap;
                } else if pulses < -cap {
                    pulses = -cap;
                }
                self.desired_velocity_pulses = Some(pulses);
            }
            CommandKind::SetPositionAbsolute(value) => {
                self.desired_position_pulses = Some(drive.unit_conversion.to_pulses(value));
            }
            CommandKind::SetPositionCsp(value) => {
                self.desired_position_pulses = Some(drive.unit_conversion.to_pulses(value));
            }
            CommandKind::ArmProbe(edge) => {
                self.probe_desired_value = Some(edge.function_value());
                self.probe_transition = ProbeTransition::Idle;
                self.probe_retry_count = 0;
            }
            CommandKind::DisableProbe => {
                self.probe_desired_value = Some(0);
                self.probe_transition = ProbeTransition::Idle;
                self.probe_retry_count = 0;
            }
            CommandKind::ClearFault => self.fault_reset_requested = true,
            CommandKind::StartHoming => self.homing_state = HomingState::Staging,
        }
    }

    fn request_mode(&mut self, mode: Mode) {
        self.desired_mode = Some(mode);
        self.mode_verified = false;
        self.mode_attempts = 0;
        self.mode_last_written_cycle = None;
        self.mode_last_sdo_write_at = None;
    }

    /// CiA 402 power-state walk plus fault-reset and motion controlword bits.
    /// Returns the single controlword value to write this cycle, and clears
    /// the pending bit-4 pulse (callers must set it via `position_maintenance`
    /// or the probe function word before calling this).
    pub fn compute_controlword(&mut self, statusword: u16, now: Instant) -> u16 {
        let power_state = PowerState::from_statusword(statusword);

        if power_state == PowerState::Fault {
            if self.fault_reset_requested {
                self.fault_reset_requested = false;
                self.last_failure = LastFailureKind::DriveFault;
                self.last_commanded_controlword = controlword::FAULT_RESET;
            } else {
                self.last_failure = LastFailureKind::DriveFault;
                self.last_commanded_controlword = 0;
            }
            return self.last_commanded_controlword;
        }

        if let Some(edge) = self.power.step(statusword, now) {
            self.last_commanded_controlword = edge;
            return edge;
        }

        if power_state.is_operation_enabled() {
            let mut word = controlword::ENABLE_OPERATION;
            if self.bit4_pulse_pending {
                word |= controlword::NEW_SET_POINT;
                self.bit4_pulse_pending = false;
            }
            self.last_commanded_controlword = word;
            return word;
        }

        self.last_commanded_controlword
    }

    #[must_use]
    pub fn power_state(&self) -> PowerState {
        self.power.state()
    }

    /// Whether the PP/CSP position target changed since the last wire write.
    fn position_changed(&self) -> bool {
        match self.desired_position_pulses {
            Some(target) => self.last_written_position_pulses != Some(target),
            None => false,
        }
    }

    /// Decide what (if anything) to write to the target-position object this
    /// cycle for Profile Position mode, including the stall-rescue state
    /// machine. Returns the position to write, if any.
    pub fn pp_maintenance(
        &mut self,
        config: &NetworkConfig,
        power_state: PowerState,
        actual_pulses: i32,
        statusword: u16,
        now: Instant,
    ) -> Option<i32> {
        if !power_state.is_operation_enabled() {
            return None;
        }
        let Some(target) = self.desired_position_pulses else {
            return None;
        };

        if self.position_changed() {
            self.last_written_position_pulses = Some(target);
            self.bit4_pulse_pending = true;
            self.pp_ack_pending = true;
            self.pp_ack_deadline = Some(now + config.pp_ack_timeout);
            self.pp_stall_reference_position = Some(actual_pulses);
            self.pp_stall_reference_at = Some(now);
            self.pp_last_rescue_at = None;
            self.pp_rescue_count = 0;
            return Some(target);
        }

        if self.pp_ack_pending {
            if statusword & config.pp_ack_mask != 0 {
                self.pp_ack_pending = false;
            } else if self.pp_ack_deadline.is_some_and(|deadline| now >= deadline) {
                self.pp_ack_pending = false;
            }
        }

        self.evaluate_pp_stall(config, actual_pulses, now);
        Some(target)
    }

    fn evaluate_pp_stall(&mut self, config: &NetworkConfig, actual_pulses: i32, now: Instant) {
        if self.last_failure == LastFailureKind::PpStallFailed {
            return;
        }

        let Some(reference) = self.pp_stall_reference_position else {
            self.pp_stall_reference_position = Some(actual_pulses);
            self.pp_stall_reference_at = Some(now);
            return;
        };

        let moved = (actual_pulses - reference).unsigned_abs() as i32;
        if moved >= config.pp_stall_min_delta {
            self.pp_stall_reference_position = Some(actual_pulses);
            self.pp_stall_reference_at = Some(now);
            return;
        }

        let Some(reference_at) = self.pp_stall_reference_at else {
            return;
        };
        if now.duration_since(reference_at) < config.pp_stall_window {
            return;
        }

        if self.pp_rescue_count >= config.pp_max_rescues {
            self.last_failure = LastFailureKind::PpStallFailed;
            return;
        }

        let ready = self
            .pp_last_rescue_at
            .map_or(true, |t| now.duration_since(t) >= config.bit4_cycle_interval);
        if !ready {
            return;
        }

        self.bit4_pulse_pending = true;
        self.pp_last_rescue_at = Some(now);
        self.pp_rescue_count += 1;
        self.pp_stall_reference_position = Some(actual_pulses);
        self.pp_stall_reference_at = Some(now);
    }

    /// Decide what to write to the target-position object this cycle in CSP
    /// mode: stream the target every cycle, no bit-4 pulse.
    pub fn csp_maintenance(&mut self, power_state: PowerState) -> Option<i32> {
        if !power_state.is_operation_enabled() {
            return None;
        }
        let target = self.desired_position_pulses?;
        self.last_written_position_pulses = Some(target);
        Some(target)
    }

    /// Velocity maintenance: stream the clamped target every cycle.
    #[must_use]
    pub fn velocity_maintenance(&self, power_state: PowerState) -> Option<i32> {
        if !power_state.is_operation_enabled() {
            return None;
        }
        self.desired_velocity_pulses
    }

    /// Mode maintenance: decide whether a (re)write is due this cycle, given
    /// whether the write path is PDO (paced by `mode_verify_retry_cycles`) or
    /// SDO (paced by `sdo_fallback_interval`).
    pub fn mode_write_due(
        &mut self,
        config: &NetworkConfig,
        cycle: u64,
        via_pdo: bool,
        now: Instant,
    ) -> Option<i8> {
        if self.mode_verified {
            return None;
        }
        let mode = self.desired_mode?;

        if self.mode_attempts >= config.mode_verify_max_attempts {
            self.last_failure = LastFailureKind::ModeVerifyTimeout;
            return None;
        }

        let due = if via_pdo {
            self.mode_last_written_cycle.map_or(true, |last| {
                cycle.saturating_sub(last) >= u64::from(config.mode_verify_retry_cycles)
            })
        } else {
            self.mode_last_sdo_write_at
                .map_or(true, |last| now.duration_since(last) >= config.sdo_fallback_interval)
        };
        if !due {
            return None;
        }

        if via_pdo {
            self.mode_last_written_cycle = Some(cycle);
        } else {
            self.mode_last_sdo_write_at = Some(now);
        }
        self.mode_attempts += 1;
        Some(mode.wire_value())
    }

    /// Observe the modes-of-operation display (0x6061) and verify it against
    /// the desired mode.
    pub fn observe_mode_display(&mut self, mode_display: i8) {
        if let Some(mode) = self.desired_mode {
            if mode_display == mode.wire_value() {
                self.mode_verified = true;
            }
        }
    }

    /// Probe-arm disable-first transition: decide what (if anything) to
    /// write to the touch-probe function register this cycle.
    pub fn probe_maintenance(&mut self, config: &NetworkConfig, now: Instant) -> Option<u16> {
        let desired = self.probe_desired_value?;

        match self.probe_transition {
            ProbeTransition::Idle => {
                if desired == self.probe_active_value {
                    self.probe_desired_value = None;
                    return None;
                }
                if desired == 0 {
                    self.probe_active_value = 0;
                    self.probe_desired_value = None;
                    return Some(0);
                }
                self.probe_transition = ProbeTransition::Disabling {
                    deadline: now + config.probe_transition_window,
                };
                Some(0)
            }
            ProbeTransition::Disabling { deadline } => {
                if now < deadline {
                    return None;
                }
                self.probe_active_value = desired;
                self.probe_desired_value = None;
                self.probe_transition = ProbeTransition::Idle;
                Some(desired)
            }
        }
    }

    /// Verify the probe function register readback matches the last arm
    /// request, retrying up to `probe_max_retries` before giving up.
    pub fn observe_probe_function(&mut self, config: &NetworkConfig, readback: u16) {
        if self.probe_transition != ProbeTransition::Idle {
            return;
        }
        if readback == self.probe_active_value {
            self.probe_retry_count = 0;
            return;
        }
        if self.probe_retry_count >= config.probe_max_retries {
            self.last_failure = LastFailureKind::ProbeArmMismatch;
            return;
        }
        self.probe_retry_count += 1;
        self.probe_desired_value = Some(self.probe_active_value);
    }

    /// Advance the homing state machine one step. `mode_ready` is true once
    /// the drive has verified Homing mode; `statusword` is the latest
    /// statusword to read the DS402 homing-complete/error bits from.
    pub fn homing_maintenance(
        &mut self,
        homing: &ecm_common::config::HomingConfig,
        mode_ready: bool,
        statusword: u16,
        now: Instant,
    ) {
        const HOMING_ATTAINED: u16 = 1 << 12;
        const HOMING_ERROR: u16 = 1 << 13;

        match self.homing_state {
            HomingState::Idle | HomingState::Complete | HomingState::Failed => {}
            HomingState::Staging => {
                self.homing_state = HomingState::AwaitingMode;
            }
            HomingState::AwaitingMode => {
                if mode_ready {
                    self.bit4_pulse_pending = true;
                    self.homing_state = HomingState::Started {
                        deadline: now + homing.timeout,
                    };
                }
            }
            HomingState::Started { deadline } => {
                if now >= deadline {
                    self.homing_state = HomingState::Failed;
                    self.last_failure = LastFailureKind::HomingFailed;
                } else {
                    self.homing_state = HomingState::InProgress { deadline };
                }
            }
            HomingState::InProgress { deadline } => {
                if statusword & HOMING_ERROR != 0 {
                    self.homing_state = HomingState::Failed;
                    self.last_failure = LastFailureKind::HomingFailed;
                } else if statusword & HOMING_ATTAINED != 0 {
                    self.homing_state = HomingState::Complete;
                } else if now >= deadline {
                    self.homing_state = HomingState::Failed;
                    self.last_failure = LastFailureKind::HomingFailed;
                }
            }
        }
    }
}
