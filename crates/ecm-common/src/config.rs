//! Configuration structures for the EtherCAT cyclic manager.
//!
//! `NetworkConfig` is constructed by the application and handed to the
//! supervisor at start; it is never mutated afterward. TOML deserialization
//! fills in every documented default via `#[serde(default)]`, so a
//! near-empty file is a valid configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Immutable, process-wide network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// EtherCAT master index (there is usually exactly one, index 0).
    pub master_index: u16,

    /// Device path for the master binding, e.g. `/dev/EtherCAT0`.
    pub device_path: PathBuf,

    /// Cycle period of the fixed-rate loop (typically 1-10 ms).
    #[serde(with = "humantime_serde")]
    pub cycle_period: Duration,

    /// When true, the engine never touches PDOs and maintains every object
    /// through SDO only (used for bring-up/diagnostics, never for motion).
    pub sdo_only: bool,

    /// How long to wait, polling at 1 Hz, for every slave to report OP.
    #[serde(with = "humantime_serde")]
    pub op_timeout: Duration,

    /// Minimum spacing between two CiA 402 power-state controlword edges.
    #[serde(with = "humantime_serde")]
    pub enable_transition_period: Duration,

    /// Statusword bit mask indicating a PP move's set-point was acknowledged.
    /// Vendor-variable; default is bit 12 (0x1000).
    pub pp_ack_mask: u16,

    /// How long to wait for the PP set-point-acknowledged bit before giving up
    /// on that particular acknowledgement and falling back to stall detection.
    #[serde(with = "humantime_serde")]
    pub pp_ack_timeout: Duration,

    /// Minimum position delta (in pulses) that counts as "still moving" for
    /// PP stall detection.
    pub pp_stall_min_delta: i32,

    /// How long without the minimum delta before a stall rescue is triggered.
    #[serde(with = "humantime_serde")]
    pub pp_stall_window: Duration,

    /// Minimum spacing between two bit-4 stall rescues for the same target.
    #[serde(with = "humantime_serde")]
    pub bit4_cycle_interval: Duration,

    /// Maximum number of stall rescues attempted per target before the move
    /// is reported as failed (`pp_stall_failed`).
    pub pp_max_rescues: u32,

    /// Duration of the probe disable-first transition window.
    #[serde(with = "humantime_serde")]
    pub probe_transition_window: Duration,

    /// Maximum probe-arm readback retries before recording `probe_arm_mismatch`.
    pub probe_max_retries: u32,

    /// Maximum commands drained from the command queue per cycle.
    pub command_drain_budget: usize,

    /// Capacity of the command queue (overflow policy: error to the producer).
    pub command_queue_capacity: usize,

    /// Capacity of the status queue (overflow policy: drop-oldest).
    pub status_queue_capacity: usize,

    /// Minimum interval between two status publications.
    #[serde(with = "humantime_serde")]
    pub status_publish_interval: Duration,

    /// Mode-verify retry interval (in cycles).
    pub mode_verify_retry_cycles: u32,

    /// Mode-verify attempt budget before recording `mode_verify_timeout`.
    pub mode_verify_max_attempts: u32,

    /// SDO fallback re-issue interval when the maintained value is unchanged.
    #[serde(with = "humantime_serde")]
    pub sdo_fallback_interval: Duration,

    /// Best-effort preflight releaser, invoked when the initial master
    /// request fails.
    pub preflight: PreflightConfig,

    /// Bounded join wait before the supervisor force-terminates the worker.
    #[serde(with = "humantime_serde")]
    pub shutdown_join_timeout: Duration,

    /// Ordered list of drives on this network.
    pub drives: Vec<DriveConfig>,

    /// Real-time process deployment helpers (opt-in, applied by the daemon).
    pub realtime: RealtimeConfig,

    /// Cycle-timing metrics configuration.
    pub metrics: MetricsConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            master_index: 0,
            device_path: PathBuf::from("/dev/EtherCAT0"),
            cycle_period: Duration::from_millis(5),
            sdo_only: false,
            op_timeout: Duration::from_secs(5),
            enable_transition_period: Duration::from_millis(100),
            pp_ack_mask: 0x1000,
            pp_ack_timeout: Duration::from_millis(200),
            pp_stall_min_delta: 10,
            pp_stall_window: Duration::from_millis(500),
            bit4_cycle_interval: Duration::from_millis(300),
            pp_max_rescues: 16,
            probe_transition_window: Duration::from_millis(50),
            probe_max_retries: 1,
            command_drain_budget: 16,
            command_queue_capacity: 1024,
            status_queue_capacity: 64,
            status_publish_interval: Duration::from_millis(50),
            mode_verify_retry_cycles: 1,
            mode_verify_max_attempts: 5,
            sdo_fallback_interval: Duration::from_secs(1),
            preflight: PreflightConfig::default(),
            shutdown_join_timeout: Duration::from_secs(2),
            drives: Vec::new(),
            realtime: RealtimeConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl NetworkConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string and validate it structurally.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or drives are misconfigured.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::from)
    }

    /// Validate structural invariants that serde cannot express: unique bus
    /// positions, and that sdo-only networks skip the PDO-presence check.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` on a duplicate bus position.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for drive in &self.drives {
            if !seen.insert(drive.position) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate drive bus position {}",
                    drive.position
                )));
            }
        }
        Ok(())
    }
}

/// Best-effort "release stuck master" preflight, invoked only when the
/// initial master request fails. Advisory, bounded to a single retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreflightConfig {
    /// Whether the preflight releaser may be invoked at all.
    pub enabled: bool,
    /// Delay to wait after invoking the releaser before retrying the request.
    #[serde(with = "humantime_serde")]
    pub release_delay: Duration,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            release_delay: Duration::from_millis(500),
        }
    }
}

/// Per-slave, immutable-after-start drive configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Bus position (0-indexed order on the segment).
    pub position: u16,
    /// Configured station alias.
    pub alias: u16,
    /// Expected vendor ID, validated against `slave_info` at configure time.
    pub vendor_id: u32,
    /// Expected product code.
    pub product_code: u32,
    /// Path to this drive's ESI XML file, or `None` to rely on built-in defaults.
    pub esi_path: Option<PathBuf>,
    /// Explicit PDO mapping overrides, bypassing the ESI-derived defaults.
    pub pdo_overrides: Option<PdoOverrides>,
    /// Distributed-clock settings for this slave.
    pub dc: DcConfig,
    /// Pulses-per-user-unit conversion.
    pub unit_conversion: UnitConversion,
    /// Motion profile defaults.
    pub profile: ProfileDefaults,
    /// Homing parameters.
    pub homing: HomingConfig,
    /// Optional jerk-limited trajectory generator settings.
    pub jerk_limit: Option<JerkLimitConfig>,
    /// Object index used for the probe negative edge: 0x60BB on most drives,
    /// 0x60BC on some. ESI-driven by default; overridable here (open question 1).
    pub probe_negative_edge_index: u16,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            position: 0,
            alias: 0,
            vendor_id: 0,
            product_code: 0,
            esi_path: None,
            pdo_overrides: None,
            dc: DcConfig::default(),
            unit_conversion: UnitConversion::default(),
            profile: ProfileDefaults::default(),
            homing: HomingConfig::default(),
            jerk_limit: None,
            probe_negative_edge_index: 0x60BB,
        }
    }
}

/// Explicit PDO mapping override: RxPDO/TxPDO indices and the entry list
/// assigned to each, bypassing what the ESI decoder would otherwise supply.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PdoOverrides {
    /// RxPDO (master -> slave) index to assign.
    pub rx_pdo_index: Option<u16>,
    /// TxPDO (slave -> master) index to assign.
    pub tx_pdo_index: Option<u16>,
    /// RxPDO entries as (object index, subindex, bit length) tuples, in
    /// mapping order. Empty keeps the canonical RxPDO default.
    pub entries: Vec<(u16, u8, u8)>,
    /// TxPDO entries as (object index, subindex, bit length) tuples, in
    /// mapping order. Empty keeps the canonical TxPDO default. Used to
    /// exercise SDO fallback for an object the canonical TxPDO would
    /// otherwise map, e.g. dropping 0x6061 to force SDO-verified mode reads.
    pub tx_entries: Vec<(u16, u8, u8)>,
}

/// Distributed-clock settings for one slave.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DcConfig {
    /// Whether DC is configured for this slave at all.
    pub enabled: bool,
    /// Raw `assign_activate` word (0x0000 off, 0x0300 SYNC0, 0x0700 SYNC0+SYNC1).
    pub assign_activate: u16,
    /// SYNC0 cycle time; defaults to the network cycle period when `None`.
    pub sync0_cycle: Option<Duration>,
    /// SYNC0 shift time from the cycle start.
    #[serde(with = "humantime_serde")]
    pub sync0_shift: Duration,
    /// SYNC1 cycle time, if SYNC1 is enabled in `assign_activate`.
    pub sync1_cycle: Option<Duration>,
    /// SYNC1 shift time from the cycle start.
    #[serde(with = "humantime_serde")]
    pub sync1_shift: Duration,
}

impl Default for DcConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            assign_activate: 0x0000,
            sync0_cycle: None,
            sync0_shift: Duration::ZERO,
            sync1_cycle: None,
            sync1_shift: Duration::ZERO,
        }
    }
}

/// Pulses-per-user-unit conversion applied at the intent boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConversion {
    /// Encoder/motor pulses per one user unit (e.g. mm, degree).
    pub pulses_per_unit: f64,
    /// Additional linear scale factor, multiplied after the pulses conversion.
    pub scale: f64,
}

impl Default for UnitConversion {
    fn default() -> Self {
        Self {
            pulses_per_unit: 1.0,
            scale: 1.0,
        }
    }
}

impl UnitConversion {
    /// Convert a user-unit value to pulses for writing to the wire.
    #[must_use]
    pub fn to_pulses(&self, user_units: f64) -> i32 {
        (user_units * self.pulses_per_unit * self.scale).round() as i32
    }

    /// Convert a raw pulse value read from the wire back to user units.
    #[must_use]
    pub fn to_user_units(&self, pulses: i32) -> f64 {
        f64::from(pulses) / (self.pulses_per_unit * self.scale)
    }
}

/// Motion profile defaults applied when no per-command override is given.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileDefaults {
    /// Profile velocity (0x6081), in pulses/s.
    pub velocity: u32,
    /// Profile acceleration (0x6083), in pulses/s^2.
    pub acceleration: u32,
    /// Profile deceleration (0x6084), in pulses/s^2.
    pub deceleration: u32,
    /// Polarity (0x607E).
    pub polarity: u8,
    /// Load-to-motor inertia ratio, informational/logging only.
    pub inertia_ratio: f64,
    /// Software position limit policy.
    pub software_limit_policy: SoftwareLimitPolicy,
    /// Hard cap applied to any velocity intent (0x60FF), in pulses/s.
    pub max_velocity: i32,
}

impl Default for ProfileDefaults {
    fn default() -> Self {
        Self {
            velocity: 100_000,
            acceleration: 500_000,
            deceleration: 500_000,
            polarity: 0,
            inertia_ratio: 1.0,
            software_limit_policy: SoftwareLimitPolicy::Disabled,
            max_velocity: 1_000_000,
        }
    }
}

/// Software position-limit enforcement policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SoftwareLimitPolicy {
    /// No software limit enforcement (rely on drive/hardware limits).
    #[default]
    Disabled,
    /// Clamp any position intent to the configured min/max.
    Clamp,
    /// Reject (leave intent unapplied) any position intent outside range.
    Reject,
}

/// Homing parameters (DS402 §6098h method, §609[8-9]h velocities/accel, §60_9Ah offset).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingConfig {
    /// Homing method (0x6098), drive/vendor defined.
    pub method: i8,
    /// Search velocity (switch speed), 0x6099 sub 1.
    pub search_velocity: u32,
    /// Zero velocity (homing speed), 0x6099 sub 2.
    pub zero_velocity: u32,
    /// Homing acceleration, 0x609A.
    pub acceleration: u32,
    /// Home offset, 0x607C.
    pub offset: i32,
    /// Bounded timeout before homing is reported `homing_failed`.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            method: 1,
            search_velocity: 50_000,
            zero_velocity: 5_000,
            acceleration: 200_000,
            offset: 0,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Optional jerk-limited trajectory generator settings (external collaborator
/// contract: a pluggable streaming source of CSP targets).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct JerkLimitConfig {
    /// Maximum jerk, in pulses/s^3.
    pub max_jerk: f64,
}

/// Real-time process deployment helpers (mlockall, SCHED_FIFO/RR, CPU affinity).
///
/// These configure the *process*, not the engine: NIC IRQ priority and core
/// isolation remain an external deployment prerequisite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Enable real-time scheduling (requires privileges).
    pub enabled: bool,
    /// Scheduler policy: fifo, rr, or other (non-RT).
    pub policy: SchedPolicy,
    /// Scheduler priority (1-99 for RT policies).
    pub priority: u8,
    /// CPU affinity for the cyclic thread.
    pub cpu_affinity: CpuAffinity,
    /// Lock all memory pages (mlockall).
    pub lock_memory: bool,
    /// Pre-fault stack size in bytes.
    pub prefault_stack_size: usize,
    /// Fail immediately at startup if RT requirements cannot be met.
    pub fail_fast: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            policy: SchedPolicy::Fifo,
            priority: 90,
            cpu_affinity: CpuAffinity::None,
            lock_memory: true,
            prefault_stack_size: 8 * 1024 * 1024,
            fail_fast: false,
        }
    }
}

/// Scheduler policy for real-time threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchedPolicy {
    /// SCHED_FIFO.
    #[default]
    Fifo,
    /// SCHED_RR.
    Rr,
    /// SCHED_OTHER (non-RT).
    Other,
}

/// CPU affinity specification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CpuAffinity {
    /// No affinity set (OS chooses).
    #[default]
    None,
    /// Pin to a single CPU core.
    Single(usize),
    /// Pin to a set of CPU cores.
    Set(Vec<usize>),
}

impl Serialize for CpuAffinity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            CpuAffinity::None => serializer.serialize_none(),
            CpuAffinity::Single(cpu) => serializer.serialize_u64(*cpu as u64),
            CpuAffinity::Set(cpus) => cpus.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for CpuAffinity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct CpuAffinityVisitor;

        impl<'de> Visitor<'de> for CpuAffinityVisitor {
            type Value = CpuAffinity;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("null, an integer, or an array of integers")
            }

            fn visit_none<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(CpuAffinity::None)
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(CpuAffinity::None)
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(CpuAffinity::Single(value as usize))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if value < 0 {
                    return Err(de::Error::custom("CPU index cannot be negative"));
                }
                Ok(CpuAffinity::Single(value as usize))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut cpus = Vec::new();
                while let Some(cpu) = seq.next_element::<usize>()? {
                    cpus.push(cpu);
                }
                Ok(CpuAffinity::Set(cpus))
            }
        }

        deserializer.deserialize_any(CpuAffinityVisitor)
    }
}

/// Cycle-timing metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics collection.
    pub enabled: bool,
    /// Size of the cycle-time histogram ring buffer.
    pub histogram_size: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            histogram_size: 10_000,
        }
    }
}

/// Serde helper module for `Duration` using humantime format (e.g. "5ms").
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
