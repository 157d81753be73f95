use thiserror::Error;

/// Error taxonomy for the Master Adapter (the narrow FFI-facing surface).
///
/// Every adapter call fails with one of these typed errors; none are ever
/// swallowed inside the adapter itself.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MasterError {
    /// The underlying kernel-library binding could not be loaded or opened.
    #[error("EtherCAT library unavailable: {0}")]
    LibraryUnavailable(String),

    /// Another process already holds the master for this device/index.
    #[error("master busy: {0}")]
    MasterBusy(String),

    /// `activate` was called but the bus did not come up.
    #[error("master activation failed: {0}")]
    ActivateFailed(String),

    /// An SDO request was aborted by the slave with the given abort code.
    #[error("SDO abort, code 0x{0:08X}")]
    SdoAbort(u32),

    /// A domain operation (create/register/read/write) failed.
    #[error("domain error: {0}")]
    DomainError(String),

    /// A handle expected to be non-null (master, domain, slave config) was null.
    #[error("null handle: {0}")]
    NullHandle(String),

    /// The caller supplied a configuration the adapter cannot act on.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias for Master Adapter operations.
pub type MasterResult<T> = Result<T, MasterError>;

/// Error taxonomy for the Cyclic Engine's startup and runtime paths.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// Wraps a Master Adapter failure encountered during startup or a cycle.
    #[error(transparent)]
    Master(#[from] MasterError),

    /// A slave never reported OP within the configured timeout.
    #[error("slave at position {position} never reached OP")]
    SlaveNeverReachedOp {
        /// Bus position of the offending slave.
        position: u16,
    },

    /// A required PDO object was not found in the offset map at startup.
    #[error("required PDO 0x{index:04X} missing for drive at position {position}")]
    RequiredPdoMissing {
        /// Object index that was expected to be mapped.
        index: u16,
        /// Bus position of the drive.
        position: u16,
    },

    /// The command queue producer side reported backpressure.
    #[error("command queue overflow")]
    CommandQueueOverflow,

    /// A PREOP-only write was rejected after activation instead of being retried.
    #[error("PREOP-only write for object 0x{index:04X} rejected post-activation on drive at position {position}")]
    PreopWriteRejected {
        /// Object index of the rejected write.
        index: u16,
        /// Bus position of the drive.
        position: u16,
    },

    /// Generic configuration/validation error raised before the loop starts.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience alias for Cyclic Engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Per-drive runtime failure kinds, recorded in status rather than
/// propagated as process-terminating errors.
///
/// These never abort the loop: the engine continues maintaining other
/// drives and resumes the affected one on the next command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastFailureKind {
    /// No failure recorded.
    None,
    /// The drive reported a CiA 402 fault (statusword bit 3).
    DriveFault,
    /// Mode-verification attempt budget was exhausted without 0x6061 matching.
    ModeVerifyTimeout,
    /// A profile-position move stalled past the configured rescue budget.
    PpStallFailed,
    /// The probe-arm readback never matched the requested value.
    ProbeArmMismatch,
    /// Homing did not complete within its bounded timeout.
    HomingFailed,
    /// A PREOP-only write was rejected after activation.
    PreopWriteRejected,
}

impl Default for LastFailureKind {
    fn default() -> Self {
        Self::None
    }
}

/// Error taxonomy for the Process Supervisor.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SupervisorError {
    /// The cyclic worker failed to start.
    #[error("failed to start cyclic worker: {0}")]
    StartFailed(String),

    /// The worker did not exit within the bounded join window and was force-terminated.
    #[error("cyclic worker did not exit within {0:?}, force-terminated")]
    ForcedTermination(std::time::Duration),

    /// The best-effort preflight releaser failed or timed out.
    #[error("preflight release failed: {0}")]
    PreflightFailed(String),

    /// Wraps an engine startup failure surfaced through the supervisor.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Convenience alias for Process Supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;

/// Error raised while loading or parsing `NetworkConfig`/`DriveConfig` from TOML.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading the configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse failure.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize failure (used by `to_toml`).
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Structural validation failure (e.g. duplicate bus positions).
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
