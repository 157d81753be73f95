#![doc = "Drive Handle: the non-blocking application-facing facade for one drive.\n\nEvery mutating call enqueues a [`ecm_common::Command`] and returns immediately;\nnone of them wait for the wire. Read-only getters are served from a\nthrottled local cache of the last status snapshot the Cyclic Engine\npublished, refreshed at most once per `cache_ttl` so a tight polling loop\nin the application does not pay a channel-drain cost every call."]

use crossbeam_channel::Receiver;
use ecm_common::command::{CommandKind, ProbeEdge};
use ecm_common::error::{EngineError, LastFailureKind};
use ecm_common::status::{DriveStatus, NetworkStatus};
use ecm_common::Command;
use ecm_supervisor::CommandProducer;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default cache refresh throttle, matching the status publish cadence's
/// order of magnitude without re-reading the channel every call.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(20);

struct Cache {
    refreshed_at: Option<Instant>,
    status: Option<DriveStatus>,
}

/// Non-blocking facade for one drive, backed by a command producer and a
/// status consumer shared with the rest of the network.
pub struct DriveHandle {
    position: u16,
    commands: CommandProducer,
    status_rx: Receiver<NetworkStatus>,
    cache: Mutex<Cache>,
    cache_ttl: Duration,
}

impl DriveHandle {
    /// Build a handle for the drive at `position`, reachable through
    /// `commands` and observing status via `status_rx`.
    #[must_use]
    pub fn new(position: u16, commands: CommandProducer, status_rx: Receiver<NetworkStatus>) -> Self {
        Self {
            position,
            commands,
            status_rx,
            cache: Mutex::new(Cache { refreshed_at: None, status: None }),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Override the cache refresh throttle (mainly for tests).
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Bus position this handle addresses.
    #[must_use]
    pub fn position(&self) -> u16 {
        self.position
    }

    fn enqueue(&self, kind: CommandKind) -> Result<(), EngineError> {
        self.commands.enqueue(Command { drive: self.position, kind })
    }

    /// Switch to Profile Velocity mode.
    ///
    /// # Errors
    /// Returns [`EngineError::CommandQueueOverflow`] if the command queue is full.
    pub fn set_velocity_mode(&self) -> Result<(), EngineError> {
        self.enqueue(CommandKind::SetVelocityMode)
    }

    /// Switch to Profile Position mode.
    ///
    /// # Errors
    /// Returns [`EngineError::CommandQueueOverflow`] if the command queue is full.
    pub fn set_position_mode(&self) -> Result<(), EngineError> {
        self.enqueue(CommandKind::SetPositionMode)
    }

    /// Switch to Cyclic Synchronous Position mode.
    ///
    /// # Errors
    /// Returns [`EngineError::CommandQueueOverflow`] if the command queue is full.
    pub fn set_csp_mode(&self) -> Result<(), EngineError> {
        self.enqueue(CommandKind::SetCspMode)
    }

    /// Switch to Homing mode.
    ///
    /// # Errors
    /// Returns [`EngineError::CommandQueueOverflow`] if the command queue is full.
    pub fn set_homing_mode(&self) -> Result<(), EngineError> {
        self.enqueue(CommandKind::SetHomingMode)
    }

    /// Set the velocity intent, in user units.
    ///
    /// # Errors
    /// Returns [`EngineError::CommandQueueOverflow`] if the command queue is full.
    pub fn set_velocity(&self, velocity: f64) -> Result<(), EngineError> {
        self.enqueue(CommandKind::SetVelocity(velocity))
    }

    /// Set the Profile Position absolute target, in user units.
    ///
    /// # Errors
    /// Returns [`EngineError::CommandQueueOverflow`] if the command queue is full.
    pub fn set_position_absolute(&self, position: f64) -> Result<(), EngineError> {
        self.enqueue(CommandKind::SetPositionAbsolute(position))
    }

    /// Set the Cyclic Synchronous Position target, in user units.
    ///
    /// # Errors
    /// Returns [`EngineError::CommandQueueOverflow`] if the command queue is full.
    pub fn set_position_csp(&self, position: f64) -> Result<(), EngineError> {
        self.enqueue(CommandKind::SetPositionCsp(position))
    }

    /// Arm the touch probe for the given edge.
    ///
    /// # Errors
    /// Returns [`EngineError::CommandQueueOverflow`] if the command queue is full.
    pub fn arm_probe(&self, edge: ProbeEdge) -> Result<(), EngineError> {
        self.enqueue(CommandKind::ArmProbe(edge))
    }

    /// Disable the touch probe.
    ///
    /// # Errors
    /// Returns [`EngineError::CommandQueueOverflow`] if the command queue is full.
    pub fn disable_probe(&self) -> Result<(), EngineError> {
        self.enqueue(CommandKind::DisableProbe)
    }

    /// Request a CiA 402 fault-reset edge on the next cycle.
    ///
    /// # Errors
    /// Returns [`EngineError::CommandQueueOverflow`] if the command queue is full.
    pub fn clear_fault(&self) -> Result<(), EngineError> {
        self.enqueue(CommandKind::ClearFault)
    }

    /// Start the configured homing sequence.
    ///
    /// # Errors
    /// Returns [`EngineError::CommandQueueOverflow`] if the command queue is full.
    pub fn start_homing(&self) -> Result<(), EngineError> {
        self.enqueue(CommandKind::StartHoming)
    }

    /// The most recent status for this drive, refreshing the cache from the
    /// status queue if it is older than `cache_ttl`. Never blocks: a cache
    /// miss with no status published yet returns `None`.
    #[must_use]
    pub fn status(&self) -> Option<DriveStatus> {
        let mut cache = self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let needs_refresh = match cache.refreshed_at {
            Some(at) => at.elapsed() >= self.cache_ttl,
            None => true,
        };

        if needs_refresh {
            if let Some(latest) = self.status_rx.try_iter().last() {
                cache.status = latest.drive(self.position).cloned();
            }
            cache.refreshed_at = Some(Instant::now());
        }

        cache.status.clone()
    }

    /// Actual position (0x6064), in user units, or `None` if no status has
    /// been observed yet.
    #[must_use]
    pub fn position_actual(&self) -> Option<f64> {
        self.status().map(|s| s.position_actual)
    }

    /// Actual velocity (0x606C), in user units/s.
    #[must_use]
    pub fn velocity_actual(&self) -> Option<f64> {
        self.status().map(|s| s.velocity_actual)
    }

    /// Whether the active mode intent has been verified against 0x6061.
    #[must_use]
    pub fn mode_verified(&self) -> Option<bool> {
        self.status().map(|s| s.mode_verified)
    }

    /// Most recent per-drive failure kind recorded by the engine.
    #[must_use]
    pub fn last_failure(&self) -> Option<LastFailureKind> {
        self.status().map(|s| s.last_failure)
    }

    /// Drive-reported fault code, if the drive is currently in FAULT.
    #[must_use]
    pub fn fault_code(&self) -> Option<u16> {
        self.status().and_then(|s| s.fault_code)
    }

    /// Whether the touch probe is currently armed/active.
    #[must_use]
    pub fn probe_active(&self) -> Option<bool> {
        self.status().map(|s| s.probe_active)
    }

    /// Raw digital inputs word (0x60FD).
    #[must_use]
    pub fn digital_inputs(&self) -> Option<u32> {
        self.status().map(|s| s.digital_inputs)
    }
}
