//! The cyclic worker: the body a spawned thread (or child process) runs.
//!
//! Isolated here so both spawn modes in [`crate::supervisor`] share exactly
//! one implementation of "run startup, then loop `run_cycle` until told to
//! stop". The worker owns the Master Adapter, the intent table and the
//! PDO offset map for its entire lifetime; nothing else touches them.

use crate::signal::ShutdownSignal;
use crossbeam_channel::Receiver;
use ecm_common::config::NetworkConfig;
use ecm_common::error::SupervisorResult;
use ecm_common::Command;
use ecm_fieldbus::esi::EsiDecoder;
use ecm_fieldbus::master::MasterAdapter;
use ecm_runtime::{CyclicEngine, StatusPublisher};
use tracing::{error, info, warn};

/// Run the cyclic worker to completion: startup, then the per-cycle loop
/// until `shutdown` is observed, then teardown.
///
/// Returns once the loop has exited, having released the master. Startup
/// failures are returned immediately without entering the loop.
///
/// # Errors
///
/// Propagates [`ecm_common::error::EngineError`] (wrapped) from startup.
/// A fatal runtime error also exits the loop and is returned; per-drive
/// errors are recorded in status by the engine and never reach here.
pub fn run(
    config: NetworkConfig,
    adapter: MasterAdapter,
    decoder: &dyn EsiDecoder,
    commands: Receiver<Command>,
    status: StatusPublisher,
    shutdown: ShutdownSignal,
) -> SupervisorResult<()> {
    let mut engine = CyclicEngine::startup(config, adapter, decoder)?;
    info!("cyclic worker entering run loop");

    loop {
        if shutdown.requested() {
            break;
        }

        match engine.run_cycle(&commands, &status) {
            Ok(outcome) if outcome.overrun => {
                warn!(cycle = outcome.cycle, "cycle deadline overrun");
            }
            Ok(_) => {}
            Err(err) => {
                error!(error = %err, "cyclic worker exiting on fatal error");
                let _ = engine.shutdown();
                return Err(err.into());
            }
        }
    }

    info!("cyclic worker stopping, releasing master");
    engine.shutdown()?;
    Ok(())
}
