//! Child-process isolation mode: the cyclic worker runs in its own process,
//! reachable over its stdin/stdout as newline-delimited JSON frames of
//! [`Command`] and [`NetworkStatus`]. This gives the same bounded-queue
//! semantics as thread mode (the forwarding threads here enforce the
//! identical capacity and overflow policy), just carried across a process
//! boundary instead of an in-memory channel.
//!
//! The worker side of this protocol is [`run_worker_stdio`], which a binary
//! entry point calls when launched in worker mode; the supervisor side is
//! [`ChildWorker::spawn`].

use crate::signal::ShutdownSignal;
use crossbeam_channel::Receiver;
use ecm_common::config::NetworkConfig;
use ecm_common::error::{SupervisorError, SupervisorResult};
use ecm_common::status::NetworkStatus;
use ecm_common::Command;
use ecm_fieldbus::esi::EsiDecoder;
use ecm_fieldbus::master::MasterAdapter;
use ecm_runtime::StatusPublisher;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command as OsCommand, Stdio};
use std::thread::JoinHandle;
use tracing::warn;

/// A cyclic worker running as a child process, reachable over stdio.
pub struct ChildWorker {
    child: Child,
    stdin_forwarder: Option<JoinHandle<()>>,
    stdout_forwarder: Option<JoinHandle<()>>,
}

impl ChildWorker {
    /// Spawn `exe` with `worker_args`, wiring its stdin/stdout to the given
    /// command receiver and status publisher via two forwarding threads.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::StartFailed`] if the child cannot be spawned.
    pub fn spawn(
        exe: &std::ffi::OsStr,
        worker_args: &[&str],
        command_rx: Receiver<Command>,
        status_publisher: StatusPublisher,
    ) -> SupervisorResult<Self> {
        let mut child = OsCommand::new(exe)
            .args(worker_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| SupervisorError::StartFailed(format!("spawn {exe:?} failed: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SupervisorError::StartFailed("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SupervisorError::StartFailed("child stdout unavailable".into()))?;

        let stdin_forwarder = std::thread::Builder::new()
            .name("ecm-supervisor-stdin".into())
            .spawn(move || {
                for command in command_rx.iter() {
                    let Ok(line) = serde_json::to_string(&command) else {
                        continue;
                    };
                    if writeln!(stdin, "{line}").is_err() {
                        break;
                    }
                }
            })
            .ok();

        let stdout_forwarder = std::thread::Builder::new()
            .name("ecm-supervisor-stdout".into())
            .spawn(move || {
                let reader = BufReader::new(stdout);
                for line in reader.lines() {
                    let Ok(line) = line else { break };
                    match serde_json::from_str::<NetworkStatus>(&line) {
                        Ok(status) => status_publisher.publish(status),
                        Err(err) => warn!(error = %err, "malformed status frame from child worker"),
                    }
                }
            })
            .ok();

        Ok(Self { child, stdin_forwarder, stdout_forwarder })
    }

    /// Send SIGTERM (Unix) or kill the process, then wait for exit.
    pub fn terminate(&mut self) -> std::io::Result<()> {
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }

    /// Whether the child has already exited.
    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }
}

impl Drop for ChildWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.stdin_forwarder.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.stdout_forwarder.take() {
            let _ = handle.join();
        }
    }
}

/// Worker-side entry point for child-process mode: run startup, then read
/// `Command` frames from stdin and write `NetworkStatus` frames to stdout
/// until `shutdown` is observed or a fatal error occurs.
///
/// # Errors
///
/// Propagates startup and fatal runtime errors, same as thread mode.
pub fn run_worker_stdio(
    config: NetworkConfig,
    adapter: MasterAdapter,
    decoder: &dyn EsiDecoder,
    shutdown: ShutdownSignal,
) -> SupervisorResult<()> {
    let (command_tx, command_rx) = crossbeam_channel::bounded(config.command_queue_capacity.max(1));
    let (status_publisher, status_rx) = StatusPublisher::new(config.status_queue_capacity);

    let stdin_reader = std::thread::Builder::new()
        .name("ecm-worker-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match serde_json::from_str::<Command>(&line) {
                    Ok(command) => {
                        if command_tx.try_send(command).is_err() {
                            warn!("worker command queue full, dropping frame");
                        }
                    }
                    Err(err) => warn!(error = %err, "malformed command frame on stdin"),
                }
            }
        });

    let stdout_writer = std::thread::Builder::new()
        .name("ecm-worker-stdout".into())
        .spawn(move || {
            let mut stdout = std::io::stdout();
            for status in status_rx.iter() {
                let Ok(line) = serde_json::to_string(&status) else {
                    continue;
                };
                if writeln!(stdout, "{line}").is_err() {
                    break;
                }
            }
        });

    let result = crate::worker::run(config, adapter, decoder, command_rx, status_publisher, shutdown);

    if let Ok(handle) = stdin_reader {
        let _ = handle.join();
    }
    if let Ok(handle) = stdout_writer {
        let _ = handle.join();
    }

    result
}
