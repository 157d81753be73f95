//! The Process Supervisor: spawns the cyclic worker on `start`, hands out
//! the command producer and status consumer, and tears the worker down on
//! `stop` with a bounded join before force-terminating it.

use crate::process::ChildWorker;
use crate::queues::{self, CommandProducer};
use crate::signal::ShutdownSignal;
use crate::worker;
use crossbeam_channel::Receiver;
use ecm_common::config::NetworkConfig;
use ecm_common::error::{EngineError, SupervisorError, SupervisorResult};
use ecm_common::status::NetworkStatus;
use ecm_fieldbus::esi::EsiDecoder;
use ecm_fieldbus::master::MasterAdapter;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// How the cyclic worker is isolated from the application process.
pub enum SpawnMode {
    /// The worker runs as an OS thread inside this process. The master
    /// handle, domain buffer and intent table never leave that thread.
    Thread,
    /// The worker runs as a child process of `exe`, invoked with
    /// `worker_args`, reachable over newline-delimited JSON on stdio. Use
    /// this for deployments that want OS-level fault containment: a panic
    /// or crash in the worker cannot take down the application process.
    Process {
        /// Path to the executable to launch as the worker.
        exe: std::ffi::OsString,
        /// Arguments that put that executable into worker mode.
        worker_args: Vec<String>,
    },
}

enum RunningWorker {
    Thread(JoinHandle<SupervisorResult<()>>),
    Process(ChildWorker),
}

/// Owns the running cyclic worker (however it is spawned) and the queues
/// used to reach it.
pub struct ProcessSupervisor {
    command_tx: CommandProducer,
    status_rx: Receiver<NetworkStatus>,
    shutdown: ShutdownSignal,
    join_timeout: Duration,
    worker: Option<RunningWorker>,
}

impl ProcessSupervisor {
    /// Start the cyclic worker in the requested spawn mode.
    ///
    /// Installs SIGTERM/SIGINT handlers that set the shared shutdown flag
    /// the worker checks once per cycle; `stop` can also be called directly
    /// without waiting for a signal.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::StartFailed`] if the worker thread or
    /// child process cannot be spawned. For thread mode, a startup failure
    /// inside the cyclic engine itself (bad config, slave never reached OP,
    /// missing PDO) surfaces the first time [`ProcessSupervisor::stop`] is
    /// called and the thread is joined; callers that need to observe it
    /// immediately should prefer a short `join_timeout` and check the
    /// returned error.
    pub fn start(
        config: NetworkConfig,
        adapter: MasterAdapter,
        decoder: Box<dyn EsiDecoder>,
        mode: SpawnMode,
    ) -> SupervisorResult<Self> {
        let join_timeout = config.shutdown_join_timeout;
        let shutdown = ShutdownSignal::new();
        shutdown.install();

        let queues = queues::build(&config);
        let command_tx = queues.command_tx;
        let status_rx = queues.status_rx;

        let worker = match mode {
            SpawnMode::Thread => {
                let worker_shutdown = shutdown.clone();
                let command_rx = queues.command_rx;
                let status_publisher = queues.status_publisher;
                let handle = std::thread::Builder::new()
                    .name("ecm-cyclic-worker".into())
                    .spawn(move || {
                        worker::run(config, adapter, decoder.as_ref(), command_rx, status_publisher, worker_shutdown)
                    })
                    .map_err(|e| SupervisorError::StartFailed(format!("spawn worker thread failed: {e}")))?;
                RunningWorker::Thread(handle)
            }
            SpawnMode::Process { exe, worker_args } => {
                let args: Vec<&str> = worker_args.iter().map(String::as_str).collect();
                let child = ChildWorker::spawn(&exe, &args, queues.command_rx, queues.status_publisher)?;
                RunningWorker::Process(child)
            }
        };

        info!("process supervisor started cyclic worker");
        Ok(Self { command_tx, status_rx, shutdown, join_timeout, worker: Some(worker) })
    }

    /// Producer handle for enqueueing commands to the worker.
    #[must_use]
    pub fn command_producer(&self) -> CommandProducer {
        self.command_tx.clone()
    }

    /// Consumer handle for the worker's published status snapshots.
    #[must_use]
    pub fn status_receiver(&self) -> Receiver<NetworkStatus> {
        self.status_rx.clone()
    }

    /// Whether shutdown has been requested, by the installed SIGTERM/SIGINT
    /// handlers or by a prior call to [`ProcessSupervisor::stop`]. Lets a
    /// caller block on the same flag the worker checks instead of installing
    /// a second, competing signal handler.
    #[must_use]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.requested()
    }

    /// Request shutdown, join the worker within the configured bounded
    /// window, and force-terminate it if it does not exit in time.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::ForcedTermination`] if the worker did not
    /// exit within the join window. Returns any engine startup/runtime
    /// error the worker itself reported.
    pub fn stop(&mut self) -> SupervisorResult<()> {
        self.shutdown.request();
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        match worker {
            RunningWorker::Thread(handle) => self.join_thread(handle),
            RunningWorker::Process(child) => self.join_process(child),
        }
    }

    fn join_thread(&self, handle: JoinHandle<SupervisorResult<()>>) -> SupervisorResult<()> {
        let deadline = Instant::now() + self.join_timeout;
        while !handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }

        if !handle.is_finished() {
            warn!("cyclic worker did not exit within join window, abandoning thread");
            return Err(SupervisorError::ForcedTermination(self.join_timeout));
        }

        match handle.join() {
            Ok(result) => result,
            Err(_) => Err(SupervisorError::Engine(EngineError::Config("cyclic worker thread panicked".into()))),
        }
    }

    fn join_process(&self, mut child: ChildWorker) -> SupervisorResult<()> {
        let deadline = Instant::now() + self.join_timeout;
        while !child.has_exited() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }

        if child.has_exited() {
            return Ok(());
        }

        warn!("cyclic worker process did not exit within join window, force-terminating");
        let _ = child.terminate();
        Err(SupervisorError::ForcedTermination(self.join_timeout))
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecm_common::config::NetworkConfig;
    use ecm_common::Command;
    use ecm_common::command::CommandKind;
    use ecm_fieldbus::esi::StaticEsiDecoder;
    use std::time::Duration as StdDuration;

    fn single_drive_config() -> NetworkConfig {
        let mut config = NetworkConfig::default();
        config.cycle_period = StdDuration::from_millis(5);
        config.op_timeout = StdDuration::from_millis(200);
        config.shutdown_join_timeout = StdDuration::from_secs(1);
        config.drives = vec![ecm_common::config::DriveConfig::default()];
        config
    }

    #[test]
    fn thread_mode_starts_accepts_commands_and_stops_cleanly() {
        let config = single_drive_config();
        let adapter = MasterAdapter::simulated();

        let mut supervisor =
            ProcessSupervisor::start(config, adapter, Box::new(StaticEsiDecoder), SpawnMode::Thread).unwrap();

        let producer = supervisor.command_producer();
        producer.enqueue(Command { drive: 0, kind: CommandKind::SetVelocityMode }).unwrap();

        let _status_rx = supervisor.status_receiver();
        std::thread::sleep(StdDuration::from_millis(100));

        supervisor.stop().unwrap();
    }
}
