//! CLI entry point: loads configuration, builds the Master Adapter, applies
//! real-time process deployment, and runs the Process Supervisor until a
//! shutdown signal or `stop()` call tears the cyclic worker down.
//!
//! This binary doubles as the worker entry point for [`SpawnMode::Process`]:
//! invoked with `--worker-stdio`, it skips straight to
//! [`ecm_supervisor::process::run_worker_stdio`] instead of starting a
//! supervisor of its own.

mod signals;

use clap::Parser;
use ecm_common::config::NetworkConfig;
use ecm_fieldbus::esi::StaticEsiDecoder;
use ecm_fieldbus::master::MasterAdapter;
use ecm_runtime::realtime;
use ecm_supervisor::signal::ShutdownSignal;
use ecm_supervisor::{ProcessSupervisor, SpawnMode};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// EtherCAT fieldbus manager: drives CiA 402 motion controllers over a
/// fixed-rate PDO cycle.
#[derive(Parser, Debug)]
#[command(name = "ecm-daemon", about = "EtherCAT fieldbus manager daemon")]
struct Args {
    /// Path to the network configuration TOML file.
    #[arg(short, long, default_value = "config/network.toml")]
    config: PathBuf,

    /// Network interface to bind the real EtherCAT master to (requires the
    /// `soem` feature; without it the simulated transport is always used).
    #[arg(long)]
    interface: Option<String>,

    /// Run the cyclic worker directly as the child of a supervisor in
    /// process-isolation mode, reachable over stdio. Not for interactive use.
    #[arg(long, hide = true)]
    worker_stdio: bool,

    /// Isolate the cyclic worker in a child process instead of an OS thread.
    #[arg(long)]
    isolate_process: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    if args.worker_stdio {
        return run_worker_stdio(&args);
    }

    let config = load_config(&args.config)?;
    info!(drives = config.drives.len(), cycle_period = ?config.cycle_period, "loaded network configuration");

    let rt_status = realtime::init_realtime(&config.realtime);
    match &rt_status {
        Ok(status) => info!(?status, "real-time deployment applied"),
        Err(err) if config.realtime.fail_fast => {
            error!(error = %err, "real-time requirements not met, aborting (fail_fast)");
            return Err(anyhow::anyhow!("real-time setup failed: {err}"));
        }
        Err(err) => warn!(error = %err, "real-time requirements not met, continuing degraded"),
    }

    let adapter = build_adapter(&args, &config)?;
    let decoder = Box::new(StaticEsiDecoder);

    let mode = if args.isolate_process {
        let exe = std::env::current_exe().map_err(|e| anyhow::anyhow!("cannot resolve own executable: {e}"))?;
        SpawnMode::Process {
            exe: exe.into_os_string(),
            worker_args: vec![
                "--worker-stdio".into(),
                "--config".into(),
                args.config.display().to_string(),
                "--log-level".into(),
                args.log_level.clone(),
            ],
        }
    } else {
        SpawnMode::Thread
    };

    let mut supervisor = ProcessSupervisor::start(config, adapter, decoder, mode)
        .map_err(|e| anyhow::anyhow!("failed to start process supervisor: {e}"))?;

    // SIGTERM/SIGINT are owned by the supervisor's own ShutdownSignal,
    // installed inside `start`. This handler only tracks SIGHUP for
    // config-reload awareness, so the two never race to install a handler
    // for the same signal number.
    let handler = signals::SignalHandler::new()?;

    info!("fieldbus manager running, waiting for shutdown signal");
    while !supervisor.shutdown_requested() {
        if handler.take_reload_request() {
            warn!("SIGHUP received; configuration reload is not yet supported, ignoring");
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    info!("shutdown requested, stopping process supervisor");
    supervisor
        .stop()
        .map_err(|e| anyhow::anyhow!("process supervisor did not stop cleanly: {e}"))?;

    info!("fieldbus manager stopped");
    Ok(())
}

fn run_worker_stdio(args: &Args) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let adapter = build_adapter(args, &config)?;
    let decoder = StaticEsiDecoder;
    let shutdown = ShutdownSignal::new();
    shutdown.install();

    ecm_supervisor::process::run_worker_stdio(config, adapter, &decoder, shutdown)
        .map_err(|e| anyhow::anyhow!("worker exited with error: {e}"))
}

fn build_adapter(args: &Args, config: &NetworkConfig) -> anyhow::Result<MasterAdapter> {
    #[cfg(all(feature = "soem", target_os = "linux"))]
    {
        if let Some(interface) = &args.interface {
            let transport = ecm_fieldbus::master::SoemTransport::new(interface)
                .map_err(|e| anyhow::anyhow!("failed to open SOEM transport on {interface}: {e}"))?;
            return Ok(MasterAdapter::with_transport(Box::new(transport)));
        }
    }
    #[cfg(not(all(feature = "soem", target_os = "linux")))]
    if args.interface.is_some() {
        warn!("--interface given but the soem feature is not enabled; using the simulated transport");
    }

    let _ = &config.device_path;
    Ok(MasterAdapter::simulated())
}

fn load_config(path: &std::path::Path) -> anyhow::Result<NetworkConfig> {
    if path.exists() {
        NetworkConfig::from_file(path).map_err(|e| anyhow::anyhow!("failed to load {path:?}: {e}"))
    } else {
        warn!(path = %path.display(), "configuration file not found, using defaults");
        Ok(NetworkConfig::default())
    }
}

fn init_logging(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "{log_level},ecm_daemon={log_level},ecm_supervisor={log_level},ecm_runtime={log_level},ecm_fieldbus={log_level},ecm_handle={log_level}"
        ))
    });

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}
