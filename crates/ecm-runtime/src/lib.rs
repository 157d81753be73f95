#![doc = "Cyclic execution engine for the EtherCAT fieldbus manager.\n\nHosts the Intent Model ([`intent`]), the Cyclic Engine ([`engine`]) that drives the\nEtherCAT PDO exchange and CiA 402 state machines once per bus cycle, the fault recorder\n([`fault_recorder`]) used for postmortem diagnostics, and the ambient real-time deployment\nhelpers ([`realtime`], [`watchdog`]) that the supervisor applies before handing the worker\nthread its cyclic duties."]

pub mod engine;
pub mod fault_recorder;
pub mod intent;
pub mod realtime;
pub mod watchdog;

pub use engine::{CycleOutcome, CyclicEngine, StatusPublisher};
pub use fault_recorder::{DriveSnapshot, FaultFrame, FaultRecorder, FaultSummary};
pub use intent::DriveIntent;
pub use realtime::{
    check_rt_capabilities, init_realtime, validate_rt_capabilities, RealtimeStatus,
    RtCapabilities,
};
pub use watchdog::{HardwareWatchdog, Watchdog};
