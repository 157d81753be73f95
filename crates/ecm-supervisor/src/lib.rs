#![doc = "Process Supervisor for the EtherCAT cyclic manager.\n\nSpawns the cyclic worker ([`worker`]) either as an OS thread or as a child\nprocess reachable over stdio ([`process`]), owns the bounded command and\nstatus queues ([`queues`]) the worker is reached through, and coordinates\ncooperative shutdown via a shared flag ([`signal`]) with a bounded join\nbefore force-terminating a worker that does not exit in time."]

pub mod process;
pub mod queues;
pub mod signal;
pub mod supervisor;
pub mod worker;

pub use process::ChildWorker;
pub use queues::CommandProducer;
pub use signal::ShutdownSignal;
pub use supervisor::{ProcessSupervisor, SpawnMode};
