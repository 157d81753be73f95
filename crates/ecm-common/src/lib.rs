#![doc = "Shared types for the EtherCAT cyclic manager workspace: configuration, error taxonomy, the CiA 402 power-state table, command/status wire types, and cycle-timing metrics."]

pub mod command;
pub mod config;
pub mod error;
pub mod metrics;
pub mod state;
pub mod status;

pub use command::*;
pub use config::*;
pub use error::*;
pub use metrics::*;
pub use state::*;
pub use status::*;
