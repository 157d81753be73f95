//! The two bounded transport queues the cyclic worker is reachable through.
//!
//! Command queue: capacity from [`NetworkConfig::command_queue_capacity`],
//! overflow policy = error, so a producer can detect backpressure instead of
//! silently stalling the worker. Status queue: built by
//! [`ecm_runtime::StatusPublisher`], capacity from
//! [`NetworkConfig::status_queue_capacity`], overflow policy = drop-oldest.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use ecm_common::config::NetworkConfig;
use ecm_common::error::EngineError;
use ecm_common::Command;
use ecm_runtime::StatusPublisher;

/// Producer handle for the command queue. Cheap to clone; every clone
/// shares the same bounded channel.
#[derive(Clone)]
pub struct CommandProducer {
    tx: Sender<Command>,
}

impl CommandProducer {
    /// Enqueue a command. Returns [`EngineError::CommandQueueOverflow`] if
    /// the queue is full; the worker never blocks to make room.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue is full or the worker has shut down.
    pub fn enqueue(&self, command: Command) -> Result<(), EngineError> {
        match self.tx.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(EngineError::CommandQueueOverflow),
            Err(TrySendError::Disconnected(_)) => Err(EngineError::CommandQueueOverflow),
        }
    }
}

/// Both ends of the command and status queues, wired at worker startup.
pub struct Queues {
    /// Consumer end handed to the cyclic worker's `run_cycle` loop.
    pub command_rx: Receiver<Command>,
    /// Producer end handed out to callers (the Drive Handle, the supervisor).
    pub command_tx: CommandProducer,
    /// Status publisher handed to the cyclic worker.
    pub status_publisher: StatusPublisher,
    /// Status consumer handed out to callers.
    pub status_rx: Receiver<ecm_common::status::NetworkStatus>,
}

/// Build the command and status queues for one network, sized per config.
#[must_use]
pub fn build(config: &NetworkConfig) -> Queues {
    let (command_tx, command_rx) = crossbeam_channel::bounded(config.command_queue_capacity.max(1));
    let (status_publisher, status_rx) = StatusPublisher::new(config.status_queue_capacity);

    Queues {
        command_rx,
        command_tx: CommandProducer { tx: command_tx },
        status_publisher,
        status_rx,
    }
}
