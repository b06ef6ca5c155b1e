//! Bounded FIFO admission queue between the dispatcher and the executor.
//!
//! The queue is the only synchronization boundary between accepting
//! commands and performing them: producers never block on actuator
//! latency, and the single consumer drains in strict arrival order.
//! Capacity is fixed at construction; an enqueue against a full queue is
//! rejected outright and mutates nothing.

use command_grammar::ParsedCommand;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// An admitted command awaiting execution.
#[derive(Debug)]
pub struct QueueItem {
    pub command: ParsedCommand,
    pub enqueued_at: Instant,
}

/// Admission error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// The queue is at capacity.
    #[error("Queue full ({capacity} commands waiting), try again later")]
    QueueFull { capacity: usize },

    /// The consumer is gone; the daemon is shutting down.
    #[error("Queue closed")]
    Closed,
}

/// Result type for admission operations.
pub type AdmissionResult<T> = Result<T, AdmissionError>;

/// Create a bounded queue pair with the given capacity.
pub fn bounded(capacity: usize) -> (QueueProducer, QueueConsumer) {
    assert!(capacity > 0, "admission queue capacity must be at least 1");
    let (tx, rx) = mpsc::channel(capacity);
    (
        QueueProducer { tx, capacity },
        QueueConsumer { rx },
    )
}

/// Producer half, shared by the dispatcher and the vote coordinator.
#[derive(Clone)]
pub struct QueueProducer {
    tx: mpsc::Sender<QueueItem>,
    capacity: usize,
}

impl QueueProducer {
    /// Append a command, or reject without side effects when full.
    pub fn try_enqueue(&self, command: ParsedCommand) -> AdmissionResult<()> {
        let item = QueueItem {
            command,
            enqueued_at: Instant::now(),
        };
        match self.tx.try_send(item) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(item)) => {
                debug!(
                    command = item.command.name,
                    user_id = %item.command.issuer.user_id,
                    capacity = self.capacity,
                    "admission rejected, queue full"
                );
                Err(AdmissionError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Closed(_)) => Err(AdmissionError::Closed),
        }
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Consumer half, owned exclusively by the executor.
pub struct QueueConsumer {
    rx: mpsc::Receiver<QueueItem>,
}

impl QueueConsumer {
    /// Wait for the next item in FIFO order. Returns `None` only after
    /// every producer has been dropped and the queue has drained,
    /// which is the executor's signal to exit.
    pub async fn dequeue(&mut self) -> Option<QueueItem> {
        self.rx.recv().await
    }

    /// Take the next item without waiting. Used by the shutdown drain,
    /// where an empty queue means done rather than wait-for-more.
    pub fn try_dequeue(&mut self) -> Option<QueueItem> {
        self.rx.try_recv().ok()
    }
}
