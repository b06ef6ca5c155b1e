//! Execution outcomes, produced by the executor and consumed by the
//! dispatcher's relay loop.

use command_grammar::ParsedCommand;

/// How a queued command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// The control surface operation completed.
    Succeeded,
    /// The VM was down; it was started and the operation retried once,
    /// and the retry also failed.
    FailedRecoverable,
    /// Timeout or actuator-reported error. The item is abandoned and
    /// the loop moves on.
    FailedFatal,
}

/// Outcome of one queue item.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub command: ParsedCommand,
    pub status: OutcomeStatus,
    /// Issuer-facing text for the chat reply.
    pub message: String,
}

impl ExecutionOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == OutcomeStatus::Succeeded
    }
}
