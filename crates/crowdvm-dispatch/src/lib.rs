//! Dispatcher and executor loops wiring the command pipeline.
//!
//! Two independently scheduled activities run for the daemon's lifetime:
//!
//! - the **inbound loop** pulls message batches from the chat channel
//!   and feeds each through parse -> rate limit / vote gate -> admission;
//! - the **executor loop** drains the admission queue one item at a time
//!   against the control surface.
//!
//! They communicate only through the bounded queue, so accepting
//! commands never blocks on actuator latency. A relay loop forwards
//! executor outcomes and vote expiries back to chat.

mod dispatcher;
mod executor;
mod outcome;
mod replies;

#[cfg(test)]
mod tests;

pub use dispatcher::Dispatcher;
pub use executor::{Executor, ExecutorSettings};
pub use outcome::{ExecutionOutcome, OutcomeStatus};
