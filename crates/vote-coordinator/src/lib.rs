//! Quorum-gated voting for high-impact commands.
//!
//! One global session slot: `Idle -> Open -> {Passed, Failed} -> Idle`.
//! The single slot is deliberate — concurrent votes on different
//! destructive actions would race each other against the shared VM.
//! Passed and Failed are transient; they are observable only as the
//! returned [`CastOutcome`] (Passed) or an [`ExpiredVote`] notification
//! (Failed), never as a resting state.
//!
//! The deadline is a spawned sleep task. Both the pass transition and
//! the expiry transition run under the coordinator lock and check the
//! session generation, so whichever is applied first wins and the loser
//! is a no-op.

use admission_queue::QueueProducer;
use command_grammar::{CommandKind, GatedCommand, Issuer, ParsedCommand};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Rejection: a session for a different gated command is already open.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("A vote on !{} is already in progress", .active)]
pub struct VoteInProgress {
    /// The command the open session is voting on.
    pub active: GatedCommand,
}

/// Result type for vote casts.
pub type CastResult = Result<CastOutcome, VoteInProgress>;

/// What a cast did, for the issuer-facing reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastOutcome {
    /// No session was open; this cast opened one.
    Opened {
        target: GatedCommand,
        quorum: usize,
        duration: Duration,
    },
    /// Counted toward the open session.
    Counted {
        target: GatedCommand,
        votes: usize,
        quorum: usize,
        remaining: Duration,
    },
    /// The caster had already voted; nothing changed.
    AlreadyCounted {
        target: GatedCommand,
        votes: usize,
        quorum: usize,
        remaining: Duration,
    },
    /// This cast reached quorum. The gated command was appended to the
    /// admission queue unless it was full at that instant.
    Passed {
        target: GatedCommand,
        votes: usize,
        admitted: bool,
        /// Everyone who voted, for vote-win credit.
        voters: Vec<String>,
    },
}

/// Emitted when a session's deadline elapses before quorum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredVote {
    pub target: GatedCommand,
    pub votes: usize,
    pub quorum: usize,
}

struct OpenSession {
    target: GatedCommand,
    /// Issuer of the opening message; a passed command executes and is
    /// attributed as theirs.
    opener: Issuer,
    raw: String,
    opened_at: Instant,
    voters: HashSet<String>,
    generation: u64,
    /// Absent only for a session that passes on its opening cast.
    deadline: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct State {
    session: Option<OpenSession>,
    next_generation: u64,
}

/// The coordinator. Shared as `Arc`; all transitions serialize on the
/// internal lock.
pub struct VoteCoordinator {
    quorum: usize,
    duration: Duration,
    queue: QueueProducer,
    expired_tx: mpsc::UnboundedSender<ExpiredVote>,
    state: Mutex<State>,
    /// Handed to deadline tasks; an expired weak reference means the
    /// coordinator is gone and the timer has nothing left to do.
    weak_self: Weak<Self>,
}

impl VoteCoordinator {
    /// Create a coordinator. Expiry notifications are delivered on the
    /// returned receiver; the dispatcher forwards them to chat.
    pub fn new(
        quorum: usize,
        duration: Duration,
        queue: QueueProducer,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ExpiredVote>) {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        let coordinator = Arc::new_cyclic(|weak_self| Self {
            quorum: quorum.max(1),
            duration,
            queue,
            expired_tx,
            state: Mutex::new(State::default()),
            weak_self: weak_self.clone(),
        });
        (coordinator, expired_rx)
    }

    /// Cast a vote for `target`, opening a session when none is open.
    ///
    /// Duplicate casts from the same user id are silent no-ops; a cast
    /// naming a different gated command while a session is open is
    /// rejected and does not start a new session.
    pub fn cast(&self, issuer: &Issuer, target: GatedCommand, raw: &str) -> CastResult {
        let mut state = self.state.lock().expect("vote coordinator lock poisoned");

        let Some(session) = state.session.as_mut() else {
            return Ok(self.open_session(&mut state, issuer, target, raw));
        };

        if session.target != target {
            debug!(
                active = %session.target,
                requested = %target,
                user_id = %issuer.user_id,
                "vote rejected, different session open"
            );
            return Err(VoteInProgress {
                active: session.target,
            });
        }

        let votes = session.voters.len();
        let remaining = self.duration.saturating_sub(session.opened_at.elapsed());

        if !session.voters.insert(issuer.user_id.clone()) {
            return Ok(CastOutcome::AlreadyCounted {
                target,
                votes,
                quorum: self.quorum,
                remaining,
            });
        }

        let votes = session.voters.len();
        debug!(target = %target, votes, quorum = self.quorum, user_id = %issuer.user_id, "vote counted");

        if votes >= self.quorum {
            let session = state.session.take().expect("session checked above");
            return Ok(self.pass_session(session));
        }

        Ok(CastOutcome::Counted {
            target,
            votes,
            quorum: self.quorum,
            remaining,
        })
    }

    /// Whether a session is currently open.
    pub fn is_open(&self) -> bool {
        self.state
            .lock()
            .expect("vote coordinator lock poisoned")
            .session
            .is_some()
    }

    fn open_session(
        &self,
        state: &mut State,
        issuer: &Issuer,
        target: GatedCommand,
        raw: &str,
    ) -> CastOutcome {
        let generation = state.next_generation;
        state.next_generation += 1;

        let mut voters = HashSet::new();
        voters.insert(issuer.user_id.clone());

        info!(
            target = %target,
            quorum = self.quorum,
            duration_secs = self.duration.as_secs(),
            opened_by = %issuer.user_id,
            "vote session opened"
        );

        // Single-voter quorum: the opening cast already passes.
        if self.quorum <= 1 {
            let session = OpenSession {
                target,
                opener: issuer.clone(),
                raw: raw.to_string(),
                opened_at: Instant::now(),
                voters,
                generation,
                deadline: None,
            };
            return self.pass_session(session);
        }

        let deadline = {
            let weak = self.weak_self.clone();
            let duration = self.duration;
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                if let Some(coordinator) = weak.upgrade() {
                    coordinator.expire(generation);
                }
            })
        };

        state.session = Some(OpenSession {
            target,
            opener: issuer.clone(),
            raw: raw.to_string(),
            opened_at: Instant::now(),
            voters,
            generation,
            deadline: Some(deadline),
        });

        CastOutcome::Opened {
            target,
            quorum: self.quorum,
            duration: self.duration,
        }
    }

    /// Passed: cancel the deadline, admit the gated command, reset to
    /// Idle (the slot was already cleared by the caller).
    fn pass_session(&self, session: OpenSession) -> CastOutcome {
        if let Some(deadline) = &session.deadline {
            deadline.abort();
        }

        let votes = session.voters.len();
        let command = ParsedCommand {
            name: session.target.as_str(),
            kind: CommandKind::PowerCycle {
                force: session.target == GatedCommand::ForceShutdown,
            },
            issuer: session.opener,
            raw: session.raw,
        };

        let admitted = match self.queue.try_enqueue(command) {
            Ok(()) => true,
            Err(err) => {
                warn!(target = %session.target, error = %err, "passed vote could not be admitted");
                false
            }
        };

        info!(target = %session.target, votes, admitted, "vote session passed");

        CastOutcome::Passed {
            target: session.target,
            votes,
            admitted,
            voters: session.voters.into_iter().collect(),
        }
    }

    /// Deadline fired. A no-op unless the session with this generation
    /// is still open (it may have passed in the meantime).
    fn expire(&self, generation: u64) {
        let mut state = self.state.lock().expect("vote coordinator lock poisoned");

        let still_open = state
            .session
            .as_ref()
            .is_some_and(|session| session.generation == generation);
        if !still_open {
            // The session passed (or was replaced) before the timer won
            // the race for the lock.
            return;
        }
        let expired = state.session.take().expect("session checked above");

        info!(
            target = %expired.target,
            votes = expired.voters.len(),
            quorum = self.quorum,
            "vote session expired without quorum"
        );

        let _ = self.expired_tx.send(ExpiredVote {
            target: expired.target,
            votes: expired.voters.len(),
            quorum: self.quorum,
        });
    }
}
