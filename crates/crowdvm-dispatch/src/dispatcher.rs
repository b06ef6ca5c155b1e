//! The dispatcher: message intake, admission, and reply relay.

use crate::outcome::ExecutionOutcome;
use crate::replies;
use admission_queue::{AdmissionError, QueueProducer};
use command_grammar::{CommandKind, CommandTable, Issuer, ParsedCommand};
use crowdvm_core::{ChannelError, ChatChannel, Config, IncomingMessage, Visibility};
use rate_limiter::RateLimiter;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use user_store::UserStore;
use vote_coordinator::{CastOutcome, ExpiredVote, VoteCoordinator};

/// Pause after a failed poll before trying again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Pause after a credentials rejection. The channel keeps being polled —
/// an operator may fix the token out of band — but slowly.
const AUTH_ERROR_BACKOFF: Duration = Duration::from_secs(60);

/// Shared command intake, consulted by the inbound loop for every
/// message, and owner of the admission path.
pub struct Dispatcher {
    config: Config,
    table: CommandTable,
    limiter: RateLimiter,
    votes: Arc<VoteCoordinator>,
    queue: QueueProducer,
    users: Arc<UserStore>,
    channel: Arc<dyn ChatChannel>,
    banned: Mutex<HashSet<String>>,
    started_at: Instant,
}

impl Dispatcher {
    pub fn new(
        config: Config,
        channel: Arc<dyn ChatChannel>,
        users: Arc<UserStore>,
        queue: QueueProducer,
        votes: Arc<VoteCoordinator>,
    ) -> Self {
        let mut limiter = RateLimiter::new(config.user_cooldown(), config.command_cooldown());
        // Query commands are cheap but chatty; pace them globally.
        limiter.set_command_interval("leaderboard", Duration::from_secs(15));
        limiter.set_command_interval("stats", Duration::from_secs(10));
        limiter.set_command_interval("uptime", Duration::from_secs(10));

        Self {
            table: CommandTable::from_config(&config),
            limiter,
            votes,
            queue,
            users,
            channel,
            banned: Mutex::new(HashSet::new()),
            started_at: Instant::now(),
            config,
        }
    }

    /// Spawn the inbound loop: poll batches and dispatch until told to
    /// stop. Stopping this loop first is the shutdown contract — the
    /// executor drains only what was admitted before the signal.
    pub fn spawn_inbound(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("inbound loop started");
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    polled = self.channel.poll() => match polled {
                        Ok(batch) => {
                            for message in batch {
                                self.handle_message(message).await;
                            }
                        }
                        Err(ChannelError::Unauthorized(reason)) => {
                            error!(%reason, "chat channel rejected credentials");
                            tokio::time::sleep(AUTH_ERROR_BACKOFF).await;
                        }
                        Err(err) => {
                            warn!(error = %err, "chat poll failed");
                            tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                        }
                    }
                }
            }
            info!("inbound loop stopped");
        })
    }

    /// Spawn the relay loop: forward executor outcomes and vote expiries
    /// to chat. Exits when the outcome stream closes (executor done).
    pub fn spawn_relay(
        self: Arc<Self>,
        mut outcomes: mpsc::UnboundedReceiver<ExecutionOutcome>,
        mut expired: mpsc::UnboundedReceiver<ExpiredVote>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outcome = outcomes.recv() => match outcome {
                        Some(outcome) => self.handle_outcome(outcome).await,
                        None => break,
                    },
                    Some(expired) = expired.recv() => {
                        self.announce(replies::vote_expired(
                            expired.target,
                            expired.votes,
                            expired.quorum,
                        ))
                        .await;
                    }
                }
            }
            debug!("relay loop stopped");
        })
    }

    /// Run one message through the pipeline. Admission-stage rejections
    /// are reported here, synchronously and once.
    pub async fn handle_message(&self, message: IncomingMessage) {
        if self.is_banned(&message.user_id) {
            debug!(user_id = %message.user_id, "dropped message from banned user");
            return;
        }

        let issuer = Issuer {
            user_id: message.user_id.clone(),
            display_name: message.display_name.clone(),
            is_admin: message.is_admin || self.config.is_admin(&message.user_id),
        };

        let command = match self.table.parse(&message.text, &issuer) {
            None => return, // ordinary chat, not a command
            Some(Err(err)) => {
                self.reply_to(&issuer, err.to_string()).await;
                return;
            }
            Some(Ok(command)) => command,
        };

        match &command.kind {
            CommandKind::Vote { target } => self.handle_vote(&command, *target).await,
            CommandKind::Ban { user_id } => {
                self.banned.lock().expect("ban list lock poisoned").insert(user_id.clone());
                info!(banned = %user_id, by = %issuer.user_id, "user banned");
                self.announce(format!("🚫 {user_id} is banned from commands")).await;
            }
            CommandKind::Unban { user_id } => {
                self.banned.lock().expect("ban list lock poisoned").remove(user_id);
                info!(unbanned = %user_id, by = %issuer.user_id, "user unbanned");
                self.announce(format!("✅ {user_id} may use commands again")).await;
            }
            kind if kind.is_query() => self.handle_query(&command).await,
            _ => self.admit(command).await,
        }
    }

    /// Non-gated actuator command: rate limit, then enqueue.
    async fn admit(&self, command: ParsedCommand) {
        let issuer = command.issuer.clone();
        if let Err(err) = self.limiter.check_and_record(
            &issuer.user_id,
            command.name,
            Instant::now(),
            issuer.is_admin,
        ) {
            self.reply_to(&issuer, format!("⏳ {err}")).await;
            return;
        }

        match self.queue.try_enqueue(command) {
            Ok(()) => {}
            Err(err @ AdmissionError::QueueFull { .. }) => {
                self.reply_to(&issuer, format!("⚠️ {err}")).await;
            }
            Err(AdmissionError::Closed) => {
                debug!("admission after queue close, daemon is stopping");
            }
        }
    }

    async fn handle_vote(&self, command: &ParsedCommand, target: command_grammar::GatedCommand) {
        let issuer = &command.issuer;

        // Only the session-opening message consumes a cooldown slot;
        // joining an open vote is free.
        if !self.votes.is_open() {
            if let Err(err) = self.limiter.check_and_record(
                &issuer.user_id,
                target.as_str(),
                Instant::now(),
                issuer.is_admin,
            ) {
                self.reply_to(issuer, format!("⏳ {err}")).await;
                return;
            }
        }

        match self.votes.cast(issuer, target, &command.raw) {
            Err(err) => self.reply_to(issuer, format!("❌ {err}")).await,
            Ok(CastOutcome::Opened { target, quorum, duration }) => {
                self.users.record_vote_cast(&issuer.user_id, &issuer.display_name);
                self.announce(replies::vote_opened(target, quorum, duration)).await;
            }
            Ok(CastOutcome::Counted { target, votes, quorum, remaining }) => {
                self.users.record_vote_cast(&issuer.user_id, &issuer.display_name);
                self.reply_to(issuer, replies::vote_counted(target, votes, quorum, remaining))
                    .await;
            }
            Ok(CastOutcome::AlreadyCounted { target, votes, quorum, .. }) => {
                self.reply_to(issuer, replies::vote_already_counted(target, votes, quorum))
                    .await;
            }
            Ok(CastOutcome::Passed { target, votes, admitted, voters }) => {
                self.users.record_vote_cast(&issuer.user_id, &issuer.display_name);
                for voter in &voters {
                    self.users.record_vote_won(voter, self.config.points_per_vote_win);
                }
                if admitted {
                    self.announce(replies::vote_passed(target, votes)).await;
                } else {
                    self.announce(replies::vote_passed_not_admitted(target)).await;
                }
            }
        }
    }

    /// Queries touch no actuator; answer in place, never queue.
    async fn handle_query(&self, command: &ParsedCommand) {
        let issuer = &command.issuer;
        if let Err(err) = self.limiter.check_and_record(
            &issuer.user_id,
            command.name,
            Instant::now(),
            issuer.is_admin,
        ) {
            self.reply_to(issuer, format!("⏳ {err}")).await;
            return;
        }

        let reply = match &command.kind {
            CommandKind::Stats => match self.users.get_stats(&issuer.user_id) {
                Some(stats) => replies::format_stats(&stats),
                None => "📊 no commands executed yet — send one!".to_string(),
            },
            CommandKind::Leaderboard => {
                replies::format_leaderboard(&self.users.leaderboard(self.config.leaderboard_size))
            }
            CommandKind::Uptime => {
                format!("⏱️ uptime: {}", replies::format_hms(self.started_at.elapsed()))
            }
            CommandKind::Help { topic } => self.table.help_text(topic.as_deref()),
            _ => return,
        };
        self.reply_to(issuer, reply).await;
    }

    async fn handle_outcome(&self, outcome: ExecutionOutcome) {
        if outcome.message.is_empty() {
            return;
        }
        self.reply_to(&outcome.command.issuer, outcome.message).await;
    }

    fn is_banned(&self, user_id: &str) -> bool {
        self.banned
            .lock()
            .expect("ban list lock poisoned")
            .contains(user_id)
    }

    /// Addressed reply to one user.
    async fn reply_to(&self, issuer: &Issuer, text: String) {
        let addressed = format!("@{} {text}", issuer.display_name);
        if let Err(err) = self.channel.reply(&addressed, Visibility::Private).await {
            warn!(error = %err, "failed to send reply");
        }
    }

    /// Public announcement.
    async fn announce(&self, text: String) {
        if let Err(err) = self.channel.reply(&text, Visibility::Public).await {
            warn!(error = %err, "failed to send announcement");
        }
    }
}
