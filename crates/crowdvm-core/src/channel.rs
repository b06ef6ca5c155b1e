//! The Chat Channel seam: where commands come from and replies go.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// A single chat message as delivered by the channel.
///
/// Immutable once constructed; consumed exactly once by the dispatcher.
/// The `user_id` is trusted as-is — the daemon performs no authentication
/// of its own beyond the configured admin id set.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Channel-scoped stable user identifier.
    pub user_id: String,
    /// Human-readable name, used in replies and the leaderboard.
    pub display_name: String,
    /// Raw message text.
    pub text: String,
    /// When the daemon received the message.
    pub received_at: DateTime<Utc>,
    /// Whether the sender is in the configured admin set (or channel owner).
    pub is_admin: bool,
}

/// Reply visibility requested by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Visible to the whole chat.
    Public,
    /// Addressed to a single user (best-effort; channels without DMs
    /// prefix the reply with the user's name instead).
    Private,
}

/// Chat channel error type.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Transport-level failure (network, HTTP status, decode)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Credentials rejected by the channel
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// No active stream/chat to attach to
    #[error("No active live chat found")]
    NoActiveChat,

    /// Channel has been closed
    #[error("Channel closed")]
    Closed,
}

/// Result type for chat channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Abstraction over the external message source/sink.
///
/// `poll` is a short poll: it returns whatever batch of new messages is
/// available (possibly empty) and is expected to pace itself internally
/// (e.g. respecting a server-advised polling interval). Implementations
/// must tolerate being polled in a tight loop.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Fetch the next batch of unseen messages.
    async fn poll(&self) -> ChannelResult<Vec<IncomingMessage>>;

    /// Post a reply.
    async fn reply(&self, text: &str, visibility: Visibility) -> ChannelResult<()>;
}
