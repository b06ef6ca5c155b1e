//! Wire types for the YouTube Live Streaming API subset the client uses.

use chrono::{DateTime, Utc};
use crowdvm_core::IncomingMessage;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BroadcastListResponse {
    pub items: Option<Vec<BroadcastItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BroadcastItem {
    pub snippet: Option<BroadcastSnippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BroadcastSnippet {
    pub live_chat_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MessageListResponse {
    pub next_page_token: Option<String>,
    pub polling_interval_millis: Option<u64>,
    pub items: Option<Vec<MessageItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MessageItem {
    pub id: String,
    pub snippet: Option<MessageSnippet>,
    pub author_details: Option<AuthorDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MessageSnippet {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub display_message: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthorDetails {
    pub channel_id: Option<String>,
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_chat_owner: bool,
    #[serde(default)]
    pub is_chat_moderator: bool,
}

/// Map one API item to an [`IncomingMessage`]. Non-text events (member
/// milestones, super chats, deletions) are dropped here.
///
/// Channel owners and moderators arrive pre-marked as admins; the
/// dispatcher additionally honors the configured admin id set.
pub(crate) fn to_incoming(item: MessageItem, received_at: DateTime<Utc>) -> Option<IncomingMessage> {
    let snippet = item.snippet?;
    if snippet.kind.as_deref() != Some("textMessageEvent") {
        return None;
    }
    let text = snippet.display_message?;
    let author = item.author_details.unwrap_or_default();

    Some(IncomingMessage {
        user_id: author.channel_id.unwrap_or_default(),
        display_name: author.display_name.unwrap_or_else(|| "unknown".to_string()),
        text,
        received_at,
        is_admin: author.is_chat_owner || author.is_chat_moderator,
    })
}
