//! YouTube Live Chat polling client implementing the chat channel.
//!
//! Read path: the liveChat/messages list endpoint with page tokens,
//! paced by the server-advised polling interval (never below a quota
//! floor). Write path: liveChat/messages insert. Token acquisition and
//! refresh are out of scope; the client consumes a caller-supplied
//! bearer token and surfaces a 401 as [`ChannelError::Unauthorized`].

mod api;

use api::{BroadcastListResponse, MessageListResponse};
use async_trait::async_trait;
use chrono::Utc;
use crowdvm_core::{
    ChannelError, ChannelResult, ChatChannel, ChatConfig, IncomingMessage, Visibility,
};
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Never poll faster than this; protects the daily API quota.
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Backoff after a quota rejection (403).
const QUOTA_BACKOFF: Duration = Duration::from_secs(60);

/// Backoff after any other non-success status.
const ERROR_BACKOFF: Duration = Duration::from_secs(15);

/// Per-request budget.
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// YouTube truncates chat messages; don't send more than it accepts.
const MAX_REPLY_LEN: usize = 200;

/// Upper bound on remembered message ids (page tokens make duplicates
/// rare, but the channel promises at-least-once, not exactly-once).
const SEEN_CAP: usize = 10_000;

struct PollState {
    live_chat_id: Option<String>,
    page_token: Option<String>,
    poll_interval: Duration,
    last_poll: Option<Instant>,
    seen_ids: HashSet<String>,
    seen_order: VecDeque<String>,
}

/// The polling chat channel.
pub struct YouTubeChatClient {
    http: reqwest::Client,
    api_key: String,
    access_token: String,
    state: Mutex<PollState>,
}

impl YouTubeChatClient {
    pub fn new(config: &ChatConfig) -> ChannelResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            access_token: config.access_token.clone(),
            state: Mutex::new(PollState {
                live_chat_id: config.live_chat_id.clone(),
                page_token: None,
                poll_interval: MIN_POLL_INTERVAL,
                last_poll: None,
                seen_ids: HashSet::new(),
                seen_order: VecDeque::new(),
            }),
        })
    }

    /// Find the active livestream's chat id.
    async fn discover_live_chat_id(&self) -> ChannelResult<String> {
        let url = format!("{API_BASE}/liveBroadcasts");
        let response = self
            .http
            .get(&url)
            .query(&[
                ("part", "snippet"),
                ("broadcastStatus", "active"),
                ("mine", "true"),
            ])
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ChannelError::Unauthorized(
                "live broadcast lookup rejected".to_string(),
            ));
        }

        let body: BroadcastListResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        let chat_id = body
            .items
            .into_iter()
            .flatten()
            .find_map(|item| item.snippet.and_then(|s| s.live_chat_id))
            .ok_or(ChannelError::NoActiveChat)?;

        info!(live_chat_id = %chat_id, "attached to live chat");
        Ok(chat_id)
    }

    async fn ensure_live_chat_id(&self) -> ChannelResult<String> {
        if let Some(id) = self.state.lock().await.live_chat_id.clone() {
            return Ok(id);
        }
        let id = self.discover_live_chat_id().await?;
        self.state.lock().await.live_chat_id = Some(id.clone());
        Ok(id)
    }
}

#[async_trait]
impl ChatChannel for YouTubeChatClient {
    async fn poll(&self) -> ChannelResult<Vec<IncomingMessage>> {
        // Pace to the advised interval before touching the network.
        let (wait, page_token) = {
            let state = self.state.lock().await;
            let wait = match state.last_poll {
                Some(last) => state.poll_interval.saturating_sub(last.elapsed()),
                None => Duration::ZERO,
            };
            (wait, state.page_token.clone())
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        let live_chat_id = self.ensure_live_chat_id().await?;

        let url = format!("{API_BASE}/liveChat/messages");
        let mut query: Vec<(&str, String)> = vec![
            ("liveChatId", live_chat_id),
            ("part", "snippet,authorDetails".to_string()),
            ("maxResults", "200".to_string()),
            ("key", self.api_key.clone()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response = self
            .http
            .get(&url)
            .query(&query)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        let mut state = self.state.lock().await;
        state.last_poll = Some(Instant::now());

        match response.status() {
            status if status.is_success() => {}
            reqwest::StatusCode::UNAUTHORIZED => {
                return Err(ChannelError::Unauthorized("chat poll rejected".to_string()));
            }
            reqwest::StatusCode::FORBIDDEN => {
                // Quota exhausted or key revoked; degrade, don't die.
                error!("chat poll returned 403, backing off {QUOTA_BACKOFF:?}");
                state.poll_interval = QUOTA_BACKOFF;
                return Ok(Vec::new());
            }
            status => {
                warn!(%status, "chat poll failed, backing off {ERROR_BACKOFF:?}");
                state.poll_interval = ERROR_BACKOFF;
                return Ok(Vec::new());
            }
        }

        drop(state);
        let body: MessageListResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        let mut state = self.state.lock().await;
        state.page_token = body.next_page_token.clone();
        state.poll_interval = body
            .polling_interval_millis
            .map(Duration::from_millis)
            .unwrap_or(MIN_POLL_INTERVAL)
            .max(MIN_POLL_INTERVAL);

        let now = Utc::now();
        let mut messages = Vec::new();
        for item in body.items.into_iter().flatten() {
            if state.seen_ids.contains(&item.id) {
                continue;
            }
            state.seen_ids.insert(item.id.clone());
            state.seen_order.push_back(item.id.clone());
            while state.seen_order.len() > SEEN_CAP {
                if let Some(old) = state.seen_order.pop_front() {
                    state.seen_ids.remove(&old);
                }
            }

            if let Some(message) = api::to_incoming(item, now) {
                messages.push(message);
            }
        }

        debug!(count = messages.len(), "chat poll batch");
        Ok(messages)
    }

    async fn reply(&self, text: &str, _visibility: Visibility) -> ChannelResult<()> {
        // YouTube live chat has no per-user delivery; "private" replies
        // are addressed by name in the text itself.
        if text.is_empty() {
            return Ok(());
        }
        let text = truncate_reply(text);

        let live_chat_id = self.ensure_live_chat_id().await?;
        let url = format!("{API_BASE}/liveChat/messages");
        let body = serde_json::json!({
            "snippet": {
                "liveChatId": live_chat_id,
                "type": "textMessageEvent",
                "textMessageDetails": { "messageText": text },
            }
        });

        let response = self
            .http
            .post(&url)
            .query(&[("part", "snippet")])
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            reqwest::StatusCode::UNAUTHORIZED => {
                Err(ChannelError::Unauthorized("reply rejected".to_string()))
            }
            status => Err(ChannelError::Transport(format!(
                "reply failed with status {status}"
            ))),
        }
    }
}

/// Clip a reply to the channel's message length, on a char boundary.
fn truncate_reply(text: &str) -> &str {
    match text.char_indices().nth(MAX_REPLY_LEN) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
