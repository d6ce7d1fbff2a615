//! Team chat over the polling REST surface.
//!
//! The worker task owns the fetch cursor and talks to the server; the
//! [`ChatRelay`] lives with the session and owns what has been rendered.

use std::future::Future;
use std::time::Duration;

use ahash::AHashSet;
use chrono::{FixedOffset, Local, NaiveDateTime, Offset, TimeZone, Utc};
use eco_proto::{ChatMessage, ChatSendResponse};
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("not logged in")]
    NotLoggedIn,
    #[error("{0}")]
    Rejected(String),
    #[error("message is empty")]
    Empty,
    #[error("message is {len} characters long; the limit is {max}")]
    TooLong { len: usize, max: usize },
}

/// Request/response chat surface.
pub trait ChatApi: Send + Sync + 'static {
    fn fetch_messages_since(
        &self,
        last_id: u64,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, ChatError>> + Send;

    fn submit_message(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<ChatSendResponse, ChatError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRequest {
    Submit(String),
    PollNow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatUpdate {
    Messages(Vec<ChatMessage>),
    Sent,
    Failed(String),
}

/// Poll on an interval, submit on request, and poll again right after a
/// successful submit. Runs until the update receiver goes away.
pub async fn run_chat_worker<A: ChatApi>(
    api: A,
    poll_interval: Duration,
    mut requests: UnboundedReceiver<ChatRequest>,
    updates: UnboundedSender<ChatUpdate>,
) {
    let mut cursor = 0u64;
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut requests_open = true;

    loop {
        let poll = tokio::select! {
            _ = ticker.tick() => true,
            request = requests.recv(), if requests_open => match request {
                Some(ChatRequest::PollNow) => true,
                Some(ChatRequest::Submit(text)) => {
                    let update = match api.submit_message(&text).await {
                        Ok(response) if response.success => ChatUpdate::Sent,
                        Ok(response) => ChatUpdate::Failed(
                            response
                                .error
                                .unwrap_or_else(|| "Message could not be sent".to_string()),
                        ),
                        Err(err) => {
                            tracing::warn!(target: "eco_quest::chat", error = %err, "chat.send_failed");
                            ChatUpdate::Failed(err.to_string())
                        }
                    };
                    let sent = update == ChatUpdate::Sent;
                    if updates.send(update).is_err() {
                        break;
                    }
                    sent
                }
                None => {
                    requests_open = false;
                    false
                }
            },
        };
        if !poll {
            continue;
        }

        match api.fetch_messages_since(cursor).await {
            Ok(messages) => {
                if messages.is_empty() {
                    continue;
                }
                cursor = messages.iter().map(|m| m.id).fold(cursor, u64::max);
                tracing::trace!(
                    target: "eco_quest::chat",
                    count = messages.len(),
                    cursor,
                    "chat.polled"
                );
                if updates.send(ChatUpdate::Messages(messages)).is_err() {
                    break;
                }
            }
            Err(err) => {
                tracing::warn!(target: "eco_quest::chat", error = %err, "chat.poll_failed");
                if updates.send(ChatUpdate::Failed(err.to_string())).is_err() {
                    break;
                }
            }
        }
    }
    tracing::debug!(target: "eco_quest::chat", "chat.worker_stopped");
}

/// A chat line ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub id: u64,
    pub username: String,
    pub message: String,
    /// `HH:MM` in the viewer's offset.
    pub time_label: String,
    pub own: bool,
}

/// Client-side chat log: dedupes by id and keeps arrival order.
#[derive(Debug)]
pub struct ChatRelay {
    username: String,
    seen: AHashSet<u64>,
    cursor: u64,
    messages: Vec<RenderedMessage>,
    speak_incoming: bool,
    max_len: usize,
    offset: FixedOffset,
}

impl ChatRelay {
    pub fn new(username: impl Into<String>, max_len: usize) -> Self {
        Self {
            username: username.into(),
            seen: AHashSet::new(),
            cursor: 0,
            messages: Vec::new(),
            speak_incoming: false,
            max_len,
            offset: Local::now().offset().fix(),
        }
    }

    /// Render timestamps in a fixed offset instead of the local one.
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn messages(&self) -> &[RenderedMessage] {
        &self.messages
    }

    /// Append unseen messages in arrival order. Returns the lines to speak
    /// when text-to-speech is on.
    pub fn ingest(&mut self, batch: Vec<ChatMessage>) -> Vec<String> {
        let mut speech = Vec::new();
        for message in batch {
            self.cursor = self.cursor.max(message.id);
            if !self.seen.insert(message.id) {
                continue;
            }
            let own = message.username == self.username;
            if self.speak_incoming && !own {
                speech.push(format!("{} says: {}", message.username, message.message));
            }
            self.messages.push(RenderedMessage {
                id: message.id,
                time_label: time_label(&message.timestamp, self.offset),
                username: message.username,
                message: message.message,
                own,
            });
        }
        speech
    }

    /// Trim and check a draft before it goes to the server.
    pub fn prepare_submission(&self, raw: &str) -> Result<String, ChatError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(ChatError::Empty);
        }
        let len = text.chars().count();
        if len > self.max_len {
            return Err(ChatError::TooLong {
                len,
                max: self.max_len,
            });
        }
        Ok(text.to_string())
    }

    pub fn speaks_incoming(&self) -> bool {
        self.speak_incoming
    }

    /// Flip text-to-speech and return the new state.
    pub fn toggle_speech(&mut self) -> bool {
        self.speak_incoming = !self.speak_incoming;
        self.speak_incoming
    }
}

fn time_label(timestamp: &str, offset: FixedOffset) -> String {
    let parsed = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S%.f"));
    match parsed {
        Ok(naive) => Utc
            .from_utc_datetime(&naive)
            .with_timezone(&offset)
            .format("%H:%M")
            .to_string(),
        Err(_) => "--:--".to_string(),
    }
}
