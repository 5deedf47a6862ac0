//! Core types: channel identity, message, and fetch request.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::range::TimeRange;

/// Stable identifier of a source channel (the resolved numeric id, as text).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<i64> for ChannelId {
    fn from(id: i64) -> Self {
        Self::new(id.to_string())
    }
}

/// Channel as the user names it: a `t.me` URL or a handle. Must be resolved to a
/// [`ChannelInfo`] before any fetch or store operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef {
    handle: String,
}

impl ChannelRef {
    /// Parses `https://t.me/<handle>`, `t.me/<handle>/123`, `@handle` or `handle`.
    pub fn parse(input: &str) -> Result<Self> {
        let mut rest = input.trim();
        for scheme in ["https://", "http://"] {
            if let Some(stripped) = rest.strip_prefix(scheme) {
                rest = stripped;
                break;
            }
        }
        rest = rest.strip_prefix("www.").unwrap_or(rest);
        for host in ["t.me/", "telegram.me/"] {
            if let Some(stripped) = rest.strip_prefix(host) {
                rest = stripped;
                break;
            }
        }
        rest = rest.strip_prefix('@').unwrap_or(rest);

        let handle = rest
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();

        let valid = !handle.is_empty()
            && handle
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(SyncError::InvalidChannel(input.to_string()));
        }

        Ok(Self {
            handle: handle.to_string(),
        })
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.handle)
    }
}

/// Result of resolving a [`ChannelRef`] against the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub title: Option<String>,
}

/// A single channel message. `(channel_id, message_id)` is its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub channel_id: ChannelId,
    pub message_id: i64,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub sender: Option<String>,
    pub chat_title: Option<String>,
    pub reply_to_message_id: Option<i64>,
}

impl Message {
    pub fn new(
        channel_id: ChannelId,
        message_id: i64,
        timestamp: DateTime<Utc>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel_id,
            message_id,
            timestamp,
            text: text.into(),
            sender: None,
            chat_title: None,
            reply_to_message_id: None,
        }
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn with_chat_title(mut self, title: impl Into<String>) -> Self {
        self.chat_title = Some(title.into());
        self
    }

    pub fn with_reply_to(mut self, message_id: i64) -> Self {
        self.reply_to_message_id = Some(message_id);
        self
    }

    /// Sort key: timestamp ascending, message id breaks ties.
    pub fn chronological(a: &Message, b: &Message) -> Ordering {
        a.timestamp
            .cmp(&b.timestamp)
            .then(a.message_id.cmp(&b.message_id))
    }
}

/// One unit of work for the reconciler: a channel and the range wanted for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub channel_id: ChannelId,
    pub range: TimeRange,
}

impl FetchRequest {
    pub fn new(channel_id: ChannelId, range: TimeRange) -> Self {
        Self { channel_id, range }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_channel_urls_and_handles() {
        for input in [
            "https://t.me/rust_news",
            "t.me/rust_news",
            "http://www.t.me/rust_news/1234",
            "https://telegram.me/rust_news?single",
            "@rust_news",
            "  rust_news  ",
        ] {
            let parsed = ChannelRef::parse(input).unwrap();
            assert_eq!(parsed.handle(), "rust_news", "input: {input}");
        }
    }

    #[test]
    fn rejects_empty_or_malformed_channel() {
        for input in ["", "https://t.me/", "@", "t.me/bad handle", "t.me/caf\u{e9}"] {
            assert!(
                matches!(ChannelRef::parse(input), Err(SyncError::InvalidChannel(_))),
                "input: {input}"
            );
        }
    }

    #[test]
    fn chronological_breaks_ties_by_message_id() {
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let channel = ChannelId::from("1");
        let mut messages = vec![
            Message::new(channel.clone(), 7, ts, "b"),
            Message::new(channel.clone(), 3, ts, "a"),
            Message::new(channel, 1, ts + chrono::Duration::seconds(1), "c"),
        ];
        messages.sort_by(Message::chronological);
        let ids: Vec<i64> = messages.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![3, 7, 1]);
    }
}
