//! Telegram Desktop export format and conversion to core types.
//!
//! Only the fields needed for sync are modeled; unknown fields are ignored.

use chansync_core::{ChannelId, ChannelInfo, Message};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Deserialize;

/// Top-level object of `result.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportedChat {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub chat_type: Option<String>,
    pub id: i64,
    #[serde(default)]
    pub messages: Vec<ExportedMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportedMessage {
    pub id: i64,
    /// `message` or `service`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Local naive time, `2024-04-01T12:00:00`.
    pub date: Option<String>,
    /// Unix seconds as a string; preferred over `date` when present.
    pub date_unixtime: Option<String>,
    pub from: Option<String>,
    pub from_id: Option<String>,
    #[serde(default)]
    pub text: ExportedText,
    pub reply_to_message_id: Option<i64>,
}

/// Message text: plain string, or a list of plain strings and formatted entities.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExportedText {
    Plain(String),
    Rich(Vec<TextPart>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextPart {
    Plain(String),
    Entity {
        #[serde(rename = "type")]
        kind: Option<String>,
        text: String,
    },
}

impl Default for ExportedText {
    fn default() -> Self {
        Self::Plain(String::new())
    }
}

impl ExportedText {
    /// Concatenated text of every part.
    pub fn flatten(&self) -> String {
        match self {
            Self::Plain(text) => text.clone(),
            Self::Rich(parts) => parts
                .iter()
                .map(|part| match part {
                    TextPart::Plain(text) => text.as_str(),
                    TextPart::Entity { text, .. } => text.as_str(),
                })
                .collect(),
        }
    }
}

impl ExportedChat {
    /// Newest instant vouched for by the export's own entries, service entries included.
    pub fn newest_entry_end(&self) -> Option<DateTime<Utc>> {
        self.messages
            .iter()
            .filter_map(ExportedMessage::covered_until)
            .max()
    }

    pub fn channel_id(&self) -> ChannelId {
        ChannelId::from(self.id)
    }

    pub fn info(&self) -> ChannelInfo {
        ChannelInfo {
            id: self.channel_id(),
            title: self.name.clone(),
        }
    }

    /// Text messages as core messages, oldest first. Service entries, entries without
    /// a parseable date, and empty texts are skipped.
    pub fn to_core_messages(&self) -> Vec<Message> {
        let channel_id = self.channel_id();
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter_map(|m| m.to_core(&channel_id, self.name.as_deref()))
            .collect();
        messages.sort_by(Message::chronological);
        messages
    }
}

impl ExportedMessage {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        if let Some(secs) = self
            .date_unixtime
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
        {
            return DateTime::from_timestamp(secs, 0);
        }
        self.date
            .as_deref()
            .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok())
            .map(|naive| naive.and_utc())
    }

    fn to_core(&self, channel_id: &ChannelId, chat_title: Option<&str>) -> Option<Message> {
        if self.kind != "message" {
            return None;
        }
        let text = self.text.flatten();
        if text.is_empty() {
            return None;
        }
        let timestamp = self.timestamp()?;

        let mut message = Message::new(channel_id.clone(), self.id, timestamp, text);
        if let Some(sender) = self.from_id.as_deref().or(self.from.as_deref()) {
            message = message.with_sender(sender);
        }
        if let Some(title) = chat_title {
            message = message.with_chat_title(title);
        }
        if let Some(parent) = self.reply_to_message_id {
            message = message.with_reply_to(parent);
        }
        Some(message)
    }

    /// Latest instant this entry proves the export covers, whether or not it converts.
    pub fn covered_until(&self) -> Option<DateTime<Utc>> {
        self.timestamp().map(|t| t + Duration::seconds(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"{
        "name": "Rust News",
        "type": "public_channel",
        "id": 1234567890,
        "messages": [
            {"id": 3, "type": "message", "date": "2024-04-01T12:00:02",
             "date_unixtime": "1711972802",
             "from": "Rust News", "from_id": "channel1234567890",
             "text": ["Release ", {"type": "bold", "text": "1.77"}, " is out"],
             "reply_to_message_id": 1},
            {"id": 1, "type": "message", "date": "2024-04-01T12:00:00",
             "from": "Rust News", "text": "First"},
            {"id": 2, "type": "service", "date": "2024-04-01T12:00:01",
             "action": "pin_message", "text": ""},
            {"id": 4, "type": "message", "date": "2024-04-01T12:00:03", "text": ""},
            {"id": 5, "type": "message", "text": "no date"}
        ]
    }"#;

    #[test]
    fn parses_export_and_converts_messages() {
        let chat: ExportedChat = serde_json::from_str(EXPORT).unwrap();
        assert_eq!(chat.info().id, ChannelId::from("1234567890"));
        assert_eq!(chat.info().title.as_deref(), Some("Rust News"));

        let messages = chat.to_core_messages();

        let ids: Vec<i64> = messages.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(messages[0].text, "First");
        assert_eq!(messages[0].sender.as_deref(), Some("Rust News"));
        assert_eq!(messages[0].reply_to_message_id, None);
        assert_eq!(messages[0].timestamp, DateTime::from_timestamp(1711972800, 0).unwrap());
        assert_eq!(messages[1].text, "Release 1.77 is out");
        assert_eq!(messages[1].sender.as_deref(), Some("channel1234567890"));
        assert_eq!(messages[1].reply_to_message_id, Some(1));
        assert_eq!(messages[1].chat_title.as_deref(), Some("Rust News"));
    }

    #[test]
    fn message_without_author_has_no_sender() {
        let message: ExportedMessage = serde_json::from_str(
            r#"{"id": 7, "type": "message", "date_unixtime": "100", "text": "anon"}"#,
        )
        .unwrap();
        let core = message.to_core(&ChannelId::from("1"), None).unwrap();
        assert_eq!(core.sender, None);
        assert_eq!(core.chat_title, None);
        assert_eq!(message.covered_until(), DateTime::from_timestamp(101, 0));
    }

    #[test]
    fn missing_text_defaults_to_empty() {
        let message: ExportedMessage =
            serde_json::from_str(r#"{"id": 9, "type": "message", "date": "2024-04-01T00:00:00"}"#)
                .unwrap();
        assert_eq!(message.text.flatten(), "");
    }
}
