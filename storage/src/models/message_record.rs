//! Message record model for persistence.
//!
//! Maps to the `messages` table and is used by MessageRepository.

use chansync_core::{ChannelId, Message};
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// One row of `messages`. Timestamps are Unix milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageRecord {
    pub channel_id: String,
    pub message_id: i64,
    pub timestamp_ms: i64,
    pub text: String,
    pub sender: Option<String>,
    pub chat_title: Option<String>,
    pub reply_to_message_id: Option<i64>,
}

impl MessageRecord {
    /// Builds the row for `message` stored under `channel_id`.
    pub fn from_message(channel_id: &ChannelId, message: &Message) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            message_id: message.message_id,
            timestamp_ms: message.timestamp.timestamp_millis(),
            text: message.text.clone(),
            sender: message.sender.clone(),
            chat_title: message.chat_title.clone(),
            reply_to_message_id: message.reply_to_message_id,
        }
    }
}

impl TryFrom<MessageRecord> for Message {
    type Error = StorageError;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        let timestamp = DateTime::from_timestamp_millis(record.timestamp_ms).ok_or_else(|| {
            StorageError::InvalidData(format!(
                "timestamp {} out of range for message {}/{}",
                record.timestamp_ms, record.channel_id, record.message_id
            ))
        })?;

        Ok(Message {
            channel_id: ChannelId::new(record.channel_id),
            message_id: record.message_id,
            timestamp,
            text: record.text,
            sender: record.sender,
            chat_title: record.chat_title,
            reply_to_message_id: record.reply_to_message_id,
        })
    }
}
