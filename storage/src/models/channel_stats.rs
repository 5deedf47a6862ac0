//! Aggregate statistics for stored messages.
//!
//! Returned by MessageRepository::channel_stats and MessageRepository::store_stats.

use chansync_core::ChannelId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-channel totals, as listed by the `stats` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub channel_id: ChannelId,
    pub chat_title: Option<String>,
    pub message_count: i64,
    pub oldest_message: Option<DateTime<Utc>>,
    pub newest_message: Option<DateTime<Utc>>,
}

/// Totals across every channel in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_channels: i64,
    pub total_messages: i64,
    pub oldest_message: Option<DateTime<Utc>>,
    pub newest_message: Option<DateTime<Utc>>,
}
