//! Message source abstraction: where channel history comes from.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::range::TimeRange;
use crate::types::{ChannelId, ChannelInfo, ChannelRef, Message};

/// Upstream provider of channel messages (Telegram client, export files, ...).
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Resolves a user-supplied channel reference to its stable id.
    async fn resolve_channel(&self, channel: &ChannelRef) -> Result<ChannelInfo>;

    /// Returns the channel's messages with `timestamp` in `[range.start, range.end)`.
    /// Fails with `SyncError::SourceUnavailable` when the source cannot be reached.
    async fn fetch(&self, channel_id: &ChannelId, range: TimeRange) -> Result<Vec<Message>>;

    /// Instant up to which the source holds the complete history of `channel_id`.
    ///
    /// Snapshot sources cannot vouch for time after the snapshot was taken; fetched ranges
    /// are only recorded as covered up to this point. Queried before `fetch`, so a snapshot
    /// replaced in between can only make the claim more conservative. `None` means live
    /// data with no limit.
    async fn horizon(&self, _channel_id: &ChannelId) -> Result<Option<DateTime<Utc>>> {
        Ok(None)
    }
}
