//! # Message Store
//!
//! Persistence interface consumed by the reconciler. Implemented by the `storage` crate
//! (SQLite and in-memory backends).

use async_trait::async_trait;

use crate::coverage::Coverage;
use crate::error::Result;
use crate::range::TimeRange;
use crate::types::{ChannelId, Message};

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Recorded coverage of `channel_id`, clipped to `range`.
    async fn get_coverage(&self, channel_id: &ChannelId, range: TimeRange) -> Result<Coverage>;

    /// Inserts messages, ignoring any `(channel_id, message_id)` already stored.
    /// Returns how many rows were newly inserted.
    async fn insert_messages(&self, channel_id: &ChannelId, messages: &[Message]) -> Result<u64>;

    /// Records `range` as fully fetched, merging with overlapping or adjacent coverage.
    async fn add_coverage(&self, channel_id: &ChannelId, range: TimeRange) -> Result<()>;

    /// Stored messages of `channel_id` in `range`, ordered by timestamp then message id.
    async fn query_messages(&self, channel_id: &ChannelId, range: TimeRange)
        -> Result<Vec<Message>>;
}
