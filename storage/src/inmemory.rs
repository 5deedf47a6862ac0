//! # In-Memory Message Store
//!
//! [`MessageStore`] backed by maps behind `Arc<RwLock<>>`.
//!
//! **Advantages**:
//! - No I/O; fastest setup for tests and dry runs
//!
//! **Limitations**:
//! - Data is lost on restart

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chansync_core::{ChannelId, Coverage, Message, MessageStore, SyncError, TimeRange};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    /// Per channel, keyed by message id.
    messages: HashMap<ChannelId, BTreeMap<i64, Message>>,
    coverage: HashMap<ChannelId, Coverage>,
}

/// In-memory message store for testing and development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMessageStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored messages across channels.
    pub async fn len(&self) -> usize {
        let inner = self.inner.read().await;
        inner.messages.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Full recorded coverage of a channel.
    pub async fn coverage(&self, channel_id: &ChannelId) -> Coverage {
        let inner = self.inner.read().await;
        inner.coverage.get(channel_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn get_coverage(
        &self,
        channel_id: &ChannelId,
        range: TimeRange,
    ) -> Result<Coverage, SyncError> {
        let inner = self.inner.read().await;
        Ok(inner
            .coverage
            .get(channel_id)
            .map(|c| c.clip(&range))
            .unwrap_or_default())
    }

    async fn insert_messages(
        &self,
        channel_id: &ChannelId,
        messages: &[Message],
    ) -> Result<u64, SyncError> {
        let mut inner = self.inner.write().await;
        let stored = inner.messages.entry(channel_id.clone()).or_default();

        let mut inserted = 0;
        for message in messages {
            if !stored.contains_key(&message.message_id) {
                let mut message = message.clone();
                message.channel_id = channel_id.clone();
                stored.insert(message.message_id, message);
                inserted += 1;
            }
        }

        debug!(channel = %channel_id, inserted, "Stored messages in memory");
        Ok(inserted)
    }

    async fn add_coverage(
        &self,
        channel_id: &ChannelId,
        range: TimeRange,
    ) -> Result<(), SyncError> {
        let mut inner = self.inner.write().await;
        inner
            .coverage
            .entry(channel_id.clone())
            .or_default()
            .insert(range);
        Ok(())
    }

    async fn query_messages(
        &self,
        channel_id: &ChannelId,
        range: TimeRange,
    ) -> Result<Vec<Message>, SyncError> {
        let inner = self.inner.read().await;
        let mut messages: Vec<Message> = inner
            .messages
            .get(channel_id)
            .map(|stored| {
                stored
                    .values()
                    .filter(|m| range.contains(m.timestamp))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        messages.sort_by(Message::chronological);
        Ok(messages)
    }
}
