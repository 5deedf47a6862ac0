//! Query parameters for keyword search over stored messages.
//!
//! Used by MessageRepository::search_messages and MessageRepository::messages_with_context.

use chansync_core::{ChannelId, TimeRange};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageQuery {
    /// Case-insensitive substrings; a message matches when its text contains any of them.
    pub keywords: Vec<String>,
    pub channel_id: Option<ChannelId>,
    pub range: Option<TimeRange>,
    pub limit: Option<i64>,
}

impl MessageQuery {
    pub fn keyword(keyword: impl Into<String>) -> Self {
        Self::any_of([keyword])
    }

    pub fn any_of<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn in_channel(mut self, channel_id: ChannelId) -> Self {
        self.channel_id = Some(channel_id);
        self
    }

    pub fn within(mut self, range: TimeRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Keyword hits expanded with surrounding messages and reply chains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextQuery {
    pub channel_id: ChannelId,
    pub keywords: Vec<String>,
    pub range: Option<TimeRange>,
    /// Messages taken before and after each hit, by message id.
    pub context_count: i64,
    /// Messages along a reply chain, the hit itself included. `0` disables reply chains.
    pub reply_depth: usize,
}

impl ContextQuery {
    pub fn new<I, S>(channel_id: ChannelId, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channel_id,
            keywords: keywords.into_iter().map(Into::into).collect(),
            range: None,
            context_count: 2,
            reply_depth: 2,
        }
    }

    pub fn within(mut self, range: TimeRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn context_count(mut self, count: i64) -> Self {
        self.context_count = count.max(0);
        self
    }

    pub fn reply_depth(mut self, depth: usize) -> Self {
        self.reply_depth = depth;
        self
    }
}
