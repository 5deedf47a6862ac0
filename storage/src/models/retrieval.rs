//! Result of MessageRepository::messages_with_context.

use chansync_core::Message;
use serde::{Deserialize, Serialize};

/// Why a message is part of a retrieval result. A message reached several ways keeps the
/// first role in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalRole {
    Keyword,
    Context,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedMessage {
    pub message: Message,
    pub role: RetrievalRole,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordStats {
    pub keyword: String,
    pub count: usize,
    pub chars: usize,
}

/// Counts and text lengths per retrieval role, before deduplication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalStats {
    pub keyword_messages: usize,
    pub keyword_chars: usize,
    pub by_keyword: Vec<KeywordStats>,
    pub context_messages: usize,
    pub context_chars: usize,
    pub answer_messages: usize,
    pub answer_chars: usize,
}

/// Deduplicated messages, oldest first, with statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextualMessages {
    pub messages: Vec<RetrievedMessage>,
    pub stats: RetrievalStats,
}

impl ContextualMessages {
    pub fn total_chars(&self) -> usize {
        self.messages
            .iter()
            .map(|m| m.message.text.chars().count())
            .sum()
    }
}

pub(crate) fn text_chars(messages: &[Message]) -> usize {
    messages.iter().map(|m| m.text.chars().count()).sum()
}
