//! Persistence models: rows, query parameters, retrieval results and aggregate statistics.

mod channel_stats;
mod message_query;
mod message_record;
mod retrieval;

pub use channel_stats::{ChannelStats, StoreStats};
pub use message_query::{ContextQuery, MessageQuery};
pub use message_record::MessageRecord;
pub use retrieval::{
    ContextualMessages, KeywordStats, RetrievalRole, RetrievalStats, RetrievedMessage,
};
pub(crate) use retrieval::text_chars;
