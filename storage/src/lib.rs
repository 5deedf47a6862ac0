//! Storage crate: message and coverage persistence behind [`chansync_core::MessageStore`].
//!
//! ## Modules
//!
//! - [`error`] – Storage error types
//! - [`models`] – MessageRecord, query parameters, retrieval results, channel and store stats
//! - [`message_repo`] – MessageRepository (SQLite)
//! - [`inmemory`] – InMemoryMessageStore
//! - [`sqlite_pool`] – SqlitePoolManager

mod error;
mod inmemory;
mod message_repo;
mod models;
mod sqlite_pool;

pub use error::StorageError;
pub use inmemory::InMemoryMessageStore;
pub use message_repo::MessageRepository;
pub use models::{
    ChannelStats, ContextQuery, ContextualMessages, KeywordStats, MessageQuery, MessageRecord,
    RetrievalRole, RetrievalStats, RetrievedMessage, StoreStats,
};
pub use sqlite_pool::SqlitePoolManager;
