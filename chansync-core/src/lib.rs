//! # chansync-core
//!
//! Core types and traits for channel message sync: [`Message`], [`TimeRange`], [`Coverage`],
//! the [`MessageSource`] / [`MessageStore`] collaborator traits, the [`SyncError`] taxonomy,
//! and tracing initialization. Storage- and transport-agnostic; used by storage, reconciler,
//! telegram-export and chansync-cli.

pub mod coverage;
pub mod error;
pub mod logger;
pub mod range;
pub mod source;
pub mod store;
pub mod types;


pub use coverage::Coverage;
pub use error::{Result, SyncError};
pub use logger::init_tracing;
pub use range::TimeRange;
pub use source::MessageSource;
pub use store::MessageStore;
pub use types::{ChannelId, ChannelInfo, ChannelRef, FetchRequest, Message};
