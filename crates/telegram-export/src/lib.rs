//! # telegram-export
//!
//! [`chansync_core::MessageSource`] reading Telegram Desktop "Export chat history" JSON files.
//!
//! - [`export`] – serde models of the export format and conversion to core messages
//! - [`source`] – [`ExportDirSource`], one export file per channel, bounded by its snapshot time

pub mod export;
pub mod source;

pub use export::{ExportedChat, ExportedMessage, ExportedText};
pub use source::ExportDirSource;
