use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Invalid range: start {start} is not before end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid channel reference: {0}")]
    InvalidChannel(String),

    /// `channel` is the id, or the handle when the failure happens before resolution.
    #[error("Source unavailable for channel {channel}: {reason}")]
    SourceUnavailable { channel: String, reason: String },

    #[error("Fetch for channel {channel} timed out after {secs} seconds")]
    Timeout { channel: String, secs: u64 },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn source_unavailable(channel: impl ToString, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            channel: channel.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn timeout(channel: impl ToString, secs: u64) -> Self {
        Self::Timeout {
            channel: channel.to_string(),
            secs,
        }
    }

    /// Whether re-invoking the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { .. } | Self::Timeout { .. } | Self::Store(_) | Self::Cancelled
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
