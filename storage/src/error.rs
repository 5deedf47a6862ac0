//! Storage error types.
//!
//! Used by repository implementations; converted to [`SyncError::Store`] at the
//! [`chansync_core::MessageStore`] boundary.

use chansync_core::SyncError;
use thiserror::Error;

/// Errors that can occur when using storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        SyncError::Store(err.to_string())
    }
}
