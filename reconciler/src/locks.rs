//! Per-channel async locks serializing coverage updates.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chansync_core::ChannelId;
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, Default)]
pub(crate) struct ChannelLocks {
    locks: Mutex<HashMap<ChannelId, Arc<AsyncMutex<()>>>>,
}

impl ChannelLocks {
    /// The lock guarding `channel_id`, created on first use.
    pub(crate) fn lock_for(&self, channel_id: &ChannelId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(channel_id.clone()).or_default().clone()
    }
}
