//! Results of reconcile and sync calls.

use chansync_core::{ChannelId, ChannelInfo, Message, SyncError, TimeRange};

/// A gap that could not be filled; it stays uncovered and is retried by the next call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapFailure {
    pub range: TimeRange,
    pub error: SyncError,
}

/// Messages for the requested range plus what happened to each gap.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub channel_id: ChannelId,
    pub range: TimeRange,
    /// Stored messages in `range`, ordered by timestamp then message id.
    pub messages: Vec<Message>,
    /// Ranges fetched and recorded as covered, ascending. A gap cut short by the
    /// source horizon appears here up to the horizon and in `failed` after it.
    pub fetched: Vec<TimeRange>,
    /// Gaps that failed, ascending.
    pub failed: Vec<GapFailure>,
    /// Messages newly written to the store.
    pub inserted: u64,
}

impl ReconcileOutcome {
    /// True when every gap was filled, so `messages` covers the whole range.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_ranges(&self) -> Vec<TimeRange> {
        self.failed.iter().map(|f| f.range).collect()
    }
}

/// A resolved channel and its reconcile outcome.
#[derive(Debug, Clone)]
pub struct SyncedChannel {
    pub info: ChannelInfo,
    pub outcome: ReconcileOutcome,
}
