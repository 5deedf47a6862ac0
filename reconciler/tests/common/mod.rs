//! Shared test doubles for reconciler integration tests.
//!
//! - [`MockSource`]: in-memory `MessageSource` recording every fetch, with injectable
//!   failures, delays, a snapshot horizon and a misbehaving mode that ignores the range.
//! - [`FlakyStore`]: wraps `InMemoryMessageStore`, failing `insert_messages` a set number
//!   of times.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chansync_core::{
    ChannelId, ChannelInfo, ChannelRef, Coverage, Message, MessageSource, MessageStore, SyncError,
    TimeRange,
};
use chrono::{DateTime, Utc};
use storage::InMemoryMessageStore;

pub fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

pub fn range(start: i64, end: i64) -> TimeRange {
    TimeRange::new(ts(start), ts(end)).unwrap()
}

/// One message per listed second, message id equal to the second.
pub fn messages_at(channel: &ChannelId, seconds: &[i64]) -> Vec<Message> {
    seconds
        .iter()
        .map(|&s| Message::new(channel.clone(), s, ts(s), format!("message at {}", s)))
        .collect()
}

#[derive(Default)]
struct SourceState {
    messages: HashMap<ChannelId, Vec<Message>>,
    handles: HashMap<String, ChannelInfo>,
    failing: Vec<TimeRange>,
    failing_channels: Vec<ChannelId>,
    calls: Vec<(ChannelId, TimeRange)>,
}

#[derive(Clone, Default)]
pub struct MockSource {
    state: Arc<Mutex<SourceState>>,
    delay: Arc<Mutex<Option<Duration>>>,
    horizon: Arc<Mutex<Option<DateTime<Utc>>>>,
    ignore_range: Arc<Mutex<bool>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(self, channel: &ChannelId, messages: Vec<Message>) -> Self {
        self.state
            .lock()
            .unwrap()
            .messages
            .entry(channel.clone())
            .or_default()
            .extend(messages);
        self
    }

    pub fn with_handle(self, handle: &str, id: &ChannelId, title: &str) -> Self {
        self.state.lock().unwrap().handles.insert(
            handle.to_string(),
            ChannelInfo {
                id: id.clone(),
                title: Some(title.to_string()),
            },
        );
        self
    }

    /// Any fetch whose range intersects `range` fails with `SourceUnavailable`.
    pub fn fail_on(&self, range: TimeRange) {
        self.state.lock().unwrap().failing.push(range);
    }

    /// Every fetch for `channel` fails with `SourceUnavailable`.
    pub fn fail_channel(&self, channel: &ChannelId) {
        self.state.lock().unwrap().failing_channels.push(channel.clone());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.failing.clear();
        state.failing_channels.clear();
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Report the history as complete only up to `horizon`, like an export snapshot.
    pub fn set_horizon(&self, horizon: DateTime<Utc>) {
        *self.horizon.lock().unwrap() = Some(horizon);
    }

    /// Return every message of the channel regardless of the requested range.
    pub fn ignore_range(&self) {
        *self.ignore_range.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<(ChannelId, TimeRange)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn fetched_ranges(&self, channel: &ChannelId) -> Vec<TimeRange> {
        let mut ranges: Vec<TimeRange> = self
            .calls()
            .into_iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, r)| r)
            .collect();
        ranges.sort_by_key(|r| r.start());
        ranges
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSource for MockSource {
    async fn resolve_channel(&self, channel: &ChannelRef) -> Result<ChannelInfo, SyncError> {
        self.state
            .lock()
            .unwrap()
            .handles
            .get(channel.handle())
            .cloned()
            .ok_or_else(|| SyncError::source_unavailable(channel, "no such channel"))
    }

    async fn fetch(
        &self,
        channel_id: &ChannelId,
        range: TimeRange,
    ) -> Result<Vec<Message>, SyncError> {
        let (result, ignore_range) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push((channel_id.clone(), range));
            let fails = state.failing.iter().any(|f| f.intersect(&range).is_some())
                || state.failing_channels.contains(channel_id);
            let messages = state.messages.get(channel_id).cloned().unwrap_or_default();
            (if fails { None } else { Some(messages) }, *self.ignore_range.lock().unwrap())
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let messages = result
            .ok_or_else(|| SyncError::source_unavailable(channel_id, "connection reset"))?;
        Ok(messages
            .into_iter()
            .filter(|m| ignore_range || range.contains(m.timestamp))
            .collect())
    }

    async fn horizon(&self, _channel_id: &ChannelId) -> Result<Option<DateTime<Utc>>, SyncError> {
        Ok(*self.horizon.lock().unwrap())
    }
}

/// In-memory store whose `insert_messages` fails the first `failures` times.
#[derive(Clone, Default)]
pub struct FlakyStore {
    pub inner: InMemoryMessageStore,
    failures: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn failing(failures: usize) -> Self {
        Self {
            inner: InMemoryMessageStore::new(),
            failures: Arc::new(AtomicUsize::new(failures)),
        }
    }
}

#[async_trait]
impl MessageStore for FlakyStore {
    async fn get_coverage(
        &self,
        channel_id: &ChannelId,
        range: TimeRange,
    ) -> Result<Coverage, SyncError> {
        self.inner.get_coverage(channel_id, range).await
    }

    async fn insert_messages(
        &self,
        channel_id: &ChannelId,
        messages: &[Message],
    ) -> Result<u64, SyncError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SyncError::Store("disk I/O error".to_string()));
        }
        self.inner.insert_messages(channel_id, messages).await
    }

    async fn add_coverage(
        &self,
        channel_id: &ChannelId,
        range: TimeRange,
    ) -> Result<(), SyncError> {
        self.inner.add_coverage(channel_id, range).await
    }

    async fn query_messages(
        &self,
        channel_id: &ChannelId,
        range: TimeRange,
    ) -> Result<Vec<Message>, SyncError> {
        self.inner.query_messages(channel_id, range).await
    }
}
