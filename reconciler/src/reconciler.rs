//! Range reconciliation: coverage lookup, gap fetch, idempotent persist, coverage merge.

use std::collections::HashSet;
use std::sync::Arc;

use chansync_core::{
    ChannelId, ChannelRef, FetchRequest, Message, MessageSource, MessageStore, Result, SyncError,
    TimeRange,
};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelToken;
use crate::config::ReconcilerConfig;
use crate::locks::ChannelLocks;
use crate::outcome::{GapFailure, ReconcileOutcome, SyncedChannel};

/// Fetches only what the store does not already cover.
///
/// Each gap is an independent unit of work: a failed gap is reported and left uncovered
/// while the others are persisted and recorded. Coverage updates for one channel are
/// serialized; gap fetches for one channel run with bounded parallelism.
pub struct RangeReconciler {
    store: Arc<dyn MessageStore>,
    source: Arc<dyn MessageSource>,
    config: ReconcilerConfig,
    locks: ChannelLocks,
}

impl RangeReconciler {
    pub fn new(store: Arc<dyn MessageStore>, source: Arc<dyn MessageSource>) -> Self {
        Self::with_config(store, source, ReconcilerConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn MessageStore>,
        source: Arc<dyn MessageSource>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            source,
            config,
            locks: ChannelLocks::default(),
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Reconciles `[start, end)`; fails with `InvalidRange` before any I/O when `start >= end`.
    pub async fn reconcile_between(
        &self,
        channel_id: &ChannelId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ReconcileOutcome> {
        let range = TimeRange::new(start, end)?;
        self.reconcile(channel_id, range).await
    }

    pub async fn reconcile(
        &self,
        channel_id: &ChannelId,
        range: TimeRange,
    ) -> Result<ReconcileOutcome> {
        self.reconcile_with_cancel(channel_id, range, &CancelToken::never())
            .await
    }

    /// Reconciles one channel.
    ///
    /// Returns `Err` only when the store cannot report coverage or return the final
    /// message set; per-gap failures are collected in [`ReconcileOutcome::failed`].
    #[instrument(skip_all, fields(channel = %channel_id, range = %range))]
    pub async fn reconcile_with_cancel(
        &self,
        channel_id: &ChannelId,
        range: TimeRange,
        cancel: &CancelToken,
    ) -> Result<ReconcileOutcome> {
        let coverage = self.store.get_coverage(channel_id, range).await?;
        let gaps = coverage.gaps(&range);

        info!(
            covered = coverage.len(),
            gaps = gaps.len(),
            "step: reconcile computed gaps"
        );

        let results: Vec<(TimeRange, Result<FilledGap>)> = stream::iter(gaps)
            .map(|gap| async move { (gap, self.fill_gap(channel_id, gap, cancel).await) })
            .buffer_unordered(self.config.max_concurrent_fetches.max(1))
            .collect()
            .await;

        let mut fetched = Vec::new();
        let mut failed = Vec::new();
        let mut inserted = 0;
        for (gap, result) in results {
            match result {
                Ok(filled) => {
                    fetched.push(filled.covered);
                    inserted += filled.inserted;
                    if filled.covered.end() < gap.end() {
                        if let Ok(rest) = TimeRange::new(filled.covered.end(), gap.end()) {
                            failed.push(GapFailure {
                                range: rest,
                                error: beyond_horizon(channel_id, filled.covered.end()),
                            });
                        }
                    }
                }
                Err(error) => failed.push(GapFailure { range: gap, error }),
            }
        }
        fetched.sort_by_key(|r| r.start());
        failed.sort_by_key(|f| f.range.start());

        let messages = self.store.query_messages(channel_id, range).await?;

        if failed.is_empty() {
            info!(
                fetched = fetched.len(),
                inserted,
                messages = messages.len(),
                "step: reconcile done"
            );
        } else {
            warn!(
                fetched = fetched.len(),
                failed = failed.len(),
                inserted,
                messages = messages.len(),
                "step: reconcile done with failed gaps"
            );
        }

        Ok(ReconcileOutcome {
            channel_id: channel_id.clone(),
            range,
            messages,
            fetched,
            failed,
            inserted,
        })
    }

    /// Fetch, persist and record one gap. Coverage is recorded only after the
    /// messages are stored, and only up to the source's horizon.
    async fn fill_gap(
        &self,
        channel_id: &ChannelId,
        gap: TimeRange,
        cancel: &CancelToken,
    ) -> Result<FilledGap> {
        if cancel.is_cancelled() {
            debug!(channel = %channel_id, gap = %gap, "Skipping gap, request cancelled");
            return Err(SyncError::Cancelled);
        }

        debug!(channel = %channel_id, gap = %gap, "Fetching gap");
        let request = async {
            let target = match self.source.horizon(channel_id).await? {
                Some(horizon) if horizon <= gap.start() => {
                    return Err(beyond_horizon(channel_id, horizon));
                }
                Some(horizon) if horizon < gap.end() => TimeRange::new(gap.start(), horizon)?,
                _ => gap,
            };
            let messages = self.source.fetch(channel_id, target).await?;
            Ok::<_, SyncError>((target, messages))
        };

        let result = tokio::time::timeout(self.config.fetch_timeout, request).await;
        let (target, fetched) = match result {
            Ok(Ok(fetched)) => fetched,
            Ok(Err(e)) => {
                warn!(channel = %channel_id, gap = %gap, error = %e, "Gap fetch failed");
                return Err(e);
            }
            Err(_) => {
                warn!(
                    channel = %channel_id,
                    gap = %gap,
                    timeout_secs = self.config.fetch_timeout.as_secs_f64(),
                    "Gap fetch timed out"
                );
                return Err(SyncError::timeout(
                    channel_id,
                    self.config.fetch_timeout.as_secs(),
                ));
            }
        };
        if target != gap {
            debug!(
                channel = %channel_id,
                gap = %gap,
                horizon = %target.end(),
                "Source horizon cuts gap short"
            );
        }

        let batch = prepare_batch(channel_id, target, fetched);
        let inserted = self.store.insert_messages(channel_id, &batch).await?;

        let lock = self.locks.lock_for(channel_id);
        let _guard = lock.lock().await;
        self.store.add_coverage(channel_id, target).await?;

        debug!(
            channel = %channel_id,
            range = %target,
            received = batch.len(),
            inserted,
            "Gap filled"
        );
        Ok(FilledGap {
            covered: target,
            inserted,
        })
    }

    /// Reconciles several channels concurrently. Results follow request order.
    pub async fn reconcile_many(
        &self,
        requests: Vec<FetchRequest>,
        cancel: &CancelToken,
    ) -> Vec<(ChannelId, Result<ReconcileOutcome>)> {
        stream::iter(requests)
            .map(|request| async move {
                let result = self
                    .reconcile_with_cancel(&request.channel_id, request.range, cancel)
                    .await;
                (request.channel_id, result)
            })
            .buffered(self.config.max_concurrent_channels.max(1))
            .collect()
            .await
    }

    /// Resolves each channel reference through the source, then reconciles `range` for it.
    pub async fn sync_channels(
        &self,
        channels: &[ChannelRef],
        range: TimeRange,
        cancel: &CancelToken,
    ) -> Vec<(ChannelRef, Result<SyncedChannel>)> {
        info!(channels = channels.len(), range = %range, "step: sync channels");

        stream::iter(channels.iter().cloned())
            .map(|channel| async move {
                let result = self.sync_channel(&channel, range, cancel).await;
                (channel, result)
            })
            .buffered(self.config.max_concurrent_channels.max(1))
            .collect()
            .await
    }

    async fn sync_channel(
        &self,
        channel: &ChannelRef,
        range: TimeRange,
        cancel: &CancelToken,
    ) -> Result<SyncedChannel> {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let info = self.source.resolve_channel(channel).await.map_err(|e| {
            warn!(channel = %channel, error = %e, "Failed to resolve channel");
            e
        })?;
        info!(channel = %channel, id = %info.id, title = ?info.title, "Resolved channel");

        let outcome = self.reconcile_with_cancel(&info.id, range, cancel).await?;
        Ok(SyncedChannel { info, outcome })
    }
}

/// Part of a gap fetched and recorded as covered.
struct FilledGap {
    covered: TimeRange,
    inserted: u64,
}

fn beyond_horizon(channel_id: &ChannelId, horizon: DateTime<Utc>) -> SyncError {
    SyncError::source_unavailable(
        channel_id,
        format!("source holds no data after {}", horizon.to_rfc3339()),
    )
}

/// Keeps messages of `channel_id` inside `gap`, first occurrence per message id.
fn prepare_batch(channel_id: &ChannelId, gap: TimeRange, fetched: Vec<Message>) -> Vec<Message> {
    let total = fetched.len();
    let mut seen = HashSet::with_capacity(total);
    let mut out_of_range = 0usize;

    let batch: Vec<Message> = fetched
        .into_iter()
        .filter(|m| {
            let keep = m.channel_id == *channel_id && gap.contains(m.timestamp);
            if !keep {
                out_of_range += 1;
            }
            keep
        })
        .filter(|m| seen.insert(m.message_id))
        .collect();

    if out_of_range > 0 {
        warn!(
            channel = %channel_id,
            gap = %gap,
            dropped = out_of_range,
            "Source returned messages outside the requested gap"
        );
    }
    if batch.len() + out_of_range < total {
        debug!(
            channel = %channel_id,
            duplicates = total - batch.len() - out_of_range,
            "Dropped duplicate message ids in fetched batch"
        );
    }

    batch
}
