//! Half-open time ranges `[start, end)`.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Half-open interval `[start, end)` with `start < end`.
///
/// A start equal to `DateTime::<Utc>::MIN_UTC` stands for negative infinity
/// (the channel's full available history).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTimeRange")]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawTimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawTimeRange> for TimeRange {
    type Error = SyncError;

    fn try_from(raw: RawTimeRange) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(SyncError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Everything before `end`.
    pub fn from_beginning(end: DateTime<Utc>) -> Result<Self> {
        Self::new(DateTime::<Utc>::MIN_UTC, end)
    }

    /// The `days` days ending at `now`.
    pub fn last_days(now: DateTime<Utc>, days: u32) -> Result<Self> {
        let start = now
            .checked_sub_signed(Duration::days(i64::from(days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self::new(start, now)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn is_unbounded_start(&self) -> bool {
        self.start == DateTime::<Utc>::MIN_UTC
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }

    /// True when the ranges share a point or meet end-to-start.
    pub fn touches(&self, other: &TimeRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Overlapping part of both ranges, if non-empty.
    pub fn intersect(&self, other: &TimeRange) -> Option<TimeRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        Self::new(start, end).ok()
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unbounded_start() {
            write!(f, "[-inf, {})", self.end.to_rfc3339())
        } else {
            write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
        }
    }
}
