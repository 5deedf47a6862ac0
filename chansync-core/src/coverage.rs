//! # Coverage
//!
//! The set of time ranges for which a channel's stored messages are known to be complete.
//!
//! Invariant: ranges are sorted by start, pairwise disjoint and never adjacent
//! (`a.end < b.start` for consecutive `a`, `b`). Every constructor and mutator restores it.

use serde::{Deserialize, Serialize};

use crate::range::TimeRange;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    ranges: Vec<TimeRange>,
}

impl Coverage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes arbitrary (unsorted, overlapping, adjacent) ranges.
    pub fn from_ranges<I>(ranges: I) -> Self
    where
        I: IntoIterator<Item = TimeRange>,
    {
        let mut sorted: Vec<TimeRange> = ranges.into_iter().collect();
        sorted.sort_by_key(|r| (r.start(), r.end()));

        let mut merged: Vec<TimeRange> = Vec::with_capacity(sorted.len());
        for range in sorted {
            match merged.last_mut() {
                Some(last) if last.touches(&range) => {
                    if range.end() > last.end() {
                        // last.start() <= range.start() < range.end(), never empty
                        *last = TimeRange::new(last.start(), range.end()).unwrap_or(*last);
                    }
                }
                _ => merged.push(range),
            }
        }

        Self { ranges: merged }
    }

    /// Adds `range`, merging it with every overlapping or adjacent interval.
    pub fn insert(&mut self, range: TimeRange) {
        let ranges = std::mem::take(&mut self.ranges);
        *self = Self::from_ranges(ranges.into_iter().chain(std::iter::once(range)));
    }

    pub fn ranges(&self) -> &[TimeRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Intersection with `requested`.
    pub fn clip(&self, requested: &TimeRange) -> Coverage {
        Self {
            ranges: self
                .ranges
                .iter()
                .filter_map(|r| r.intersect(requested))
                .collect(),
        }
    }

    /// Sub-ranges of `requested` not covered, in ascending order.
    pub fn gaps(&self, requested: &TimeRange) -> Vec<TimeRange> {
        let mut gaps = Vec::new();
        let mut cursor = requested.start();

        for covered in self.clip(requested).ranges {
            if covered.start() > cursor {
                if let Ok(gap) = TimeRange::new(cursor, covered.start()) {
                    gaps.push(gap);
                }
            }
            cursor = cursor.max(covered.end());
        }

        if cursor < requested.end() {
            if let Ok(gap) = TimeRange::new(cursor, requested.end()) {
                gaps.push(gap);
            }
        }

        gaps
    }

    pub fn covers(&self, requested: &TimeRange) -> bool {
        self.gaps(requested).is_empty()
    }
}

impl FromIterator<TimeRange> for Coverage {
    fn from_iter<I: IntoIterator<Item = TimeRange>>(iter: I) -> Self {
        Self::from_ranges(iter)
    }
}
