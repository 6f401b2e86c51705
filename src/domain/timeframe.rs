//! Time interval arithmetic

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A span of time bounded by two instants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFrame {
    pub from: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl TimeFrame {
    pub fn new(from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self { from, until }
    }

    /// `until` must be strictly after `from`
    pub fn is_valid(&self) -> bool {
        self.until > self.from
    }

    pub fn has_begun_by(&self, ts: DateTime<Utc>) -> bool {
        self.from <= ts
    }

    pub fn has_elapsed_by(&self, ts: DateTime<Utc>) -> bool {
        self.until <= ts
    }

    /// Begun but not yet elapsed
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.has_begun_by(ts) && !self.has_elapsed_by(ts)
    }

    /// Interiors intersect. Frames sharing only an endpoint do not overlap.
    pub fn overlaps_with(&self, other: &TimeFrame) -> bool {
        if other.from == self.until || other.until == self.from {
            return false;
        }

        other.contains(self.from)
            || other.contains(self.until)
            || self.contains(other.from)
            || self.contains(other.until)
    }

    pub fn begins_within(&self, outer: &TimeFrame) -> bool {
        outer.from <= self.from && self.from <= outer.until
    }

    pub fn ends_within(&self, outer: &TimeFrame) -> bool {
        outer.from <= self.until && self.until <= outer.until
    }
}

/// A frame positioned within an ordered schedule of frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencedTimeFrame {
    /// 1-based position of `current` in the schedule
    pub count: usize,
    pub total: usize,
    pub current: TimeFrame,
    pub next: Option<TimeFrame>,
}

impl SequencedTimeFrame {
    pub fn is_last(&self) -> bool {
        self.count == self.total
    }
}
