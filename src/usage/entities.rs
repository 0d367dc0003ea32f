use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Foreground usage of a single package inside one query window. Produced by a
/// [crate::platform::UsageSource] and never mutated afterwards.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct UsageRecord {
    pub package: Arc<str>,
    pub foreground_ms: u64,
}

impl UsageRecord {
    pub fn new(package: impl Into<Arc<str>>, foreground_ms: u64) -> Self {
        Self {
            package: package.into(),
            foreground_ms,
        }
    }

    pub fn foreground_seconds(&self) -> u64 {
        self.foreground_ms / 1000
    }
}

/// A row that is ready to be shown to the user. Recomputed on every refresh.
#[derive(PartialEq, Eq, Debug, Serialize, Clone)]
pub struct DisplayEntry {
    pub name: String,
    pub formatted_duration: String,
}

/// Range of time usage is queried for.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct QueryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl QueryWindow {
    /// Rolling 24 hours ending at `end`.
    pub fn last_day(end: DateTime<Utc>) -> Self {
        Self {
            start: end - Duration::days(1),
            end,
        }
    }

    pub fn start_millis(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_millis(&self) -> i64 {
        self.end.timestamp_millis()
    }

    /// Whether `[start, end]` intersects with the window.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start <= self.end && end >= self.start
    }
}
