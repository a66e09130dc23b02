//! Outcome of flushing one click bucket.

use chrono::{DateTime, Utc};

/// Summary of a bucket flush.
///
/// `entries` counts the hash fields read; each one ends up either `persisted`
/// or `skipped`. A bucket that did not exist reports zero entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub bucket_key: String,
    pub bucket_time: DateTime<Utc>,
    pub entries: usize,
    pub persisted: usize,
    pub skipped: usize,
    pub clicks_persisted: i64,
}

impl FlushReport {
    pub fn empty(bucket_key: String, bucket_time: DateTime<Utc>) -> Self {
        Self {
            bucket_key,
            bucket_time,
            entries: 0,
            persisted: 0,
            skipped: 0,
            clicks_persisted: 0,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.entries == 0
    }
}
