//! Persisted click counter for one (bucket, url) pair.

use chrono::{DateTime, Utc};

/// Durable click total for a URL within one aggregation bucket.
///
/// `time` is the canonical bucket timestamp (fields below the bucket's
/// granularity zeroed). Rows are only ever added to, never overwritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickCount {
    pub time: DateTime<Utc>,
    pub url_id: i64,
    pub count: i64,
}

impl ClickCount {
    pub fn new(time: DateTime<Utc>, url_id: i64, count: i64) -> Self {
        Self {
            time,
            url_id,
            count,
        }
    }
}
