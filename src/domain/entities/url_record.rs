//! URL record entity: the durable target of every short code.

use chrono::{DateTime, Utc};

/// A stored long URL.
///
/// `id` is the surrogate key encoded into sentinel-prefixed short codes, so it is
/// never reassigned. `(long_url_hash, long_url)` is unique across records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    pub id: i64,
    pub long_url: String,
    pub long_url_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub owner_id: Option<i64>,
}

impl UrlRecord {
    /// Creates a new UrlRecord instance.
    pub fn new(
        id: i64,
        long_url: String,
        long_url_hash: String,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
        owner_id: Option<i64>,
    ) -> Self {
        Self {
            id,
            long_url,
            long_url_hash,
            created_at,
            expires_at,
            owner_id,
        }
    }

    /// Returns true once `now` has reached the expiry instant.
    ///
    /// An expiry that is not after `now` counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|e| e <= now)
    }
}

/// Input data for inserting a URL record, optionally with its custom alias.
#[derive(Debug, Clone)]
pub struct NewUrlRecord {
    pub long_url: String,
    pub long_url_hash: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub owner_id: Option<i64>,
    pub alias: Option<String>,
}
