//! Repository trait for persisted click totals.

use crate::domain::entities::ClickCount;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Repository interface for the durable side of click aggregation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClickCountRepository: Send + Sync {
    /// Adds `count` to the row keyed by `(time, url_id)`, inserting it when absent.
    ///
    /// Returns the stored total after the addition.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors, including a missing
    /// `url_id` (foreign key violation).
    async fn add_clicks(
        &self,
        time: DateTime<Utc>,
        url_id: i64,
        count: i64,
    ) -> Result<ClickCount, AppError>;

    /// Finds the row for one bucket and URL.
    async fn find(&self, time: DateTime<Utc>, url_id: i64)
    -> Result<Option<ClickCount>, AppError>;

    /// Lists a URL's buckets in `[from, to]`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_url_and_range(
        &self,
        url_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ClickCount>, AppError>;
}
