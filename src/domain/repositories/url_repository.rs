//! Repository trait for URL record data access.

use crate::domain::entities::{NewUrlRecord, UrlRecord};
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface for stored long URLs.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgUrlRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlRepository: Send + Sync {
    /// Finds a record by its surrogate id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_id(&self, id: i64) -> Result<Option<UrlRecord>, AppError>;

    /// Finds the record holding exactly this long URL.
    ///
    /// The hash narrows the lookup to an index scan; the URL comparison guards
    /// against hash collisions.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_hash_and_url(
        &self,
        hash: &str,
        long_url: &str,
    ) -> Result<Option<UrlRecord>, AppError>;

    /// Inserts a record and, when `new_record.alias` is set, its custom alias
    /// in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the long URL or the alias already exists.
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn create(&self, new_record: NewUrlRecord) -> Result<UrlRecord, AppError>;
}
