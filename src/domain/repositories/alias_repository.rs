//! Repository trait for custom alias lookups.

use crate::domain::entities::Alias;
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface for custom short codes.
///
/// Aliases are created together with their URL record
/// (see [`super::UrlRepository::create`]), so this trait is read-only.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AliasRepository: Send + Sync {
    /// Finds an alias together with the record it points at.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_code(&self, code: &str) -> Result<Option<Alias>, AppError>;

    /// Checks whether the alias is taken.
    async fn exists(&self, code: &str) -> Result<bool, AppError>;
}
