//! Maps a short code to its URL record across both code spaces.

use std::sync::Arc;

use crate::domain::entities::UrlRecord;
use crate::domain::repositories::{AliasRepository, UrlRepository};
use crate::domain::short_code::ShortCode;
use crate::error::AppError;

/// Shared lookup used by redirects, click flushing and analytics reads.
pub struct CodeLookup<U: UrlRepository, A: AliasRepository> {
    url_repository: Arc<U>,
    alias_repository: Arc<A>,
}

impl<U: UrlRepository, A: AliasRepository> Clone for CodeLookup<U, A> {
    fn clone(&self) -> Self {
        Self {
            url_repository: self.url_repository.clone(),
            alias_repository: self.alias_repository.clone(),
        }
    }
}

impl<U: UrlRepository, A: AliasRepository> CodeLookup<U, A> {
    pub fn new(url_repository: Arc<U>, alias_repository: Arc<A>) -> Self {
        Self {
            url_repository,
            alias_repository,
        }
    }

    /// Loads the record behind `code`, ignoring expiry.
    ///
    /// Malformed codes yield `Ok(None)`.
    pub async fn find_record(&self, code: &ShortCode) -> Result<Option<UrlRecord>, AppError> {
        match code {
            ShortCode::Encoded(id) => self.url_repository.find_by_id(*id).await,
            ShortCode::Alias(alias) => Ok(self
                .alias_repository
                .find_by_code(alias)
                .await?
                .map(|a| a.url)),
            ShortCode::Malformed => Ok(None),
        }
    }

    /// Resolves `code` to a record id.
    ///
    /// Encoded codes carry their id and need no query; existence is then
    /// enforced by whatever consumes the id.
    pub async fn find_url_id(&self, code: &ShortCode) -> Result<Option<i64>, AppError> {
        match code {
            ShortCode::Encoded(id) => Ok(Some(*id)),
            ShortCode::Alias(alias) => Ok(self
                .alias_repository
                .find_by_code(alias)
                .await?
                .map(|a| a.url.id)),
            ShortCode::Malformed => Ok(None),
        }
    }
}
