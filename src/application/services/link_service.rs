//! Short link creation service.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use crate::domain::entities::{NewUrlRecord, UrlRecord};
use crate::domain::repositories::{AliasRepository, UrlRepository};
use crate::domain::short_code::ShortCode;
use crate::error::AppError;
use crate::utils::clock::Clock;
use crate::utils::custom_code::validate_custom_code;
use crate::utils::long_url::LongUrl;

/// Input of [`LinkService::create_short_link`].
#[derive(Debug, Clone, Default)]
pub struct CreateLinkRequest {
    pub long_url: String,
    pub custom_code: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub owner_id: Option<i64>,
}

/// A freshly created short link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedLink {
    pub code: String,
    pub short_url: String,
    pub record: UrlRecord,
}

/// Service for creating shortened links.
///
/// A long URL is shortened at most once: creating it again is a conflict, not
/// a lookup. Custom aliases live beside encoded ids; they can never start
/// with the sentinel prefix, so the two code spaces cannot collide.
pub struct LinkService<U: UrlRepository, A: AliasRepository> {
    url_repository: Arc<U>,
    alias_repository: Arc<A>,
    clock: Arc<dyn Clock>,
    base_url: String,
}

impl<U: UrlRepository, A: AliasRepository> LinkService<U, A> {
    /// Creates a new link service.
    ///
    /// `base_url` prefixes every returned short URL (`{base_url}/{code}`).
    pub fn new(
        url_repository: Arc<U>,
        alias_repository: Arc<A>,
        clock: Arc<dyn Clock>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            url_repository,
            alias_repository,
            clock,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Creates a short link.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if:
    /// - URL is invalid or not http(s)
    /// - Custom code is invalid
    /// - Expiry is not in the future
    ///
    /// Returns [`AppError::Conflict`] if the custom code is taken or the long
    /// URL has already been shortened.
    pub async fn create_short_link(
        &self,
        request: CreateLinkRequest,
    ) -> Result<CreatedLink, AppError> {
        let long_url = LongUrl::parse(&request.long_url).map_err(|e| {
            AppError::bad_request("Invalid URL format", json!({ "reason": e.to_string() }))
        })?;

        if let Some(expires_at) = request.expires_at
            && expires_at <= self.clock.now()
        {
            return Err(AppError::bad_request(
                "Expiry must be in the future",
                json!({ "expires_at": expires_at }),
            ));
        }

        if let Some(custom) = request.custom_code.as_deref() {
            validate_custom_code(custom)?;

            if self.alias_repository.exists(custom).await? {
                return Err(AppError::conflict(
                    "Custom short URL already exists",
                    json!({ "code": custom }),
                ));
            }
        }

        if self
            .url_repository
            .find_by_hash_and_url(long_url.hash(), long_url.as_str())
            .await?
            .is_some()
        {
            return Err(AppError::conflict(
                "A short URL exists for the long URL",
                json!({ "long_url": long_url.as_str() }),
            ));
        }

        let (long_url, long_url_hash) = long_url.into_parts();
        let record = self
            .url_repository
            .create(NewUrlRecord {
                long_url,
                long_url_hash,
                expires_at: request.expires_at,
                owner_id: request.owner_id,
                alias: request.custom_code.clone(),
            })
            .await?;

        let code = request
            .custom_code
            .unwrap_or_else(|| ShortCode::for_id(record.id));
        let short_url = self.short_url(&code);

        info!(code = %code, id = record.id, "Short link created");

        Ok(CreatedLink {
            code,
            short_url,
            record,
        })
    }

    /// Constructs the full short URL for a code.
    pub fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.base_url, code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::{MockAliasRepository, MockUrlRepository};
    use crate::utils::clock::ManualClock;
    use crate::utils::long_url::content_hash;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn created(id: i64, new: &NewUrlRecord) -> UrlRecord {
        UrlRecord::new(
            id,
            new.long_url.clone(),
            new.long_url_hash.clone(),
            now(),
            new.expires_at,
            new.owner_id,
        )
    }

    fn service(
        urls: MockUrlRepository,
        aliases: MockAliasRepository,
    ) -> LinkService<MockUrlRepository, MockAliasRepository> {
        LinkService::new(
            Arc::new(urls),
            Arc::new(aliases),
            Arc::new(ManualClock::new(now())),
            "https://sho.rt/",
        )
    }

    fn request(url: &str) -> CreateLinkRequest {
        CreateLinkRequest {
            long_url: url.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_short_link_encodes_id() {
        let mut urls = MockUrlRepository::new();
        urls.expect_find_by_hash_and_url()
            .withf(|hash, url| url == "https://example.com/" && hash == content_hash(url))
            .times(1)
            .returning(|_, _| Ok(None));
        urls.expect_create()
            .withf(|new| new.alias.is_none())
            .times(1)
            .returning(|new| Ok(created(42, &new)));

        let link = service(urls, MockAliasRepository::new())
            .create_short_link(request("https://EXAMPLE.com"))
            .await
            .unwrap();

        assert_eq!(link.code, "_Q");
        assert_eq!(link.short_url, "https://sho.rt/_Q");
        assert_eq!(link.record.long_url, "https://example.com/");
    }

    #[tokio::test]
    async fn test_create_short_link_with_custom_code() {
        let mut urls = MockUrlRepository::new();
        urls.expect_find_by_hash_and_url()
            .times(1)
            .returning(|_, _| Ok(None));
        urls.expect_create()
            .withf(|new| new.alias.as_deref() == Some("promo") && new.owner_id == Some(7))
            .times(1)
            .returning(|new| Ok(created(5, &new)));

        let mut aliases = MockAliasRepository::new();
        aliases
            .expect_exists()
            .withf(|code| code == "promo")
            .times(1)
            .returning(|_| Ok(false));

        let link = service(urls, aliases)
            .create_short_link(CreateLinkRequest {
                long_url: "https://example.com/sale".to_string(),
                custom_code: Some("promo".to_string()),
                owner_id: Some(7),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(link.code, "promo");
        assert_eq!(link.short_url, "https://sho.rt/promo");
    }

    #[tokio::test]
    async fn test_create_short_link_custom_code_conflict() {
        let mut aliases = MockAliasRepository::new();
        aliases.expect_exists().times(1).returning(|_| Ok(true));
        let mut urls = MockUrlRepository::new();
        urls.expect_create().times(0);

        let err = service(urls, aliases)
            .create_short_link(CreateLinkRequest {
                long_url: "https://example.com".to_string(),
                custom_code: Some("taken".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict { .. }));
        assert_eq!(err.to_string(), "Custom short URL already exists");
    }

    #[tokio::test]
    async fn test_create_short_link_duplicate_long_url() {
        let mut urls = MockUrlRepository::new();
        urls.expect_find_by_hash_and_url()
            .times(1)
            .returning(|hash, url| {
                Ok(Some(UrlRecord::new(
                    1,
                    url.to_string(),
                    hash.to_string(),
                    now(),
                    None,
                    None,
                )))
            });
        urls.expect_create().times(0);

        let err = service(urls, MockAliasRepository::new())
            .create_short_link(request("https://example.com"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "A short URL exists for the long URL");
    }

    #[tokio::test]
    async fn test_create_short_link_rejects_invalid_input() {
        let svc = service(MockUrlRepository::new(), MockAliasRepository::new());

        let err = svc.create_short_link(request("not-a-url")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = svc
            .create_short_link(request("ftp://example.com/file"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = svc
            .create_short_link(CreateLinkRequest {
                long_url: "https://example.com".to_string(),
                custom_code: Some("_sneaky".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = svc
            .create_short_link(CreateLinkRequest {
                long_url: "https://example.com".to_string(),
                expires_at: Some(now() - Duration::minutes(1)),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }
}
