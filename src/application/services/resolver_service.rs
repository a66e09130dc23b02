//! Single-flight, cache-aside short code resolution.
//!
//! On a cache miss exactly one caller (the lock holder) queries the datastore
//! and fills the cache; every concurrent caller polls for that answer instead
//! of querying too. Misses are never cached.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::code_lookup::CodeLookup;
use crate::domain::entities::UrlRecord;
use crate::domain::repositories::{AliasRepository, UrlRepository};
use crate::domain::short_code::ShortCode;
use crate::error::AppError;
use crate::infrastructure::coordination::CoordinationStore;
use crate::utils::clock::Clock;

/// Timing knobs of the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSettings {
    pub cache_ttl_seconds: u64,
    pub lock_ttl_seconds: u64,
    pub poll_interval: Duration,
    pub max_poll_retries: u32,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 3600,
            lock_ttl_seconds: 10,
            poll_interval: Duration::from_millis(100),
            max_poll_retries: 20,
        }
    }
}

pub fn cache_key(code: &str) -> String {
    format!("short:{}", code)
}

pub fn lock_key(code: &str) -> String {
    format!("lock:short:{}", code)
}

fn not_found(code: &str) -> AppError {
    AppError::not_found("Short link not found", json!({ "code": code }))
}

/// Resolves short codes to long URLs with stampede protection.
///
/// Every failure mode (unknown, expired, malformed, store outage, lock wait
/// exhausted) surfaces as [`AppError::NotFound`]. With the store down the
/// resolver fails closed instead of querying the datastore unprotected.
pub struct LockedCacheResolver<U: UrlRepository, A: AliasRepository> {
    store: Arc<dyn CoordinationStore>,
    lookup: CodeLookup<U, A>,
    origin: Arc<Semaphore>,
    clock: Arc<dyn Clock>,
    settings: ResolverSettings,
}

impl<U: UrlRepository, A: AliasRepository> LockedCacheResolver<U, A> {
    /// Creates a new resolver.
    ///
    /// `origin` bounds concurrent datastore queries; share it with the click
    /// aggregator so flushes and lookups draw from one budget.
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        lookup: CodeLookup<U, A>,
        origin: Arc<Semaphore>,
        clock: Arc<dyn Clock>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            store,
            lookup,
            origin,
            clock,
            settings,
        }
    }

    /// Returns the long URL for `code`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] whenever no URL can be served.
    pub async fn resolve(&self, code: &str) -> Result<String, AppError> {
        let parsed = ShortCode::parse(code);
        if parsed == ShortCode::Malformed {
            debug!(code, "Malformed short code");
            return Err(not_found(code));
        }

        let cache_key = cache_key(code);
        match self.store.get(&cache_key).await {
            Ok(Some(url)) if !url.is_empty() => {
                debug!(code, "Cache HIT");
                return Ok(url);
            }
            Ok(_) => debug!(code, "Cache MISS"),
            Err(e) => {
                warn!(code, "Cache read failed, refusing origin lookup: {}", e);
                return Err(not_found(code));
            }
        }

        let lock_key = lock_key(code);
        let token = format!("{:032x}", rand::random::<u128>());
        match self
            .store
            .set_nx_ex(&lock_key, &token, self.settings.lock_ttl_seconds)
            .await
        {
            Ok(true) => {
                debug!(code, "Lock acquired");
                self.resolve_as_holder(code, &parsed, &cache_key, &lock_key, &token)
                    .await
            }
            Ok(false) => self.wait_for_holder(code, &cache_key, &lock_key).await,
            Err(e) => {
                warn!(code, "Lock acquisition failed: {}", e);
                Err(not_found(code))
            }
        }
    }

    async fn resolve_as_holder(
        &self,
        code: &str,
        parsed: &ShortCode,
        cache_key: &str,
        lock_key: &str,
        token: &str,
    ) -> Result<String, AppError> {
        let now = self.clock.now();
        let result = match self.query_origin(parsed).await {
            Ok(Some(record)) if !record.is_expired_at(now) => {
                match self.cache_ttl_for(&record, now) {
                    Some(ttl) => {
                        if let Err(e) = self.store.set_ex(cache_key, &record.long_url, ttl).await {
                            warn!(code, "Cache write failed: {}", e);
                        }
                    }
                    None => debug!(code, "Record expires within a second, not caching"),
                }
                Ok(record.long_url)
            }
            Ok(Some(_)) => {
                debug!(code, "Record expired");
                Err(not_found(code))
            }
            Ok(None) => Err(not_found(code)),
            Err(e) => {
                warn!(code, "Origin lookup failed: {}", e);
                Err(not_found(code))
            }
        };

        match self.store.del_if_eq(lock_key, token).await {
            Ok(true) => debug!(code, "Lock released"),
            Ok(false) => warn!(code, "Lock expired before release"),
            Err(e) => warn!(code, "Lock release failed, waiting for TTL: {}", e),
        }

        result
    }

    /// Cache TTL for `record`, never outliving its expiry.
    ///
    /// Rounds down so a cached URL is gone no later than `expires_at`; `None`
    /// when less than a whole second remains.
    fn cache_ttl_for(&self, record: &UrlRecord, now: DateTime<Utc>) -> Option<u64> {
        let Some(expires_at) = record.expires_at else {
            return Some(self.settings.cache_ttl_seconds);
        };
        let remaining = u64::try_from((expires_at - now).num_seconds()).unwrap_or(0);
        match remaining.min(self.settings.cache_ttl_seconds) {
            0 => None,
            ttl => Some(ttl),
        }
    }

    async fn query_origin(
        &self,
        parsed: &ShortCode,
    ) -> Result<Option<UrlRecord>, AppError> {
        let _permit = self
            .origin
            .acquire()
            .await
            .map_err(|_| AppError::internal("Origin pool closed", json!({})))?;
        metrics::counter!("resolver_origin_queries_total").increment(1);
        self.lookup.find_record(parsed).await
    }

    async fn wait_for_holder(
        &self,
        code: &str,
        cache_key: &str,
        lock_key: &str,
    ) -> Result<String, AppError> {
        for attempt in 1..=self.settings.max_poll_retries {
            tokio::time::sleep(self.settings.poll_interval).await;

            if let Some(url) = self.cached(code, cache_key).await? {
                debug!(code, attempt, "Resolved by lock holder");
                return Ok(url);
            }

            match self.store.exists(lock_key).await {
                Ok(true) => continue,
                Ok(false) => {
                    // Holder finished without caching, or died; one last look.
                    return self
                        .cached(code, cache_key)
                        .await?
                        .ok_or_else(|| not_found(code));
                }
                Err(e) => {
                    warn!(code, "Lock check failed: {}", e);
                    return Err(not_found(code));
                }
            }
        }

        debug!(code, "Gave up waiting for lock holder");
        Err(not_found(code))
    }

    async fn cached(&self, code: &str, cache_key: &str) -> Result<Option<String>, AppError> {
        match self.store.get(cache_key).await {
            Ok(value) => Ok(value.filter(|url| !url.is_empty())),
            Err(e) => {
                warn!(code, "Cache read failed: {}", e);
                Err(not_found(code))
            }
        }
    }
}
