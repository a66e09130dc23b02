//! Fixed-window admission control backed by the coordination store.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::infrastructure::coordination::{CoordinationStore, StoreError};

/// Decrementing fixed-window counter.
///
/// A window starts with the first request for a key: the counter is seeded
/// with the capacity and a TTL of one window, then each admission decrements
/// it. Denials leave the counter and its TTL untouched, so capacity returns
/// exactly one window after the window started. Up to twice the capacity can
/// pass across a window boundary.
pub struct RateLimiter {
    store: Arc<dyn CoordinationStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self { store }
    }

    /// Decides whether one more request under `key` fits in the current window.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`StoreError`] when the store is unreachable.
    pub async fn admit(
        &self,
        key: &str,
        window_seconds: u64,
        capacity: i64,
    ) -> Result<bool, StoreError> {
        let seed = capacity.to_string();

        match self.store.get(key).await? {
            None => {
                // A concurrent request may win the seed; either way the counter exists now.
                self.store.set_nx_ex(key, &seed, window_seconds).await?;
            }
            Some(raw) => match raw.parse::<i64>() {
                Ok(remaining) if remaining <= 0 => {
                    debug!(key, "Rate limit window exhausted");
                    return Ok(false);
                }
                Ok(_) => {}
                Err(_) => {
                    warn!(key, value = %raw, "Non-numeric rate limit counter, reinitializing");
                    self.store.set_ex(key, &seed, window_seconds).await?;
                }
            },
        }

        let remaining = self.store.incr_by_with_ttl(key, -1, window_seconds).await?;
        Ok(remaining >= 0)
    }
}

/// One rate limit instance: its key namespace, window and capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub name: &'static str,
    pub key_prefix: &'static str,
    pub window_seconds: u64,
    pub capacity: i64,
}

impl RateLimitPolicy {
    pub fn redirect(window_seconds: u64, capacity: i64) -> Self {
        Self {
            name: "redirect",
            key_prefix: "rate_limit:get:",
            window_seconds,
            capacity,
        }
    }

    pub fn creation(window_seconds: u64, capacity: i64) -> Self {
        Self {
            name: "creation",
            key_prefix: "rate_limit:post:",
            window_seconds,
            capacity,
        }
    }

    pub fn key(&self, subject: &str) -> String {
        format!("{}{}", self.key_prefix, subject)
    }
}

/// A [`RateLimiter`] bound to one policy.
pub struct PolicyLimiter {
    limiter: RateLimiter,
    policy: RateLimitPolicy,
}

impl PolicyLimiter {
    pub fn new(store: Arc<dyn CoordinationStore>, policy: RateLimitPolicy) -> Self {
        Self {
            limiter: RateLimiter::new(store),
            policy,
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Returns `true` when `subject` may proceed.
    ///
    /// A store failure admits the request: throttling is a protection, not a
    /// precondition for serving.
    pub async fn admit(&self, subject: &str) -> bool {
        let key = self.policy.key(subject);
        match self
            .limiter
            .admit(&key, self.policy.window_seconds, self.policy.capacity)
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                metrics::counter!("rate_limit_denied_total", "limiter" => self.policy.name)
                    .increment(1);
                false
            }
            Err(e) => {
                warn!(limiter = self.policy.name, key = %key, "Rate limiter unavailable, admitting: {}", e);
                true
            }
        }
    }

    /// Like [`Self::admit`] but maps a denial to [`AppError::RateLimited`].
    pub async fn check(&self, subject: &str) -> Result<(), AppError> {
        if self.admit(subject).await {
            Ok(())
        } else {
            Err(AppError::rate_limited(
                "Too many requests",
                json!({
                    "limiter": self.policy.name,
                    "retry_after_seconds": self.policy.window_seconds,
                }),
            ))
        }
    }
}

/// The two independent limiters: redirects keyed by short code, creations
/// keyed by authenticated principal.
pub struct AdmissionControl {
    pub redirect: PolicyLimiter,
    pub creation: PolicyLimiter,
}

impl AdmissionControl {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        redirect: RateLimitPolicy,
        creation: RateLimitPolicy,
    ) -> Self {
        Self {
            redirect: PolicyLimiter::new(store.clone(), redirect),
            creation: PolicyLimiter::new(store, creation),
        }
    }
}
