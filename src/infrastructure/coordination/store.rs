//! Coordination store trait and error types.

use async_trait::async_trait;
use std::collections::HashMap;

/// Errors raised by coordination store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Coordination store connection error: {0}")]
    Connection(String),

    #[error("Coordination store operation error: {0}")]
    Operation(String),

    /// The key holds a value of a different type or a non-integer where a
    /// counter was expected.
    #[error("Coordination store type error for key {key}: {message}")]
    WrongType { key: String, message: String },
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
            Self::Connection(e.to_string())
        } else {
            Self::Operation(e.to_string())
        }
    }
}

/// Result type for coordination store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared key-value store with TTLs and atomic primitives.
///
/// Every coordination decision in the crate (locks, counters, click buckets)
/// goes through this trait so that any number of processes sharing one backend
/// cooperate. Implementations must make each method atomic with respect to the
/// key it touches.
///
/// # Implementations
///
/// - [`crate::infrastructure::coordination::RedisStore`] - Redis, for multi-process deployments
/// - [`crate::infrastructure::coordination::MemoryStore`] - In-process, for single-node runs and tests
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Sets `key` unconditionally with a TTL in seconds.
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()>;

    /// Sets `key` only when it is absent. Returns `true` when this call created it.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<bool>;

    /// Deletes `key`. Returns `true` when a key was removed.
    async fn del(&self, key: &str) -> StoreResult<bool>;

    /// Deletes `key` only while it still holds `expected`.
    ///
    /// Used to release a lock without clobbering one re-acquired by another
    /// holder after our TTL lapsed.
    async fn del_if_eq(&self, key: &str, expected: &str) -> StoreResult<bool>;

    /// Adds `delta` to the integer at `key` and returns the new value.
    ///
    /// A missing key starts from zero and receives `ttl_seconds`; an existing
    /// key keeps its TTL unless it has none, in which case `ttl_seconds` is
    /// applied so no counter outlives its window.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::WrongType`] when the stored value is not an integer.
    async fn incr_by_with_ttl(&self, key: &str, delta: i64, ttl_seconds: u64) -> StoreResult<i64>;

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// Writes one hash field and never touches the key's TTL.
    ///
    /// An existing key keeps its expiry; a missing key is created without
    /// one and lives until deleted. Hashes that must expire are created with
    /// [`Self::hincr_by_with_ttl`].
    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;

    /// Adds `delta` to a hash field and (re)applies the key's TTL in one atomic step.
    async fn hincr_by_with_ttl(
        &self,
        key: &str,
        field: &str,
        delta: i64,
        ttl_seconds: u64,
    ) -> StoreResult<i64>;

    /// Returns every field of the hash; empty when the key is absent.
    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    async fn hdel(&self, key: &str, field: &str) -> StoreResult<bool>;

    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Lists keys starting with `prefix`.
    ///
    /// Diagnostic only: cost is proportional to the keyspace.
    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Checks if the backend is reachable.
    async fn ping(&self) -> bool;
}
