//! In-process coordination store.

use super::store::{CoordinationStore, StoreError, StoreResult};
use crate::utils::clock::{Clock, SystemClock};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use std::collections::HashMap;
use std::sync::Arc;

const MAX_TTL_SECONDS: i64 = 100 * 365 * 24 * 3600;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// DashMap-backed store with lazily evaluated TTLs.
///
/// Each operation holds the shard lock of its key for its whole duration,
/// which gives the same per-key atomicity the Redis store gets from scripts.
/// Only cooperates within one process; use [`super::RedisStore`] when several
/// instances share traffic.
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a store whose TTLs are measured against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    fn deadline(&self, ttl_seconds: u64) -> DateTime<Utc> {
        let secs = i64::try_from(ttl_seconds)
            .unwrap_or(MAX_TTL_SECONDS)
            .min(MAX_TTL_SECONDS);
        self.clock
            .now()
            .checked_add_signed(Duration::seconds(secs))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Returns the live entry under `key`, evicting it first if expired.
    fn live_entry(&self, key: &str) -> MapEntry<'_, String, Entry> {
        let now = self.clock.now();
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(stale) if !stale.get().is_live(now) => {
                stale.remove();
                self.entries.entry(key.to_string())
            }
            slot => slot,
        }
    }

    fn wrong_type(key: &str, message: &str) -> StoreError {
        StoreError::WrongType {
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self.live_entry(key) {
            MapEntry::Occupied(e) => match &e.get().value {
                Value::Str(s) => Ok(Some(s.clone())),
                Value::Hash(_) => Err(Self::wrong_type(key, "not a string")),
            },
            MapEntry::Vacant(_) => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(self.deadline(ttl_seconds)),
            },
        );
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<bool> {
        let expires_at = Some(self.deadline(ttl_seconds));
        match self.live_entry(key) {
            MapEntry::Occupied(_) => Ok(false),
            MapEntry::Vacant(slot) => {
                slot.insert(Entry {
                    value: Value::Str(value.to_string()),
                    expires_at,
                });
                Ok(true)
            }
        }
    }

    async fn del(&self, key: &str) -> StoreResult<bool> {
        match self.live_entry(key) {
            MapEntry::Occupied(e) => {
                e.remove();
                Ok(true)
            }
            MapEntry::Vacant(_) => Ok(false),
        }
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> StoreResult<bool> {
        match self.live_entry(key) {
            MapEntry::Occupied(e) if matches!(&e.get().value, Value::Str(s) if s == expected) => {
                e.remove();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn incr_by_with_ttl(&self, key: &str, delta: i64, ttl_seconds: u64) -> StoreResult<i64> {
        let deadline = self.deadline(ttl_seconds);
        match self.live_entry(key) {
            MapEntry::Occupied(mut e) => {
                let entry = e.get_mut();
                let Value::Str(raw) = &entry.value else {
                    return Err(Self::wrong_type(key, "not a string"));
                };
                let current: i64 = raw
                    .parse()
                    .map_err(|_| Self::wrong_type(key, "value is not an integer"))?;
                let next = current
                    .checked_add(delta)
                    .ok_or_else(|| StoreError::Operation("increment overflow".to_string()))?;
                entry.value = Value::Str(next.to_string());
                entry.expires_at.get_or_insert(deadline);
                Ok(next)
            }
            MapEntry::Vacant(slot) => {
                slot.insert(Entry {
                    value: Value::Str(delta.to_string()),
                    expires_at: Some(deadline),
                });
                Ok(delta)
            }
        }
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        match self.live_entry(key) {
            MapEntry::Occupied(e) => match &e.get().value {
                Value::Hash(h) => Ok(h.get(field).cloned()),
                Value::Str(_) => Err(Self::wrong_type(key, "not a hash")),
            },
            MapEntry::Vacant(_) => Ok(None),
        }
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        match self.live_entry(key) {
            MapEntry::Occupied(mut e) => match &mut e.get_mut().value {
                Value::Hash(h) => {
                    h.insert(field.to_string(), value.to_string());
                    Ok(())
                }
                Value::Str(_) => Err(Self::wrong_type(key, "not a hash")),
            },
            MapEntry::Vacant(slot) => {
                slot.insert(Entry {
                    value: Value::Hash(HashMap::from([(field.to_string(), value.to_string())])),
                    expires_at: None,
                });
                Ok(())
            }
        }
    }

    async fn hincr_by_with_ttl(
        &self,
        key: &str,
        field: &str,
        delta: i64,
        ttl_seconds: u64,
    ) -> StoreResult<i64> {
        let deadline = Some(self.deadline(ttl_seconds));
        match self.live_entry(key) {
            MapEntry::Occupied(mut e) => {
                let entry = e.get_mut();
                let Value::Hash(h) = &mut entry.value else {
                    return Err(Self::wrong_type(key, "not a hash"));
                };
                let current: i64 = match h.get(field) {
                    Some(raw) => raw
                        .parse()
                        .map_err(|_| Self::wrong_type(key, "hash value is not an integer"))?,
                    None => 0,
                };
                let next = current
                    .checked_add(delta)
                    .ok_or_else(|| StoreError::Operation("increment overflow".to_string()))?;
                h.insert(field.to_string(), next.to_string());
                entry.expires_at = deadline;
                Ok(next)
            }
            MapEntry::Vacant(slot) => {
                slot.insert(Entry {
                    value: Value::Hash(HashMap::from([(field.to_string(), delta.to_string())])),
                    expires_at: deadline,
                });
                Ok(delta)
            }
        }
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        match self.live_entry(key) {
            MapEntry::Occupied(e) => match &e.get().value {
                Value::Hash(h) => Ok(h.clone()),
                Value::Str(_) => Err(Self::wrong_type(key, "not a hash")),
            },
            MapEntry::Vacant(_) => Ok(HashMap::new()),
        }
    }

    async fn hdel(&self, key: &str, field: &str) -> StoreResult<bool> {
        match self.live_entry(key) {
            MapEntry::Occupied(mut e) => {
                let Value::Hash(h) = &mut e.get_mut().value else {
                    return Err(Self::wrong_type(key, "not a hash"));
                };
                let removed = h.remove(field).is_some();
                if h.is_empty() {
                    e.remove();
                }
                Ok(removed)
            }
            MapEntry::Vacant(_) => Ok(false),
        }
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(matches!(self.live_entry(key), MapEntry::Occupied(_)))
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let now = self.clock.now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix) && e.value().is_live(now))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::ManualClock;
    use chrono::TimeZone;

    fn store() -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        (MemoryStore::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_set_ex_expires() {
        let (store, clock) = store();
        store.set_ex("k", "v", 10).await.unwrap();

        clock.advance(Duration::seconds(9));
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        clock.advance(Duration::seconds(1));
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_nx_only_first_wins() {
        let (store, clock) = store();
        assert!(store.set_nx_ex("lock", "a", 5).await.unwrap());
        assert!(!store.set_nx_ex("lock", "b", 5).await.unwrap());
        assert_eq!(store.get("lock").await.unwrap(), Some("a".to_string()));

        clock.advance(Duration::seconds(5));
        assert!(store.set_nx_ex("lock", "b", 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_del_if_eq_respects_owner() {
        let (store, _) = store();
        store.set_ex("lock", "owner", 5).await.unwrap();

        assert!(!store.del_if_eq("lock", "intruder").await.unwrap());
        assert!(store.exists("lock").await.unwrap());
        assert!(store.del_if_eq("lock", "owner").await.unwrap());
        assert!(!store.exists("lock").await.unwrap());
    }

    #[tokio::test]
    async fn test_incr_keeps_existing_ttl() {
        let (store, clock) = store();
        assert_eq!(store.incr_by_with_ttl("c", 5, 60).await.unwrap(), 5);

        clock.advance(Duration::seconds(30));
        assert_eq!(store.incr_by_with_ttl("c", -1, 60).await.unwrap(), 4);

        clock.advance(Duration::seconds(30));
        assert_eq!(store.get("c").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_incr_rejects_non_integer() {
        let (store, _) = store();
        store.set_ex("c", "garbage", 60).await.unwrap();

        let err = store.incr_by_with_ttl("c", -1, 60).await.unwrap_err();
        assert!(matches!(err, StoreError::WrongType { .. }));
    }

    #[tokio::test]
    async fn test_hash_operations() {
        let (store, clock) = store();
        assert_eq!(store.hincr_by_with_ttl("h", "a", 2, 10).await.unwrap(), 2);
        assert_eq!(store.hincr_by_with_ttl("h", "a", 3, 10).await.unwrap(), 5);
        store.hset("h", "b", "7").await.unwrap();

        assert_eq!(store.hget("h", "a").await.unwrap(), Some("5".to_string()));
        let all = store.hgetall("h").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["b"], "7");

        assert!(store.hdel("h", "b").await.unwrap());
        assert!(!store.hdel("h", "b").await.unwrap());

        clock.advance(Duration::seconds(10));
        assert!(store.hgetall("h").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hset_keeps_ttl_of_existing_hash() {
        let (store, clock) = store();
        store.hincr_by_with_ttl("h", "a", 1, 10).await.unwrap();

        clock.advance(Duration::seconds(5));
        store.hset("h", "b", "2").await.unwrap();

        clock.advance(Duration::seconds(5));
        assert!(!store.exists("h").await.unwrap());
    }

    #[tokio::test]
    async fn test_hset_creates_hash_without_ttl() {
        let (store, clock) = store();
        store.hset("plain", "a", "1").await.unwrap();

        clock.advance(Duration::days(30));
        assert_eq!(store.hget("plain", "a").await.unwrap(), Some("1".to_string()));

        store.hincr_by_with_ttl("plain", "a", 1, 10).await.unwrap();
        clock.advance(Duration::seconds(10));
        assert!(!store.exists("plain").await.unwrap());
    }

    #[tokio::test]
    async fn test_scan_prefix_skips_expired() {
        let (store, clock) = store();
        store.set_ex("analytics:1", "x", 5).await.unwrap();
        store.set_ex("analytics:2", "x", 50).await.unwrap();
        store.set_ex("other", "x", 50).await.unwrap();

        clock.advance(Duration::seconds(5));
        assert_eq!(
            store.scan_prefix("analytics:").await.unwrap(),
            vec!["analytics:2".to_string()]
        );
    }
}
