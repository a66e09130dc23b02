//! Redis-backed coordination store.

use super::store::{CoordinationStore, StoreError, StoreResult};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use std::collections::HashMap;
use std::time::Duration;
use tokio_retry::{
    Retry,
    strategy::{ExponentialBackoff, jitter},
};
use tracing::{debug, info, warn};

const CONNECT_ATTEMPTS: usize = 5;

const INCR_WITH_TTL: &str = r"
local v = redis.call('INCRBY', KEYS[1], ARGV[1])
if redis.call('TTL', KEYS[1]) < 0 then
    redis.call('EXPIRE', KEYS[1], ARGV[2])
end
return v
";

const DEL_IF_EQ: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
";

/// Redis coordination store.
///
/// Uses `ConnectionManager` for reconnecting, multiplexed access; each operation
/// clones the manager handle. Multi-step primitives run as Lua scripts or
/// `MULTI` pipelines so they stay atomic across processes.
pub struct RedisStore {
    conn: ConnectionManager,
    incr_with_ttl: Script,
    del_if_eq: Script,
}

impl RedisStore {
    /// Connects to Redis with exponential backoff and validates the
    /// connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the URL is invalid or every
    /// connection attempt fails.
    pub async fn connect(redis_url: &str) -> StoreResult<Self> {
        info!("Connecting to Redis");

        let client = Client::open(redis_url)
            .map_err(|e| StoreError::Connection(format!("Failed to create Redis client: {}", e)))?;

        let strategy = ExponentialBackoff::from_millis(10)
            .max_delay(Duration::from_secs(2))
            .map(jitter)
            .take(CONNECT_ATTEMPTS);

        let conn = Retry::spawn(strategy, || {
            let client = client.clone();
            async move {
                let mut conn = ConnectionManager::new(client).await.inspect_err(|e| {
                    warn!("Redis connection attempt failed: {}", e);
                })?;
                conn.ping::<()>().await?;
                Ok::<_, redis::RedisError>(conn)
            }
        })
        .await
        .map_err(|e| StoreError::Connection(format!("Failed to connect to Redis: {}", e)))?;

        info!("✓ Connected to Redis");

        Ok(Self {
            conn,
            incr_with_ttl: Script::new(INCR_WITH_TTL),
            del_if_eq: Script::new(DEL_IF_EQ),
        })
    }
}

fn map_counter_error(key: &str, e: redis::RedisError) -> StoreError {
    if e.to_string().contains("not an integer") {
        StoreError::WrongType {
            key: key.to_string(),
            message: e.to_string(),
        }
    } else {
        e.into()
    }
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await?;
        debug!(key, ttl_seconds, "SET EX");
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn del(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let removed: usize = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = self
            .del_if_eq
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn incr_by_with_ttl(&self, key: &str, delta: i64, ttl_seconds: u64) -> StoreResult<i64> {
        let mut conn = self.conn.clone();
        self.incr_with_ttl
            .key(key)
            .arg(delta)
            .arg(ttl_seconds)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| map_counter_error(key, e))
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.hget(key, field).await?)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(key, field, value).await?;
        Ok(())
    }

    async fn hincr_by_with_ttl(
        &self,
        key: &str,
        field: &str,
        delta: i64,
        ttl_seconds: u64,
    ) -> StoreResult<i64> {
        let mut conn = self.conn.clone();
        let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
        let (value,): (i64,) = redis::pipe()
            .atomic()
            .hincr(key, field, delta)
            .expire(key, ttl)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| map_counter_error(key, e))?;
        Ok(value)
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        Ok(conn.hgetall(key).await?)
    }

    async fn hdel(&self, key: &str, field: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let removed: usize = conn.hdel(key, field).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(key).await?)
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        conn.ping::<()>().await.is_ok()
    }
}
