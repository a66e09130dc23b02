#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use shortlink_coordinator::application::services::{
    BucketFormat, ClickAggregator, CodeLookup, LockedCacheResolver, ResolverSettings,
};
use shortlink_coordinator::domain::entities::{Alias, ClickCount, NewUrlRecord, UrlRecord};
use shortlink_coordinator::domain::repositories::{
    AliasRepository, ClickCountRepository, UrlRepository,
};
use shortlink_coordinator::error::AppError;
use shortlink_coordinator::infrastructure::coordination::{CoordinationStore, MemoryStore};
use shortlink_coordinator::utils::clock::{Clock, ManualClock};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 0).unwrap()
}

pub fn record(id: i64, long_url: &str) -> UrlRecord {
    UrlRecord::new(
        id,
        long_url.to_string(),
        format!("hash-{}", id),
        start() - chrono::Duration::days(1),
        None,
        None,
    )
}

/// In-memory url table that counts lookups and can simulate a slow datastore.
#[derive(Default)]
pub struct FakeUrls {
    records: Mutex<HashMap<i64, UrlRecord>>,
    delay: Option<Duration>,
    queries: AtomicUsize,
}

impl FakeUrls {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn insert(&self, record: UrlRecord) {
        self.records.lock().unwrap().insert(record.id, record);
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UrlRepository for FakeUrls {
    async fn find_by_id(&self, id: i64) -> Result<Option<UrlRecord>, AppError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_hash_and_url(
        &self,
        hash: &str,
        long_url: &str,
    ) -> Result<Option<UrlRecord>, AppError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|r| r.long_url_hash == hash && r.long_url == long_url)
            .cloned())
    }

    async fn create(&self, new_record: NewUrlRecord) -> Result<UrlRecord, AppError> {
        let mut records = self.records.lock().unwrap();
        let id = records.keys().max().copied().unwrap_or(0) + 1;
        let record = UrlRecord::new(
            id,
            new_record.long_url,
            new_record.long_url_hash,
            start(),
            new_record.expires_at,
            new_record.owner_id,
        );
        records.insert(id, record.clone());
        Ok(record)
    }
}

#[derive(Default)]
pub struct FakeAliases {
    aliases: Mutex<HashMap<String, UrlRecord>>,
}

impl FakeAliases {
    pub fn insert(&self, code: &str, record: UrlRecord) {
        self.aliases
            .lock()
            .unwrap()
            .insert(code.to_string(), record);
    }
}

#[async_trait]
impl AliasRepository for FakeAliases {
    async fn find_by_code(&self, code: &str) -> Result<Option<Alias>, AppError> {
        Ok(self
            .aliases
            .lock()
            .unwrap()
            .get(code)
            .map(|url| Alias::new(code.to_string(), url.clone())))
    }

    async fn exists(&self, code: &str) -> Result<bool, AppError> {
        Ok(self.aliases.lock().unwrap().contains_key(code))
    }
}

#[derive(Default)]
pub struct FakeClickCounts {
    counts: Mutex<HashMap<(DateTime<Utc>, i64), i64>>,
}

impl FakeClickCounts {
    pub fn get(&self, time: DateTime<Utc>, url_id: i64) -> Option<i64> {
        self.counts.lock().unwrap().get(&(time, url_id)).copied()
    }

    pub fn rows(&self) -> usize {
        self.counts.lock().unwrap().len()
    }
}

#[async_trait]
impl ClickCountRepository for FakeClickCounts {
    async fn add_clicks(
        &self,
        time: DateTime<Utc>,
        url_id: i64,
        count: i64,
    ) -> Result<ClickCount, AppError> {
        let mut counts = self.counts.lock().unwrap();
        let total = counts.entry((time, url_id)).or_insert(0);
        *total += count;
        Ok(ClickCount::new(time, url_id, *total))
    }

    async fn find(
        &self,
        time: DateTime<Utc>,
        url_id: i64,
    ) -> Result<Option<ClickCount>, AppError> {
        Ok(self.get(time, url_id).map(|c| ClickCount::new(time, url_id, c)))
    }

    async fn find_by_url_and_range(
        &self,
        url_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ClickCount>, AppError> {
        let mut rows: Vec<ClickCount> = self
            .counts
            .lock()
            .unwrap()
            .iter()
            .filter(|((time, id), _)| *id == url_id && *time >= from && *time <= to)
            .map(|((time, id), count)| ClickCount::new(*time, *id, *count))
            .collect();
        rows.sort_by_key(|c| c.time);
        Ok(rows)
    }
}

pub type TestResolver = LockedCacheResolver<FakeUrls, FakeAliases>;
pub type TestAggregator = ClickAggregator<FakeUrls, FakeAliases, FakeClickCounts>;

/// One process worth of collaborators sharing a store, clock and origin budget.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub urls: Arc<FakeUrls>,
    pub aliases: Arc<FakeAliases>,
    pub clicks: Arc<FakeClickCounts>,
    pub origin: Arc<Semaphore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_urls(FakeUrls::default())
    }

    pub fn with_urls(urls: FakeUrls) -> Self {
        let clock = Arc::new(ManualClock::new(start()));
        Self {
            store: Arc::new(MemoryStore::with_clock(clock.clone())),
            clock,
            urls: Arc::new(urls),
            aliases: Arc::new(FakeAliases::default()),
            clicks: Arc::new(FakeClickCounts::default()),
            origin: Arc::new(Semaphore::new(4)),
        }
    }

    pub fn store(&self) -> Arc<dyn CoordinationStore> {
        self.store.clone()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn lookup(&self) -> CodeLookup<FakeUrls, FakeAliases> {
        CodeLookup::new(self.urls.clone(), self.aliases.clone())
    }

    pub fn resolver(&self) -> TestResolver {
        LockedCacheResolver::new(
            self.store(),
            self.lookup(),
            self.origin.clone(),
            self.clock(),
            ResolverSettings::default(),
        )
    }

    pub fn aggregator(&self) -> TestAggregator {
        ClickAggregator::new(
            self.store(),
            self.lookup(),
            self.clicks.clone(),
            BucketFormat::default(),
            self.origin.clone(),
            self.clock(),
        )
    }
}

pub async fn insert_url(pool: &PgPool, long_url: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO short_url (long_url, long_url_hash) VALUES ($1, $2) RETURNING id",
    )
    .bind(long_url)
    .bind(shortlink_coordinator::utils::long_url::content_hash(long_url))
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn insert_alias(pool: &PgPool, code: &str, url_id: i64) {
    sqlx::query("INSERT INTO custom_url_code (code, url_id) VALUES ($1, $2)")
        .bind(code)
        .bind(url_id)
        .execute(pool)
        .await
        .unwrap();
}
