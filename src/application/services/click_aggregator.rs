//! Write-behind click counting.
//!
//! Clicks are counted in per-bucket hashes in the coordination store
//! (`analytics:{bucket}` → `{short code}` → count). Once a bucket has closed
//! it is flushed into the datastore and deleted.
//!
//! A flush is at-most-once per attempt: a crash after persisting but before the
//! delete double-counts on the next flush of that key; a crash before the
//! persist loses the bucket.
//!
//! Scheduled flushes remember the last bucket they flushed and catch up on
//! every bucket that closed since, so a tick that fires late or just before
//! a boundary never strands a bucket.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::{Mutex, Semaphore, mpsc};
use tracing::{debug, info, warn};

use super::bucket_format::{BUCKET_KEY_PREFIX, BucketFormat};
use super::code_lookup::CodeLookup;
use crate::domain::click_event::ClickEvent;
use crate::domain::click_worker::ClickSink;
use crate::domain::entities::FlushReport;
use crate::domain::flush_scheduler::BucketFlusher;
use crate::domain::repositories::{AliasRepository, ClickCountRepository, UrlRepository};
use crate::domain::short_code::ShortCode;
use crate::error::AppError;
use crate::infrastructure::coordination::CoordinationStore;
use crate::utils::clock::Clock;

/// Non-blocking entry point for the redirect path.
///
/// Cloneable; every clone feeds the same bounded queue.
#[derive(Clone)]
pub struct ClickRecorder {
    tx: mpsc::Sender<ClickEvent>,
    clock: Arc<dyn Clock>,
}

/// Creates a recorder and the receiving end for [`crate::domain::click_worker::run_click_worker`].
pub fn click_channel(
    capacity: usize,
    clock: Arc<dyn Clock>,
) -> (ClickRecorder, mpsc::Receiver<ClickEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ClickRecorder { tx, clock }, rx)
}

impl ClickRecorder {
    /// Records a click at the current time. Never blocks and never fails.
    pub fn record_click(&self, code: &str) {
        self.record_click_at(code, self.clock.now());
    }

    /// Records a click at `clicked_at`.
    ///
    /// A full queue or a stopped worker drops the click with a warning.
    pub fn record_click_at(&self, code: &str, clicked_at: DateTime<Utc>) {
        match self
            .tx
            .try_send(ClickEvent::new(code.to_string(), clicked_at))
        {
            Ok(()) => metrics::counter!("clicks_recorded_total").increment(1),
            Err(mpsc::error::TrySendError::Full(ev)) => {
                metrics::counter!("clicks_dropped_total", "reason" => "queue_full").increment(1);
                warn!(code = %ev.code, "Click queue full, dropping click");
            }
            Err(mpsc::error::TrySendError::Closed(ev)) => {
                metrics::counter!("clicks_dropped_total", "reason" => "closed").increment(1);
                warn!(code = %ev.code, "Click worker stopped, dropping click");
            }
        }
    }
}

/// Buckets clicks in the coordination store and flushes closed buckets.
pub struct ClickAggregator<U, A, C>
where
    U: UrlRepository,
    A: AliasRepository,
    C: ClickCountRepository,
{
    store: Arc<dyn CoordinationStore>,
    lookup: CodeLookup<U, A>,
    click_repository: Arc<C>,
    format: BucketFormat,
    origin: Arc<Semaphore>,
    clock: Arc<dyn Clock>,
    /// Start of the newest bucket a scheduled flush has handled.
    last_flushed: Mutex<Option<DateTime<Utc>>>,
}

impl<U, A, C> ClickAggregator<U, A, C>
where
    U: UrlRepository,
    A: AliasRepository,
    C: ClickCountRepository,
{
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        lookup: CodeLookup<U, A>,
        click_repository: Arc<C>,
        format: BucketFormat,
        origin: Arc<Semaphore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            lookup,
            click_repository,
            format,
            origin,
            clock,
            last_flushed: Mutex::new(None),
        }
    }

    pub fn format(&self) -> &BucketFormat {
        &self.format
    }

    /// Adds one click for `code` to the bucket containing `clicked_at`.
    ///
    /// Returns the bucket's running count for the code.
    pub async fn increment(&self, code: &str, clicked_at: DateTime<Utc>) -> Result<i64, AppError> {
        let key = self.format.key_for(clicked_at);
        self.store
            .hincr_by_with_ttl(&key, code, 1, self.format.retention_seconds())
            .await
            .map_err(|e| {
                AppError::internal(
                    "Failed to count click",
                    json!({ "bucket": key, "reason": e.to_string() }),
                )
            })
    }

    /// Moves one bucket into the datastore and deletes it.
    ///
    /// Entries that cannot be resolved or persisted are logged and skipped; they
    /// never stop the rest of the bucket. An absent bucket is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] when `bucket_key` does not match the
    /// configured format and [`AppError::Internal`] when the bucket cannot be read.
    pub async fn flush(&self, bucket_key: &str) -> Result<FlushReport, AppError> {
        let bucket_time = self
            .format
            .parse_key_at(bucket_key, self.clock.now())
            .map_err(|e| {
                AppError::bad_request("Invalid bucket key", json!({ "reason": e.to_string() }))
            })?;

        self.flush_bucket(bucket_key, bucket_time).await
    }

    async fn flush_bucket(
        &self,
        bucket_key: &str,
        bucket_time: DateTime<Utc>,
    ) -> Result<FlushReport, AppError> {
        let entries = self.store.hgetall(bucket_key).await.map_err(|e| {
            AppError::internal(
                "Failed to read click bucket",
                json!({ "bucket": bucket_key, "reason": e.to_string() }),
            )
        })?;

        let mut report = FlushReport::empty(bucket_key.to_string(), bucket_time);
        if entries.is_empty() {
            debug!(bucket = bucket_key, "Bucket absent, nothing to flush");
            return Ok(report);
        }
        report.entries = entries.len();

        for (code, raw_count) in &entries {
            match self.persist_entry(bucket_time, code, raw_count).await {
                Ok(count) => {
                    report.persisted += 1;
                    report.clicks_persisted += count;
                }
                Err(reason) => {
                    report.skipped += 1;
                    warn!(bucket = bucket_key, code = %code, "Skipping click entry: {}", reason);
                }
            }
        }

        if let Err(e) = self.store.del(bucket_key).await {
            warn!(bucket = bucket_key, "Failed to delete flushed bucket: {}", e);
        }

        metrics::counter!("flush_entries_persisted_total").increment(report.persisted as u64);
        metrics::counter!("flush_entries_skipped_total").increment(report.skipped as u64);
        info!(
            bucket = bucket_key,
            entries = report.entries,
            persisted = report.persisted,
            skipped = report.skipped,
            "Flushed click bucket"
        );

        Ok(report)
    }

    async fn persist_entry(
        &self,
        bucket_time: DateTime<Utc>,
        code: &str,
        raw_count: &str,
    ) -> Result<i64, String> {
        let count: i64 = raw_count
            .parse()
            .map_err(|_| format!("non-numeric count '{}'", raw_count))?;
        if count <= 0 {
            return Err(format!("non-positive count {}", count));
        }

        let _permit = self
            .origin
            .acquire()
            .await
            .map_err(|_| "origin pool closed".to_string())?;

        let url_id = self
            .lookup
            .find_url_id(&ShortCode::parse(code))
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "unknown short code".to_string())?;

        self.click_repository
            .add_clicks(bucket_time, url_id, count)
            .await
            .map_err(|e| e.to_string())?;

        Ok(count)
    }

    /// Key of the bucket that closed most recently, as seen at `now`.
    pub fn due_bucket_key(&self, now: DateTime<Utc>) -> String {
        self.format.key_for(self.format.previous_bucket(now))
    }

    /// Flushes every bucket that closed since the last call, oldest first.
    ///
    /// The first call only flushes the most recently closed bucket. Buckets
    /// older than the retention window have already expired and are not
    /// revisited. A failed bucket stops the run and is retried next time.
    pub async fn flush_closed(&self) -> Result<Vec<FlushReport>, AppError> {
        let mut last_flushed = self.last_flushed.lock().await;

        let now = self.clock.now();
        let due = self.format.truncate(self.format.previous_bucket(now));
        let retention = i64::try_from(self.format.retention_seconds()).unwrap_or(i64::MAX);
        let oldest_live = now
            .checked_sub_signed(chrono::Duration::seconds(retention))
            .map(|ts| self.format.truncate(ts))
            .unwrap_or(due);

        let mut next = match *last_flushed {
            Some(last) => self.format.next_bucket(last).max(oldest_live),
            None => due,
        };

        let mut reports = Vec::new();
        while next <= due {
            let key = self.format.key_for(next);
            reports.push(self.flush_bucket(&key, next).await?);
            *last_flushed = Some(next);

            let following = self.format.next_bucket(next);
            if following <= next {
                break;
            }
            next = following;
        }

        if reports.len() > 1 {
            info!(buckets = reports.len(), "Caught up on closed buckets");
        }
        Ok(reports)
    }

    /// Bucket keys currently held in the coordination store.
    ///
    /// Diagnostic only; scans the keyspace.
    pub async fn pending_buckets(&self) -> Result<Vec<String>, AppError> {
        self.store
            .scan_prefix(BUCKET_KEY_PREFIX)
            .await
            .map_err(|e| AppError::internal("Failed to list buckets", json!({ "reason": e.to_string() })))
    }
}

#[async_trait]
impl<U, A, C> ClickSink for ClickAggregator<U, A, C>
where
    U: UrlRepository,
    A: AliasRepository,
    C: ClickCountRepository,
{
    async fn record(&self, event: &ClickEvent) -> Result<(), AppError> {
        self.increment(&event.code, event.clicked_at).await.map(|_| ())
    }
}

#[async_trait]
impl<U, A, C> BucketFlusher for ClickAggregator<U, A, C>
where
    U: UrlRepository,
    A: AliasRepository,
    C: ClickCountRepository,
{
    fn tick_interval(&self) -> Duration {
        self.format.tick_interval()
    }

    async fn flush_due(&self) -> Result<Vec<FlushReport>, AppError> {
        self.flush_closed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Alias, ClickCount, UrlRecord};
    use crate::domain::repositories::{
        MockAliasRepository, MockClickCountRepository, MockUrlRepository,
    };
    use crate::infrastructure::coordination::MemoryStore;
    use crate::utils::clock::ManualClock;
    use chrono::TimeZone;

    type Aggregator =
        ClickAggregator<MockUrlRepository, MockAliasRepository, MockClickCountRepository>;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 14, 20, 0).unwrap()
    }

    fn record(id: i64) -> UrlRecord {
        UrlRecord::new(
            id,
            "https://example.com".to_string(),
            "hash".to_string(),
            start(),
            None,
            None,
        )
    }

    fn aggregator(
        aliases: MockAliasRepository,
        clicks: MockClickCountRepository,
    ) -> (Aggregator, Arc<MemoryStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let aggregator = ClickAggregator::new(
            store.clone(),
            CodeLookup::new(Arc::new(MockUrlRepository::new()), Arc::new(aliases)),
            Arc::new(clicks),
            BucketFormat::default(),
            Arc::new(Semaphore::new(2)),
            clock.clone(),
        );
        (aggregator, store, clock)
    }

    #[tokio::test]
    async fn test_increment_counts_per_bucket_and_code() {
        let (aggregator, store, _) =
            aggregator(MockAliasRepository::new(), MockClickCountRepository::new());

        aggregator.increment("_Q", start()).await.unwrap();
        aggregator.increment("_Q", start()).await.unwrap();
        aggregator.increment("promo", start()).await.unwrap();

        let bucket = store.hgetall("analytics:2024.03.05.14").await.unwrap();
        assert_eq!(bucket["_Q"], "2");
        assert_eq!(bucket["promo"], "1");
    }

    #[tokio::test]
    async fn test_bucket_expires_if_never_flushed() {
        let (aggregator, store, clock) =
            aggregator(MockAliasRepository::new(), MockClickCountRepository::new());

        aggregator.increment("_Q", start()).await.unwrap();
        clock.advance(chrono::Duration::hours(3));

        assert!(!store.exists("analytics:2024.03.05.14").await.unwrap());
    }

    #[tokio::test]
    async fn test_flush_persists_and_deletes_bucket() {
        let bucket_time = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();

        let mut aliases = MockAliasRepository::new();
        aliases
            .expect_find_by_code()
            .withf(|code| code == "promo")
            .times(1)
            .returning(|code| Ok(Some(Alias::new(code.to_string(), record(7)))));

        let mut clicks = MockClickCountRepository::new();
        clicks
            .expect_add_clicks()
            .withf(move |time, id, count| *time == bucket_time && *id == 42 && *count == 3)
            .times(1)
            .returning(|time, id, count| Ok(ClickCount::new(time, id, count)));
        clicks
            .expect_add_clicks()
            .withf(move |time, id, count| *time == bucket_time && *id == 7 && *count == 1)
            .times(1)
            .returning(|time, id, count| Ok(ClickCount::new(time, id, count)));

        let (aggregator, store, _) = aggregator(aliases, clicks);
        for _ in 0..3 {
            aggregator.increment("_Q", start()).await.unwrap();
        }
        aggregator.increment("promo", start()).await.unwrap();

        let report = aggregator.flush("analytics:2024.03.05.14").await.unwrap();

        assert_eq!(report.entries, 2);
        assert_eq!(report.persisted, 2);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.clicks_persisted, 4);
        assert_eq!(report.bucket_time, bucket_time);
        assert!(!store.exists("analytics:2024.03.05.14").await.unwrap());
    }

    #[tokio::test]
    async fn test_flush_skips_bad_entries_and_still_deletes() {
        let mut aliases = MockAliasRepository::new();
        aliases
            .expect_find_by_code()
            .withf(|code| code == "ghost")
            .times(1)
            .returning(|_| Ok(None));

        let mut clicks = MockClickCountRepository::new();
        clicks
            .expect_add_clicks()
            .withf(|_, id, _| *id == 42)
            .times(1)
            .returning(|time, id, count| Ok(ClickCount::new(time, id, count)));
        clicks
            .expect_add_clicks()
            .withf(|_, id, _| *id == 1)
            .times(1)
            .returning(|_, _, _| Err(AppError::internal("Database error", json!({}))));

        let (aggregator, store, _) = aggregator(aliases, clicks);
        let key = "analytics:2024.03.05.14";
        aggregator.increment("_Q", start()).await.unwrap();
        aggregator.increment("_b", start()).await.unwrap();
        aggregator.increment("ghost", start()).await.unwrap();
        store.hset(key, "_a-b", "2").await.unwrap();
        store.hset(key, "promo", "lots").await.unwrap();

        let report = aggregator.flush(key).await.unwrap();

        assert_eq!(report.entries, 5);
        assert_eq!(report.persisted, 1);
        assert_eq!(report.skipped, 4);
        assert!(!store.exists(key).await.unwrap());
    }

    #[tokio::test]
    async fn test_flush_absent_bucket_is_noop() {
        let (aggregator, _, _) =
            aggregator(MockAliasRepository::new(), MockClickCountRepository::new());

        let report = aggregator.flush("analytics:2024.03.05.13").await.unwrap();
        assert!(report.is_noop());
    }

    #[tokio::test]
    async fn test_flush_rejects_foreign_key_format() {
        let (aggregator, _, _) =
            aggregator(MockAliasRepository::new(), MockClickCountRepository::new());

        let err = aggregator.flush("analytics:2024.03.05").await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_flush_due_targets_previous_bucket() {
        let mut clicks = MockClickCountRepository::new();
        clicks
            .expect_add_clicks()
            .times(1)
            .returning(|time, id, count| Ok(ClickCount::new(time, id, count)));

        let (aggregator, store, clock) = aggregator(MockAliasRepository::new(), clicks);
        aggregator.increment("_Q", start()).await.unwrap();

        // Still inside the 14:00 bucket: the due bucket is 13:00, which is empty.
        assert_eq!(aggregator.due_bucket_key(clock.now()), "analytics:2024.03.05.13");
        let reports = aggregator.flush_due().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_noop());

        clock.advance(chrono::Duration::hours(1));
        let reports = aggregator.flush_due().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].bucket_key, "analytics:2024.03.05.14");
        assert_eq!(reports[0].persisted, 1);
        assert!(store.scan_prefix("analytics:").await.unwrap().is_empty());

        // Same hour again: nothing new has closed.
        clock.advance(chrono::Duration::minutes(10));
        assert!(aggregator.flush_due().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flush_due_catches_up_when_tick_straddles_boundary() {
        let bucket_14 = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
        let bucket_15 = Utc.with_ymd_and_hms(2024, 3, 5, 15, 0, 0).unwrap();

        let mut clicks = MockClickCountRepository::new();
        clicks
            .expect_add_clicks()
            .withf(move |time, id, count| *time == bucket_14 && *id == 42 && *count == 2)
            .times(1)
            .returning(|time, id, count| Ok(ClickCount::new(time, id, count)));
        clicks
            .expect_add_clicks()
            .withf(move |time, id, count| *time == bucket_15 && *id == 42 && *count == 1)
            .times(1)
            .returning(|time, id, count| Ok(ClickCount::new(time, id, count)));

        let (aggregator, store, clock) = aggregator(MockAliasRepository::new(), clicks);

        // Tick lands just before 15:00, so the 13:00 bucket is the one due.
        clock.set(Utc.with_ymd_and_hms(2024, 3, 5, 14, 59, 59).unwrap());
        aggregator.increment("_Q", start()).await.unwrap();
        aggregator.increment("_Q", clock.now()).await.unwrap();
        let reports = aggregator.flush_due().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].bucket_key, "analytics:2024.03.05.13");

        aggregator.increment("_Q", bucket_15).await.unwrap();

        // Next tick one period later lands just after 16:00.
        clock.set(bucket_15 + chrono::Duration::milliseconds(3_600_500));
        let reports = aggregator.flush_due().await.unwrap();
        let keys: Vec<&str> = reports.iter().map(|r| r.bucket_key.as_str()).collect();
        assert_eq!(keys, ["analytics:2024.03.05.14", "analytics:2024.03.05.15"]);
        assert_eq!(reports[0].clicks_persisted, 2);
        assert_eq!(reports[1].clicks_persisted, 1);
        assert!(store.scan_prefix("analytics:").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flush_due_skips_buckets_past_retention() {
        let (aggregator, _, clock) =
            aggregator(MockAliasRepository::new(), MockClickCountRepository::new());

        aggregator.flush_due().await.unwrap();

        // Down for a day: only buckets still inside retention are visited.
        clock.advance(chrono::Duration::hours(24));
        let reports = aggregator.flush_due().await.unwrap();
        let keys: Vec<&str> = reports.iter().map(|r| r.bucket_key.as_str()).collect();
        assert_eq!(
            keys,
            [
                "analytics:2024.03.06.11",
                "analytics:2024.03.06.12",
                "analytics:2024.03.06.13"
            ]
        );
    }

    #[tokio::test]
    async fn test_flush_resolves_year_less_key_after_new_year() {
        let bucket_time = Utc.with_ymd_and_hms(2024, 12, 31, 23, 0, 0).unwrap();

        let mut clicks = MockClickCountRepository::new();
        clicks
            .expect_add_clicks()
            .withf(move |time, id, _| *time == bucket_time && *id == 42)
            .times(1)
            .returning(|time, id, count| Ok(ClickCount::new(time, id, count)));

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 30, 0).unwrap(),
        ));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let aggregator: Aggregator = ClickAggregator::new(
            store.clone(),
            CodeLookup::new(
                Arc::new(MockUrlRepository::new()),
                Arc::new(MockAliasRepository::new()),
            ),
            Arc::new(clicks),
            BucketFormat::parse("month.day.hour").unwrap(),
            Arc::new(Semaphore::new(2)),
            clock.clone(),
        );

        aggregator.increment("_Q", bucket_time).await.unwrap();
        let report = aggregator.flush("analytics:12.31.23").await.unwrap();

        assert_eq!(report.bucket_time, bucket_time);
        assert_eq!(report.persisted, 1);
    }

    #[tokio::test]
    async fn test_recorder_drops_when_queue_full() {
        let clock = Arc::new(ManualClock::new(start()));
        let (recorder, mut rx) = click_channel(1, clock);

        recorder.record_click("_a");
        recorder.record_click("_b");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.code, "_a");
        assert_eq!(first.clicked_at, start());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_recorder_survives_closed_worker() {
        let clock = Arc::new(ManualClock::new(start()));
        let (recorder, rx) = click_channel(4, clock);
        drop(rx);

        recorder.record_click("_a");
    }
}
