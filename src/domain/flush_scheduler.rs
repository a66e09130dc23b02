//! Periodic flushing of closed click buckets.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::domain::entities::FlushReport;
use crate::error::AppError;

/// Something that knows which buckets are due and how to flush them.
#[async_trait]
pub trait BucketFlusher: Send + Sync {
    /// How often [`Self::flush_due`] should run.
    fn tick_interval(&self) -> Duration;

    /// Flushes every bucket that closed since the previous call.
    async fn flush_due(&self) -> Result<Vec<FlushReport>, AppError>;
}

/// Runs [`BucketFlusher::flush_due`] on its tick interval until `shutdown`
/// flips or its sender is dropped.
///
/// The first tick fires immediately, so a restart picks up the bucket that
/// closed while the process was down. Ticks are not aligned to bucket
/// boundaries; the flusher catches up on anything a tick skipped.
pub async fn run_flush_scheduler(flusher: Arc<dyn BucketFlusher>, mut shutdown: watch::Receiver<bool>) {
    let period = flusher.tick_interval();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(period_secs = period.as_secs(), "Flush scheduler started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match flusher.flush_due().await {
                    Ok(reports) => log_reports(&reports),
                    Err(e) => error!("Scheduled flush failed: {}", e),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Flush scheduler stopped");
}

fn log_reports(reports: &[FlushReport]) {
    for report in reports {
        if report.is_noop() {
            debug!(bucket = %report.bucket_key, "Nothing to flush");
        } else {
            info!(
                bucket = %report.bucket_key,
                persisted = report.persisted,
                skipped = report.skipped,
                "Bucket flushed"
            );
        }
    }
}
