//! Background task applying queued clicks to the coordination store.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_retry::{
    Retry,
    strategy::{ExponentialBackoff, jitter},
};
use tracing::{debug, info, warn};

use crate::domain::click_event::ClickEvent;
use crate::error::AppError;

const RECORD_ATTEMPTS: usize = 3;

/// Destination of queued clicks.
#[async_trait]
pub trait ClickSink: Send + Sync {
    async fn record(&self, event: &ClickEvent) -> Result<(), AppError>;
}

/// Drains `rx` until every sender is dropped.
///
/// Each click is retried a few times with backoff; a click that still fails
/// is logged and counted as dropped. Errors never reach the request path that
/// queued the click.
pub async fn run_click_worker(mut rx: mpsc::Receiver<ClickEvent>, sink: Arc<dyn ClickSink>) {
    info!("Click worker started");

    while let Some(event) = rx.recv().await {
        let strategy = ExponentialBackoff::from_millis(10)
            .map(jitter)
            .take(RECORD_ATTEMPTS - 1);

        match Retry::spawn(strategy, || sink.record(&event)).await {
            Ok(()) => debug!(code = %event.code, "Click recorded"),
            Err(e) => {
                metrics::counter!("clicks_dropped_total", "reason" => "store").increment(1);
                warn!(code = %event.code, "Dropping click after retries: {}", e);
            }
        }
    }

    info!("Click worker stopped");
}
