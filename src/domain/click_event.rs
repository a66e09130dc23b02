//! Click event model for asynchronous click recording.

use chrono::{DateTime, Utc};

/// A click queued between the redirect path and the aggregation worker.
///
/// The caller only pays for a channel send; the bucket increment happens in
/// [`crate::domain::click_worker::run_click_worker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEvent {
    pub code: String,
    pub clicked_at: DateTime<Utc>,
}

impl ClickEvent {
    /// Creates a new click event.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::Utc;
    /// use shortlink_coordinator::domain::click_event::ClickEvent;
    ///
    /// let event = ClickEvent::new("_Q".to_string(), Utc::now());
    /// assert_eq!(event.code, "_Q");
    /// ```
    pub fn new(code: String, clicked_at: DateTime<Utc>) -> Self {
        Self { code, clicked_at }
    }
}
