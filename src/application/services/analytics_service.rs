//! Read side of persisted click counts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use super::code_lookup::CodeLookup;
use crate::domain::repositories::{AliasRepository, ClickCountRepository, UrlRepository};
use crate::domain::short_code::ShortCode;
use crate::error::AppError;

/// One persisted bucket of a link's click history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClickPoint {
    pub time: DateTime<Utc>,
    pub count: i64,
}

/// A link's click history over a time range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClickHistory {
    pub code: String,
    pub url_id: i64,
    pub total: i64,
    pub points: Vec<ClickPoint>,
}

/// Service for querying flushed click counts.
///
/// Only sees clicks whose bucket has been flushed; counts still sitting in
/// the coordination store are not included.
pub struct AnalyticsService<U, A, C>
where
    U: UrlRepository,
    A: AliasRepository,
    C: ClickCountRepository,
{
    lookup: CodeLookup<U, A>,
    click_repository: Arc<C>,
}

impl<U, A, C> AnalyticsService<U, A, C>
where
    U: UrlRepository,
    A: AliasRepository,
    C: ClickCountRepository,
{
    pub fn new(lookup: CodeLookup<U, A>, click_repository: Arc<C>) -> Self {
        Self {
            lookup,
            click_repository,
        }
    }

    /// Returns the persisted buckets of `code` within `[from, to]`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if `from` is after `to` and
    /// [`AppError::NotFound`] if the code does not resolve to a record.
    pub async fn click_history(
        &self,
        code: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ClickHistory, AppError> {
        if from > to {
            return Err(AppError::bad_request(
                "Range start must not be after its end",
                json!({ "from": from, "to": to }),
            ));
        }

        let record = self
            .lookup
            .find_record(&ShortCode::parse(code))
            .await?
            .ok_or_else(|| AppError::not_found("Short link not found", json!({ "code": code })))?;

        let points: Vec<ClickPoint> = self
            .click_repository
            .find_by_url_and_range(record.id, from, to)
            .await?
            .into_iter()
            .map(|c| ClickPoint {
                time: c.time,
                count: c.count,
            })
            .collect();

        Ok(ClickHistory {
            code: code.to_string(),
            url_id: record.id,
            total: points.iter().map(|p| p.count).sum(),
            points,
        })
    }
}
