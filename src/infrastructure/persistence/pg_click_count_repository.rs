//! PostgreSQL implementation of the click count repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

use crate::domain::entities::ClickCount;
use crate::domain::repositories::ClickCountRepository;
use crate::error::AppError;

#[derive(Debug, FromRow)]
struct ClickCountRow {
    time: DateTime<Utc>,
    url_id: i64,
    count: i64,
}

impl From<ClickCountRow> for ClickCount {
    fn from(r: ClickCountRow) -> Self {
        ClickCount::new(r.time, r.url_id, r.count)
    }
}

/// PostgreSQL repository for `short_url_click_analytics` rows.
///
/// The upsert is a single `INSERT .. ON CONFLICT`, so concurrent flushes of
/// the same bucket add up instead of overwriting each other.
pub struct PgClickCountRepository {
    pool: Arc<PgPool>,
}

impl PgClickCountRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClickCountRepository for PgClickCountRepository {
    async fn add_clicks(
        &self,
        time: DateTime<Utc>,
        url_id: i64,
        count: i64,
    ) -> Result<ClickCount, AppError> {
        let row = sqlx::query_as::<_, ClickCountRow>(
            r#"
            INSERT INTO short_url_click_analytics (time, url_id, count)
            VALUES ($1, $2, $3)
            ON CONFLICT (time, url_id)
            DO UPDATE SET count = short_url_click_analytics.count + EXCLUDED.count
            RETURNING time, url_id, count
            "#,
        )
        .bind(time)
        .bind(url_id)
        .bind(count)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(row.into())
    }

    async fn find(
        &self,
        time: DateTime<Utc>,
        url_id: i64,
    ) -> Result<Option<ClickCount>, AppError> {
        let row = sqlx::query_as::<_, ClickCountRow>(
            "SELECT time, url_id, count FROM short_url_click_analytics WHERE time = $1 AND url_id = $2",
        )
        .bind(time)
        .bind(url_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(ClickCount::from))
    }

    async fn find_by_url_and_range(
        &self,
        url_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ClickCount>, AppError> {
        let rows = sqlx::query_as::<_, ClickCountRow>(
            r#"
            SELECT time, url_id, count
            FROM short_url_click_analytics
            WHERE url_id = $1 AND time >= $2 AND time <= $3
            ORDER BY time ASC
            "#,
        )
        .bind(url_id)
        .bind(from)
        .bind(to)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(ClickCount::from).collect())
    }
}
