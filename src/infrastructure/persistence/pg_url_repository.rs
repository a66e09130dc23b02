//! PostgreSQL implementation of the URL record repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

use crate::domain::entities::{NewUrlRecord, UrlRecord};
use crate::domain::repositories::UrlRepository;
use crate::error::AppError;

const URL_CONSTRAINT: &str = "short_url_hash_url_key";
const ALIAS_CONSTRAINT: &str = "custom_url_code_pkey";

#[derive(Debug, FromRow)]
pub(crate) struct UrlRow {
    pub id: i64,
    pub long_url: String,
    pub long_url_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub owner_id: Option<i64>,
}

impl From<UrlRow> for UrlRecord {
    fn from(r: UrlRow) -> Self {
        UrlRecord::new(
            r.id,
            r.long_url,
            r.long_url_hash,
            r.created_at,
            r.expires_at,
            r.owner_id,
        )
    }
}

/// PostgreSQL repository for `short_url` rows.
pub struct PgUrlRepository {
    pool: Arc<PgPool>,
}

impl PgUrlRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

/// Turns a unique violation into the conflict callers expect to report.
fn map_create_error(e: sqlx::Error, alias: Option<&str>) -> AppError {
    let constraint = e
        .as_database_error()
        .filter(|db| db.is_unique_violation())
        .and_then(|db| db.constraint().map(str::to_string));

    match constraint.as_deref() {
        Some(URL_CONSTRAINT) => AppError::conflict("A short URL exists for the long URL", json!({})),
        Some(ALIAS_CONSTRAINT) => AppError::conflict(
            "Custom short URL already exists",
            json!({ "code": alias }),
        ),
        _ => e.into(),
    }
}

#[async_trait]
impl UrlRepository for PgUrlRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<UrlRecord>, AppError> {
        let row = sqlx::query_as::<_, UrlRow>(
            r#"
            SELECT id, long_url, long_url_hash, created_at, expires_at, owner_id
            FROM short_url
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(UrlRecord::from))
    }

    async fn find_by_hash_and_url(
        &self,
        hash: &str,
        long_url: &str,
    ) -> Result<Option<UrlRecord>, AppError> {
        let row = sqlx::query_as::<_, UrlRow>(
            r#"
            SELECT id, long_url, long_url_hash, created_at, expires_at, owner_id
            FROM short_url
            WHERE long_url_hash = $1 AND long_url = $2
            "#,
        )
        .bind(hash)
        .bind(long_url)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(UrlRecord::from))
    }

    async fn create(&self, new_record: NewUrlRecord) -> Result<UrlRecord, AppError> {
        let alias = new_record.alias.as_deref();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UrlRow>(
            r#"
            INSERT INTO short_url (long_url, long_url_hash, expires_at, owner_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, long_url, long_url_hash, created_at, expires_at, owner_id
            "#,
        )
        .bind(&new_record.long_url)
        .bind(&new_record.long_url_hash)
        .bind(new_record.expires_at)
        .bind(new_record.owner_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_create_error(e, alias))?;

        if let Some(code) = alias {
            sqlx::query("INSERT INTO custom_url_code (code, url_id) VALUES ($1, $2)")
                .bind(code)
                .bind(row.id)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_create_error(e, alias))?;
        }

        tx.commit().await?;

        Ok(row.into())
    }
}
