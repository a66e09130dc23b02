//! PostgreSQL implementation of the alias repository.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

use super::pg_url_repository::UrlRow;
use crate::domain::entities::Alias;
use crate::domain::repositories::AliasRepository;
use crate::error::AppError;

#[derive(Debug, FromRow)]
struct AliasRow {
    code: String,
    #[sqlx(flatten)]
    url: UrlRow,
}

/// PostgreSQL repository for `custom_url_code` rows.
pub struct PgAliasRepository {
    pool: Arc<PgPool>,
}

impl PgAliasRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AliasRepository for PgAliasRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<Alias>, AppError> {
        let row = sqlx::query_as::<_, AliasRow>(
            r#"
            SELECT c.code, u.id, u.long_url, u.long_url_hash, u.created_at, u.expires_at, u.owner_id
            FROM custom_url_code c
            JOIN short_url u ON u.id = c.url_id
            WHERE c.code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(|r| Alias::new(r.code, r.url.into())))
    }

    async fn exists(&self, code: &str) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM custom_url_code WHERE code = $1)")
                .bind(code)
                .fetch_one(self.pool.as_ref())
                .await?;

        Ok(exists)
    }
}
