mod common;

use shortlink_coordinator::domain::repositories::AliasRepository;
use shortlink_coordinator::infrastructure::persistence::PgAliasRepository;
use sqlx::PgPool;
use std::sync::Arc;

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_find_by_code(pool: PgPool) {
    let url_id = common::insert_url(&pool, "https://example.com/sale").await;
    common::insert_alias(&pool, "promo", url_id).await;
    let repo = PgAliasRepository::new(Arc::new(pool));

    let alias = repo.find_by_code("promo").await.unwrap().unwrap();

    assert_eq!(alias.code, "promo");
    assert_eq!(alias.url.id, url_id);
    assert_eq!(alias.url.long_url, "https://example.com/sale");
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_find_by_code_not_found(pool: PgPool) {
    let repo = PgAliasRepository::new(Arc::new(pool));

    assert!(repo.find_by_code("nope").await.unwrap().is_none());
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_exists(pool: PgPool) {
    let url_id = common::insert_url(&pool, "https://example.com").await;
    common::insert_alias(&pool, "taken", url_id).await;
    let repo = PgAliasRepository::new(Arc::new(pool));

    assert!(repo.exists("taken").await.unwrap());
    assert!(!repo.exists("free").await.unwrap());
}
