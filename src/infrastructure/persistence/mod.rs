//! PostgreSQL repository implementations.
//!
//! Concrete implementations of domain repository traits using SQLx runtime
//! queries; migrations in `migrations/` define the schema. The SQL is not
//! checked at compile time, so `tests/repository_*.rs` cover every query.
//!
//! # Repositories
//!
//! - [`PgUrlRepository`] - URL records (`short_url`)
//! - [`PgAliasRepository`] - Custom aliases (`custom_url_code`)
//! - [`PgClickCountRepository`] - Bucketed click totals (`short_url_click_analytics`)

pub mod pg_alias_repository;
pub mod pg_click_count_repository;
pub mod pg_url_repository;

pub use pg_alias_repository::PgAliasRepository;
pub use pg_click_count_repository::PgClickCountRepository;
pub use pg_url_repository::PgUrlRepository;
