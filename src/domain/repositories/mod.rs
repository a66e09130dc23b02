//! Repository trait definitions for the domain layer.
//!
//! These traits abstract the Datastore collaborator. Implementations live in
//! `crate::infrastructure::persistence`; mocks are generated via `mockall`.
//!
//! # Available Repositories
//!
//! - [`UrlRepository`] - URL record lookups and creation
//! - [`AliasRepository`] - Custom alias lookups
//! - [`ClickCountRepository`] - Bucketed click totals
//!
//! # Testing
//!
//! See integration tests in `tests/repository_*.rs` for usage examples.

pub mod alias_repository;
pub mod click_count_repository;
pub mod url_repository;

pub use alias_repository::AliasRepository;
pub use click_count_repository::ClickCountRepository;
pub use url_repository::UrlRepository;

#[cfg(test)]
pub use alias_repository::MockAliasRepository;
#[cfg(test)]
pub use click_count_repository::MockClickCountRepository;
#[cfg(test)]
pub use url_repository::MockUrlRepository;
