//! Application layer services implementing business logic.
//!
//! Services orchestrate the coordination store and the repository traits.
//! They are generic over repositories so tests can plug in `mockall` mocks.
//!
//! # Available Services
//!
//! - [`services::resolver_service::LockedCacheResolver`] - Single-flight redirect resolution
//! - [`services::rate_limiter::AdmissionControl`] - Redirect and creation rate limits
//! - [`services::click_aggregator::ClickAggregator`] - Write-behind click buckets and flushing
//! - [`services::link_service::LinkService`] - Short link creation
//! - [`services::analytics_service::AnalyticsService`] - Persisted click history

pub mod services;
