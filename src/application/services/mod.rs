//! Business logic services for the application layer.

pub mod analytics_service;
pub mod bucket_format;
pub mod click_aggregator;
pub mod code_lookup;
pub mod link_service;
pub mod rate_limiter;
pub mod resolver_service;

pub use analytics_service::{AnalyticsService, ClickHistory, ClickPoint};
pub use bucket_format::{BucketFormat, BucketFormatError, TimeUnit};
pub use click_aggregator::{ClickAggregator, ClickRecorder, click_channel};
pub use code_lookup::CodeLookup;
pub use link_service::{CreateLinkRequest, CreatedLink, LinkService};
pub use rate_limiter::{AdmissionControl, PolicyLimiter, RateLimitPolicy, RateLimiter};
pub use resolver_service::{LockedCacheResolver, ResolverSettings};
