//! Core domain entities.
//!
//! - [`UrlRecord`] - A stored long URL with optional expiry and owner
//! - [`NewUrlRecord`] - Insert payload, optionally carrying a custom alias
//! - [`Alias`] - A custom code bound to a record
//! - [`ClickCount`] - Persisted click total for a time bucket
//! - [`FlushReport`] - Outcome of flushing one click bucket

pub mod alias;
pub mod click_count;
pub mod flush_report;
pub mod url_record;

pub use alias::Alias;
pub use click_count::ClickCount;
pub use flush_report::FlushReport;
pub use url_record::{NewUrlRecord, UrlRecord};
