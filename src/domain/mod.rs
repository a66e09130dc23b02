//! Domain layer containing business entities and logic.
//!
//! Defines entities, repository interfaces, and the background loops of the
//! click path, independent of infrastructure concerns.
//!
//! # Architecture
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//! - [`short_code`] - The encoded-id and alias code spaces
//! - [`click_event`] - Click tracking event model
//! - [`click_worker`] - Asynchronous click recording worker
//! - [`flush_scheduler`] - Periodic bucket flushing loop
//!
//! # Click Processing Flow
//!
//! 1. A redirect calls [`crate::application::services::ClickRecorder::record_click`]
//! 2. [`click_event::ClickEvent`] is sent to a bounded channel
//! 3. [`click_worker::run_click_worker`] increments the time bucket in the coordination store
//! 4. [`flush_scheduler::run_flush_scheduler`] moves closed buckets into
//!    [`repositories::ClickCountRepository`]

pub mod click_event;
pub mod click_worker;
pub mod entities;
pub mod flush_scheduler;
pub mod repositories;
pub mod short_code;
