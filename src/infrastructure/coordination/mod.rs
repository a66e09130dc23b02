//! Coordination store backends.
//!
//! Provides the [`CoordinationStore`] trait with two implementations:
//! - [`RedisStore`] - Shared Redis backend
//! - [`MemoryStore`] - In-process backend for single-node runs and tests

mod memory_store;
mod redis_store;
mod store;

pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;
pub use store::{CoordinationStore, StoreError, StoreResult};
