//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer, providing
//! concrete implementations for data persistence and shared coordination.
//!
//! # Modules
//!
//! - [`coordination`] - Coordination store abstractions (Redis and in-memory implementations)
//! - [`persistence`] - PostgreSQL repository implementations

pub mod coordination;
pub mod persistence;
