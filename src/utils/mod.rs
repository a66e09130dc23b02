//! Leaf utilities shared by the coordination services.
//!
//! - [`code_codec`] - Bijective base-62 integer <-> string codec
//! - [`clock`] - Injectable wall clock (system and manual)
//! - [`long_url`] - Long URL validation, normalization and content hashing
//! - [`custom_code`] - Custom alias validation

pub mod clock;
pub mod code_codec;
pub mod custom_code;
pub mod long_url;
