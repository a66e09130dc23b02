//! The two short code spaces.
//!
//! A code starting with [`SENTINEL`] carries a base-62 encoded surrogate id;
//! every other non-empty code is a custom alias looked up as-is.

use crate::utils::code_codec;

/// Reserved first character marking an encoded id.
pub const SENTINEL: char = '_';

/// A short code classified into its code space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortCode {
    /// Sentinel-prefixed code; holds the decoded record id.
    Encoded(i64),
    /// Custom alias.
    Alias(String),
    /// Empty input, or a sentinel code whose payload is not the canonical
    /// encoding of an id.
    Malformed,
}

impl ShortCode {
    /// Classifies `code` without touching any store.
    pub fn parse(code: &str) -> Self {
        if code.is_empty() {
            return Self::Malformed;
        }

        match code.strip_prefix(SENTINEL) {
            Some(encoded) => code_codec::decode(encoded)
                .ok()
                .and_then(|id| i64::try_from(id).ok())
                .map_or(Self::Malformed, Self::Encoded),
            None => Self::Alias(code.to_string()),
        }
    }

    /// Builds the public code for a record id.
    pub fn for_id(id: i64) -> String {
        format!("{}{}", SENTINEL, code_codec::encode(id.unsigned_abs()))
    }
}
