//! Long URL validation, normalization and content hashing.
//!
//! Records are deduplicated on `(long_url_hash, long_url)`, so the value that is
//! hashed must be the normalized form: lowercase host, no default port, no fragment.

use sha2::{Digest, Sha256};
use url::Url;

/// Errors that can occur while accepting a long URL.
#[derive(Debug, thiserror::Error)]
pub enum LongUrlError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(String),

    #[error("Only HTTP and HTTPS protocols are allowed")]
    UnsupportedProtocol,

    #[error("Failed to normalize URL: {0}")]
    NormalizationFailed(String),
}

/// A validated, normalized long URL and its SHA-256 content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongUrl {
    value: String,
    hash: String,
}

impl LongUrl {
    /// Parses and normalizes `input`.
    ///
    /// # Errors
    ///
    /// Returns [`LongUrlError::InvalidFormat`] for blank or malformed input and
    /// [`LongUrlError::UnsupportedProtocol`] for anything but `http`/`https`.
    pub fn parse(input: &str) -> Result<Self, LongUrlError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(LongUrlError::InvalidFormat("URL is empty".to_string()));
        }

        let mut url =
            Url::parse(trimmed).map_err(|e| LongUrlError::InvalidFormat(e.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(LongUrlError::UnsupportedProtocol);
        }

        if let Some(host) = url.host_str().map(str::to_ascii_lowercase) {
            url.set_host(Some(&host))
                .map_err(|e| LongUrlError::NormalizationFailed(e.to_string()))?;
        }

        url.set_fragment(None);

        if matches!(
            (url.scheme(), url.port()),
            ("http", Some(80)) | ("https", Some(443))
        ) {
            url.set_port(None).map_err(|_| {
                LongUrlError::NormalizationFailed("Failed to remove default port".to_string())
            })?;
        }

        let value = url.to_string();
        let hash = content_hash(&value);

        Ok(Self { value, hash })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Lowercase hex SHA-256 of the normalized URL (64 characters).
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn into_parts(self) -> (String, String) {
        (self.value, self.hash)
    }
}

/// SHA-256 of `value`, hex encoded.
pub fn content_hash(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}
