//! Custom alias entity.

use super::UrlRecord;

/// A user-chosen code pointing at exactly one [`UrlRecord`].
///
/// Uniqueness of `code` is enforced by the datastore; a losing concurrent
/// writer sees a conflict error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub code: String,
    pub url: UrlRecord,
}

impl Alias {
    pub fn new(code: String, url: UrlRecord) -> Self {
        Self { code, url }
    }
}
