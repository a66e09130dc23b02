//! Validation for user-chosen aliases.

use crate::domain::short_code::SENTINEL;
use crate::error::AppError;
use serde_json::json;

/// Longest alias accepted; matches the `custom_url_code.code` column.
pub const MAX_ALIAS_LENGTH: usize = 100;

/// Validates a custom alias before it is offered to the datastore.
///
/// # Rules
///
/// - 1 to [`MAX_ALIAS_LENGTH`] characters
/// - ASCII letters, digits, `-` and `_` only
/// - Must not start with the sentinel prefix (that space belongs to encoded ids)
///
/// # Errors
///
/// Returns [`AppError::Validation`] describing the first rule broken.
pub fn validate_custom_code(code: &str) -> Result<(), AppError> {
    if code.is_empty() || code.len() > MAX_ALIAS_LENGTH {
        return Err(AppError::bad_request(
            format!("Custom code must be 1-{} characters", MAX_ALIAS_LENGTH),
            json!({ "length": code.len() }),
        ));
    }

    if code.starts_with(SENTINEL) {
        return Err(AppError::bad_request(
            format!("Custom code cannot start with '{}'", SENTINEL),
            json!({ "code": code }),
        ));
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::bad_request(
            "Custom code can only contain letters, digits, hyphens and underscores",
            json!({ "code": code }),
        ));
    }

    Ok(())
}
