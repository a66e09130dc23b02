//! Base-62 codec mapping surrogate ids to compact strings.
//!
//! The alphabet is fixed: lowercase letters first, then uppercase, then digits,
//! so `0 -> "a"`, `26 -> "A"` and `52 -> "0"`. The codec is stateless and
//! bijective between `u64` and canonical strings: no leading `a` except in `"a"`
//! itself.

/// Codec alphabet; a character's position is its digit value.
pub const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const BASE: u64 = 62;

/// Errors produced when decoding a base-62 string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Encoded string cannot be empty")]
    Empty,

    #[error("Invalid character in base-62 string: {0:?}")]
    InvalidCharacter(char),

    #[error("Encoded value does not fit in 64 bits")]
    Overflow,

    #[error("Encoded string has a leading zero digit")]
    LeadingZero,
}

/// Encodes a number as a base-62 string.
///
/// # Examples
///
/// ```
/// use shortlink_coordinator::utils::code_codec::encode;
///
/// assert_eq!(encode(0), "a");
/// assert_eq!(encode(42), "Q");
/// ```
pub fn encode(mut number: u64) -> String {
    if number == 0 {
        return (ALPHABET[0] as char).to_string();
    }

    let mut digits = Vec::with_capacity(11);
    while number > 0 {
        digits.push(ALPHABET[(number % BASE) as usize]);
        number /= BASE;
    }
    digits.reverse();

    // Every byte comes from ALPHABET, which is ASCII.
    digits.into_iter().map(char::from).collect()
}

/// Decodes a base-62 string produced by [`encode`].
///
/// # Errors
///
/// - [`CodecError::Empty`] for an empty input
/// - [`CodecError::InvalidCharacter`] for any character outside [`ALPHABET`]
/// - [`CodecError::Overflow`] if the value exceeds `u64::MAX`
/// - [`CodecError::LeadingZero`] for a padded string such as `"aQ"`, which
///   [`encode`] never produces
pub fn decode(encoded: &str) -> Result<u64, CodecError> {
    if encoded.is_empty() {
        return Err(CodecError::Empty);
    }

    let value = encoded.chars().try_fold(0u64, |acc, c| {
        let digit = digit_of(c).ok_or(CodecError::InvalidCharacter(c))?;
        acc.checked_mul(BASE)
            .and_then(|v| v.checked_add(digit))
            .ok_or(CodecError::Overflow)
    })?;

    if encoded.len() > 1 && encoded.as_bytes()[0] == ALPHABET[0] {
        return Err(CodecError::LeadingZero);
    }

    Ok(value)
}

fn digit_of(c: char) -> Option<u64> {
    match c {
        'a'..='z' => Some(c as u64 - 'a' as u64),
        'A'..='Z' => Some(c as u64 - 'A' as u64 + 26),
        '0'..='9' => Some(c as u64 - '0' as u64 + 52),
        _ => None,
    }
}
