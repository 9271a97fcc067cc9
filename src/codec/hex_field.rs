//! Fixed-width hex fields and untyped input validation

use crate::error::{SubmitterError, SubmitterResult};

/// Render `value` as lowercase hex left-padded with `0` to exactly `width` digits.
///
/// Widths count hex characters, not bytes. A value needing more than `width`
/// digits is an error; it is never truncated.
pub fn encode_hex(field: &'static str, value: u64, width: usize) -> SubmitterResult<String> {
    let encoded = format!("{:0width$x}", value, width = width);
    if encoded.len() > width {
        return Err(SubmitterError::WidthOverflow {
            field,
            value,
            width,
        });
    }
    Ok(encoded)
}

/// Inverse of [`encode_hex`] for a single field
pub fn decode_hex(field: &'static str, digits: &str) -> SubmitterResult<u64> {
    u64::from_str_radix(digits, 16).map_err(|e| SubmitterError::InvalidHex {
        field,
        index: 0,
        reason: e.to_string(),
    })
}

/// Parse a non-negative decimal integer supplied as text
pub fn parse_number(field: &'static str, value: &str) -> SubmitterResult<u64> {
    let invalid = || SubmitterError::InvalidNumber {
        field,
        value: value.to_string(),
    };

    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    value.parse::<u64>().map_err(|_| invalid())
}

pub fn strip_0x(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Decode one hex string from a list field into bytes.
///
/// The `0x` prefix is optional; an odd digit count is reported separately from
/// non-hex characters.
pub fn decode_hex_bytes(field: &'static str, index: usize, value: &str) -> SubmitterResult<Vec<u8>> {
    let digits = strip_0x(value);
    if digits.len() % 2 != 0 {
        return Err(SubmitterError::OddLengthHex { field, index });
    }
    hex::decode(digits).map_err(|e| SubmitterError::InvalidHex {
        field,
        index,
        reason: e.to_string(),
    })
}
