// src/codec.rs
//! Text encodings of a tag identifier.
//!
//! The decimal forms accumulate into a `u64` with wrapping arithmetic. For
//! identifiers longer than 8 bytes the weight of byte 8 and beyond wraps to
//! zero, so only the low 64 bits survive. Physical tags use 4 to 10 byte
//! identifiers; 10 byte ones hit this boundary and it is kept as is.

/// Lowercase hex, last byte first, single spaces between bytes.
pub fn to_hex(bytes: &[u8]) -> String {
    join_hex(bytes.iter().rev())
}

/// Lowercase hex in input order, single spaces between bytes.
pub fn to_reversed_hex(bytes: &[u8]) -> String {
    join_hex(bytes.iter())
}

/// Little-endian value: `sum(bytes[i] * 256^i)`.
pub fn to_decimal(bytes: &[u8]) -> u64 {
    accumulate(bytes.iter())
}

/// Big-endian value: the last byte is the least significant.
pub fn to_reversed_decimal(bytes: &[u8]) -> u64 {
    accumulate(bytes.iter().rev())
}

/// Inverse of [`to_hex`]. Returns `None` on anything `to_hex` cannot produce.
pub fn from_hex(text: &str) -> Option<Vec<u8>> {
    if text.is_empty() {
        return Some(Vec::new());
    }
    let mut bytes = Vec::new();
    for token in text.split(' ') {
        if token.len() != 2 || token.bytes().any(|c| c.is_ascii_uppercase()) {
            return None;
        }
        bytes.extend(hex::decode(token).ok()?);
    }
    bytes.reverse();
    Some(bytes)
}

/// Drops the separators, as used when exporting IDs.
pub fn compact(rendered: &str) -> String {
    rendered.replace(' ', "")
}

fn join_hex<'a>(bytes: impl Iterator<Item = &'a u8>) -> String {
    bytes
        .map(|b| hex::encode([*b]))
        .collect::<Vec<_>>()
        .join(" ")
}

fn accumulate<'a>(bytes: impl Iterator<Item = &'a u8>) -> u64 {
    let mut result: u64 = 0;
    let mut factor: u64 = 1;
    for &b in bytes {
        result = result.wrapping_add((b as u64).wrapping_mul(factor));
        factor = factor.wrapping_mul(256);
    }
    result
}
