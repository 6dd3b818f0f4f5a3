//! Primitive field encodings shared by the encoder and decoder.
//!
//! Integers are 8-byte little-endian. A Number is its byte length followed
//! by the big-endian magnitude; the length is negated for negative numbers.

use num_bigint::{BigInt, Sign};

/// Append an 8-byte little-endian integer
pub fn put_i64(out: &mut Vec<u8>, value: i64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Append a length or count field
pub fn put_len(out: &mut Vec<u8>, len: usize) {
    put_i64(out, len as i64);
}

/// Append a String payload (length, then raw bytes)
pub fn put_string(out: &mut Vec<u8>, bytes: &[u8]) {
    put_len(out, bytes.len());
    out.extend_from_slice(bytes);
}

/// Append a Number payload
pub fn put_number(out: &mut Vec<u8>, value: &BigInt) {
    let (sign, magnitude) = value.to_bytes_be();
    if sign == Sign::NoSign {
        put_i64(out, 0);
        return;
    }
    let len = magnitude.len() as i64;
    put_i64(out, if sign == Sign::Minus { -len } else { len });
    out.extend_from_slice(&magnitude);
}

/// Rebuild a Number from its signed length field and magnitude bytes
pub fn number_from_parts(signed_len: i64, magnitude: &[u8]) -> BigInt {
    let sign = if signed_len < 0 { Sign::Minus } else { Sign::Plus };
    BigInt::from_bytes_be(sign, magnitude)
}
