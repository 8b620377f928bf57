//! Big-endian byte decoding and text-safety helpers.

use std::convert::TryFrom;
use std::error;
use std::fmt;
use std::fmt::Write;
use std::str;

/// Replacement written over control characters by [`replace_control_characters`].
const REPLACEMENT_BYTE: u8 = b'*';

/// A fixed-width decode was handed the wrong number of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeError {
    pub expected: usize,
    pub actual: usize,
}

impl error::Error for DecodeError {}
impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "expected {} byte(s) to decode, got {}",
            self.expected, self.actual
        )
    }
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N], DecodeError> {
    <[u8; N]>::try_from(bytes).map_err(|_| DecodeError {
        expected: N,
        actual: bytes.len(),
    })
}

/// Unpack 8 bytes to an unsigned 64-bit integer.
pub fn bytes_to_ulonglong(bytes: &[u8]) -> Result<u64, DecodeError> {
    Ok(u64::from_be_bytes(fixed(bytes)?))
}

/// Unpack 4 bytes to an unsigned 32-bit integer.
pub fn bytes_to_uint(bytes: &[u8]) -> Result<u32, DecodeError> {
    Ok(u32::from_be_bytes(fixed(bytes)?))
}

/// Unpack 2 bytes to an unsigned 16-bit integer.
pub fn bytes_to_ushort_int(bytes: &[u8]) -> Result<u16, DecodeError> {
    Ok(u16::from_be_bytes(fixed(bytes)?))
}

pub fn bytes_to_unsigned_char(bytes: &[u8]) -> Result<u8, DecodeError> {
    let [value] = fixed::<1>(bytes)?;
    Ok(value)
}

pub fn bytes_to_signed_char(bytes: &[u8]) -> Result<i8, DecodeError> {
    Ok(i8::from_be_bytes(fixed(bytes)?))
}

/// Unpack a big-endian byte string of any width up to 8 bytes.
///
/// An empty input decodes to zero.
pub fn bytes_to_integer(bytes: &[u8]) -> Result<u64, DecodeError> {
    if bytes.len() > 8 {
        return Err(DecodeError {
            expected: 8,
            actual: bytes.len(),
        });
    }
    Ok(bytes
        .iter()
        .fold(0_u64, |value, byte| (value << 8) | u64::from(*byte)))
}

/// Device control characters (below 32, and DEL).
pub fn is_control(byte: u8) -> bool {
    byte < 32 || byte == 127
}

pub fn contains_control_characters(bytes: &[u8]) -> bool {
    bytes.iter().any(|byte| is_control(*byte))
}

pub fn replace_control_characters(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .map(|byte| {
            if is_control(*byte) {
                REPLACEMENT_BYTE
            } else {
                *byte
            }
        })
        .collect()
}

/// Lowercase hexadecimal representation of `bytes`.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        // Writing to a String cannot fail.
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

/// Decode `bytes` as 7-bit ASCII text.
///
/// Returns an empty string when the bytes contain a control character or
/// anything outside ASCII, so the result is always safe to embed in
/// metadata. An empty result therefore does not imply empty input.
pub fn bytes_to_text(bytes: &[u8]) -> String {
    if contains_control_characters(bytes) || !bytes.is_ascii() {
        return String::new();
    }
    match str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => String::new(),
    }
}
