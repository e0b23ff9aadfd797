//! Base-128 varints and zig-zag mapping.

use super::Cursor;
use crate::error::{Error, Result};
use bytes::BufMut;

/// A 64-bit varint never needs more than 10 bytes
pub const MAX_VARINT_LEN: usize = 10;

/// Reads an unsigned varint.
///
/// Returns the decoded value and the number of bytes consumed. The tenth byte
/// may only carry bit 63; anything wider is [`Error::Overflow`].
pub fn read_varint(cursor: &mut Cursor) -> Result<(u64, usize)> {
    let start = cursor.position();
    let mut value: u64 = 0;

    for i in 0..MAX_VARINT_LEN {
        let byte = cursor
            .next_byte()
            .ok_or_else(|| Error::truncated(cursor.position()))?;
        let bits = u64::from(byte & 0x7F);

        if i == MAX_VARINT_LEN - 1 && bits > 1 {
            return Err(Error::Overflow { offset: start });
        }

        value |= bits << (7 * i);

        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    // Continuation bit still set on the tenth byte
    Err(Error::Overflow { offset: start })
}

/// Reads a zig-zag encoded signed varint.
pub fn read_signed_varint(cursor: &mut Cursor) -> Result<(i64, usize)> {
    let (raw, len) = read_varint(cursor)?;
    Ok((zigzag_decode(raw), len))
}

/// Maps a raw varint to a signed value: `raw >> 1`, negated when raw is odd.
///
/// Both 0 and 1 decode to zero, so 2, 3, 4, 5, ... give 1, -1, 2, -2, ...
pub fn zigzag_decode(raw: u64) -> i64 {
    let magnitude = (raw >> 1) as i64;
    if raw & 1 == 1 {
        -magnitude
    } else {
        magnitude
    }
}

/// Inverse of [`zigzag_decode`]: `2x` for non-negative x, `2|x| + 1` otherwise.
///
/// `i64::MIN` has no encoding and wraps.
pub fn zigzag_encode(value: i64) -> u64 {
    if value < 0 {
        (value.unsigned_abs() << 1) | 1
    } else {
        (value as u64) << 1
    }
}

/// Appends `value` as an unsigned varint.
pub fn encode_varint(mut value: u64, buf: &mut impl BufMut) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Appends `value` as a zig-zag encoded varint.
pub fn encode_signed_varint(value: i64, buf: &mut impl BufMut) {
    encode_varint(zigzag_encode(value), buf);
}
