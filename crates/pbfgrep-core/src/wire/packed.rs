//! Packed repeated fields.
//!
//! Coordinates and ids are stored as zig-zag deltas from the previous
//! element, so the delta decoder keeps a running sum.

use super::{read_signed_varint, read_varint, Cursor};
use crate::error::{Error, Result};
use bytes::Bytes;

/// Decodes a packed array of unsigned varints.
pub fn decode_packed_varints(buf: impl Into<Bytes>) -> Result<Vec<u64>> {
    let mut cursor = Cursor::new(buf);
    let mut values = Vec::new();

    while !cursor.is_empty() {
        let (value, _) = read_varint(&mut cursor)?;
        values.push(value);
    }

    Ok(values)
}

/// Decodes a packed array of zig-zag deltas into absolute values.
///
/// The first element is taken as-is; each following element is added to the
/// previous result.
pub fn decode_packed_deltas(buf: impl Into<Bytes>) -> Result<Vec<i64>> {
    let mut cursor = Cursor::new(buf);
    let mut values = Vec::new();
    let mut current: i64 = 0;

    while !cursor.is_empty() {
        let offset = cursor.position();
        let (delta, _) = read_signed_varint(&mut cursor)?;
        current = current
            .checked_add(delta)
            .ok_or(Error::Overflow { offset })?;
        values.push(current);
    }

    Ok(values)
}
