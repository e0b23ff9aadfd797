//! Low-level protobuf wire format decoding.
//!
//! This module reads the subset of the protobuf wire format used by PBF
//! files: varint fields and length-delimited fields. It assigns no meaning to
//! field numbers; the message decoders in [`crate::frame`] and
//! [`crate::block`] do that.
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "tag" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 5: I32 (fixed32, sfixed32, float)
//!
//! Only VARINT and LEN appear in PBF messages; the others are rejected.

mod cursor;
mod packed;
mod varint;

use crate::error::{Error, Result};
use bytes::Bytes;
use tracing::trace;

pub use cursor::Cursor;
pub use packed::{decode_packed_deltas, decode_packed_varints};
pub use varint::{
    encode_signed_varint, encode_varint, read_signed_varint, read_varint, zigzag_decode,
    zigzag_encode, MAX_VARINT_LEN,
};

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_VALID_NUMBER: u32 = 536_870_911;

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    I64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    Len = 2,
    /// Start group (deprecated)
    StartGroup = 3,
    /// End group (deprecated)
    EndGroup = 4,
    /// 32-bit fixed-width
    I32 = 5,
}

impl WireType {
    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(WireType::Varint),
            1 => Some(WireType::I64),
            2 => Some(WireType::Len),
            3 => Some(WireType::StartGroup),
            4 => Some(WireType::EndGroup),
            5 => Some(WireType::I32),
            _ => None,
        }
    }
}

/// Decoded value of a single field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// VARINT payload
    Varint(u64),
    /// LEN payload
    Bytes(Bytes),
}

/// One (field number, value) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field number from the tag
    pub number: u32,
    /// Field payload
    pub value: FieldValue,
}

impl Field {
    /// Returns the varint payload, failing if the field is length-delimited.
    pub fn varint(&self, message: &'static str) -> Result<u64> {
        match self.value {
            FieldValue::Varint(value) => Ok(value),
            FieldValue::Bytes(_) => Err(self.wrong_type(message)),
        }
    }

    /// Returns the length-delimited payload, failing if the field is a varint.
    pub fn into_bytes(self, message: &'static str) -> Result<Bytes> {
        match self.value {
            FieldValue::Bytes(bytes) => Ok(bytes),
            FieldValue::Varint(_) => Err(self.wrong_type(message)),
        }
    }

    fn wrong_type(&self, message: &'static str) -> Error {
        Error::UnexpectedFieldType {
            message,
            field: self.number,
        }
    }
}

/// What a message decoder does with field numbers it does not know
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownFields {
    /// Ignore the field and keep decoding
    Skip,
    /// Fail with [`Error::UnexpectedField`]
    Reject,
}

impl UnknownFields {
    /// Applies the policy to an unknown field of `message`.
    pub fn check(self, message: &'static str, field: u32) -> Result<()> {
        match self {
            UnknownFields::Skip => {
                trace!("Skipping field {} of {}", field, message);
                Ok(())
            }
            UnknownFields::Reject => Err(Error::UnexpectedField { message, field }),
        }
    }
}

/// Reads a field tag.
///
/// Returns the field number, wire type and bytes consumed.
pub fn read_tag(cursor: &mut Cursor) -> Result<(u32, WireType, usize)> {
    let (tag, len) = read_varint(cursor)?;
    let field_number = tag >> 3;
    let bits = (tag & 0x07) as u8;

    if field_number == 0 || field_number > u64::from(MAX_VALID_NUMBER) {
        return Err(Error::InvalidFieldNumber {
            number: field_number,
            max: MAX_VALID_NUMBER,
        });
    }

    let wire_type = WireType::from_bits(bits).ok_or(Error::UnsupportedWireType {
        field: field_number,
        wire_type: bits,
    })?;

    Ok((field_number as u32, wire_type, len))
}

/// Reads one complete field.
///
/// Returns the field number, its value and the total bytes consumed
/// (tag included).
pub fn read_field(cursor: &mut Cursor) -> Result<(u32, FieldValue, usize)> {
    let (field_number, wire_type, tag_len) = read_tag(cursor)?;

    match wire_type {
        WireType::Varint => {
            let (value, len) = read_varint(cursor)?;
            Ok((field_number, FieldValue::Varint(value), tag_len + len))
        }
        WireType::Len => {
            let offset = cursor.position();
            let (length, len) = read_varint(cursor)?;
            let length = usize::try_from(length).map_err(|_| Error::Overflow { offset })?;
            let bytes = cursor
                .take(length)
                .ok_or_else(|| Error::truncated(cursor.len()))?;
            Ok((field_number, FieldValue::Bytes(bytes), tag_len + len + length))
        }
        other => Err(Error::UnsupportedWireType {
            field: u64::from(field_number),
            wire_type: other as u8,
        }),
    }
}

/// Iterates over the fields of an encoded message.
///
/// The iterator ends once the whole buffer is consumed. A field that would
/// read past the end of the buffer yields [`Error::FrameSizeMismatch`]; after
/// any error the iterator is exhausted.
pub fn iterate_fields(buf: impl Into<Bytes>) -> Fields {
    Fields {
        cursor: Cursor::new(buf),
        failed: false,
    }
}

/// Decodes every field of a message into a list.
pub fn collect_fields(buf: impl Into<Bytes>) -> Result<Vec<Field>> {
    iterate_fields(buf).collect()
}

/// Single-pass iterator returned by [`iterate_fields`]
#[derive(Debug, Clone)]
pub struct Fields {
    cursor: Cursor,
    failed: bool,
}

impl Iterator for Fields {
    type Item = Result<Field>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor.is_empty() {
            return None;
        }

        let offset = self.cursor.position();
        match read_field(&mut self.cursor) {
            Ok((number, value, _)) => Some(Ok(Field { number, value })),
            Err(e) => {
                self.failed = true;
                Some(Err(match e {
                    Error::TruncatedInput { .. } => Error::FrameSizeMismatch {
                        declared: self.cursor.len(),
                        offset,
                    },
                    other => other,
                }))
            }
        }
    }
}

impl std::iter::FusedIterator for Fields {}
