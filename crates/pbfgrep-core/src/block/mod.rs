//! Header and data block decoding.
//!
//! A frame payload is either a `HeaderBlock` (file metadata) or a
//! `PrimitiveBlock` holding a string table and one or more primitive groups.
//! Only nodes are decoded from groups; ways, relations and changesets are
//! skipped.

mod dense;
mod strings;

use crate::error::{Error, Result};
use crate::wire::{
    collect_fields, iterate_fields, zigzag_decode, Field, FieldValue, UnknownFields,
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace};

pub use dense::{decode_dense, decode_node, split_tag_runs, TagRef};
pub use strings::StringTable;

/// Required features this decoder understands
pub const SUPPORTED_FEATURES: &[&str] = &["OsmSchema-V0.6", "DenseNodes"];

/// A resolved (key, value) tag
pub type Tag = (Arc<str>, Arc<str>);

/// One node, explicit or dense
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointRecord {
    /// Node id
    pub id: i64,
    /// Latitude in granularity units
    pub lat: i64,
    /// Longitude in granularity units
    pub lon: i64,
    /// Tags in encoded order
    pub tags: Vec<Tag>,
}

/// Value of a top-level header field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    /// Field kept as read
    Scalar(FieldValue),
    /// Field 1, decoded as a nested message
    Message(Vec<Field>),
}

/// One top-level header field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    /// Field number
    pub number: u32,
    /// Field value
    pub value: HeaderValue,
}

/// Bounding box from the header, in nanodegrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundingBox {
    /// Western edge
    pub left: i64,
    /// Eastern edge
    pub right: i64,
    /// Northern edge
    pub top: i64,
    /// Southern edge
    pub bottom: i64,
}

/// Decoded `HeaderBlock`
///
/// Version negotiation is left to the caller; the block only exposes what the
/// file declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    /// All top-level fields in encoded order
    pub fields: Vec<HeaderField>,
}

impl HeaderBlock {
    /// Decodes a header block payload.
    pub fn decode(payload: Bytes) -> Result<Self> {
        let mut fields = Vec::new();

        for field in iterate_fields(payload) {
            let Field { number, value } = field?;
            let value = match (number, value) {
                (1, FieldValue::Bytes(bytes)) => HeaderValue::Message(collect_fields(bytes)?),
                (1, FieldValue::Varint(_)) => {
                    return Err(Error::UnexpectedFieldType {
                        message: "HeaderBlock",
                        field: 1,
                    })
                }
                (_, value) => HeaderValue::Scalar(value),
            };
            fields.push(HeaderField { number, value });
        }

        Ok(Self { fields })
    }

    fn strings(&self, number: u32) -> impl Iterator<Item = String> + '_ {
        self.fields.iter().filter_map(move |field| match &field.value {
            HeaderValue::Scalar(FieldValue::Bytes(bytes)) if field.number == number => {
                Some(String::from_utf8_lossy(bytes).into_owned())
            }
            _ => None,
        })
    }

    /// Bounding box (field 1), if present
    pub fn bbox(&self) -> Option<BoundingBox> {
        let nested = self.fields.iter().find_map(|field| match &field.value {
            HeaderValue::Message(nested) if field.number == 1 => Some(nested),
            _ => None,
        })?;

        let mut bbox = BoundingBox::default();
        for field in nested {
            let FieldValue::Varint(raw) = field.value else {
                continue;
            };
            let value = zigzag_decode(raw);
            match field.number {
                1 => bbox.left = value,
                2 => bbox.right = value,
                3 => bbox.top = value,
                4 => bbox.bottom = value,
                _ => {}
            }
        }
        Some(bbox)
    }

    /// Features a reader must support (field 4)
    pub fn required_features(&self) -> Vec<String> {
        self.strings(4).collect()
    }

    /// Features a reader may use (field 5)
    pub fn optional_features(&self) -> Vec<String> {
        self.strings(5).collect()
    }

    /// Program that wrote the file (field 16)
    pub fn writing_program(&self) -> Option<String> {
        self.strings(16).next()
    }

    /// Data source (field 17)
    pub fn source(&self) -> Option<String> {
        self.strings(17).next()
    }

    /// Required features not in [`SUPPORTED_FEATURES`]
    pub fn unsupported_features(&self) -> Vec<String> {
        self.strings(4)
            .filter(|feature| !SUPPORTED_FEATURES.contains(&feature.as_str()))
            .collect()
    }
}

/// Nodes decoded from one primitive group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimitiveGroup {
    /// Explicit and dense nodes in encoded order
    pub records: Vec<PointRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupField {
    Node,
    Dense,
    Ways,
    Relations,
    Changesets,
    Unknown(u32),
}

impl From<u32> for GroupField {
    fn from(number: u32) -> Self {
        match number {
            1 => Self::Node,
            2 => Self::Dense,
            3 => Self::Ways,
            4 => Self::Relations,
            5 => Self::Changesets,
            n => Self::Unknown(n),
        }
    }
}

impl PrimitiveGroup {
    /// Decodes a `PrimitiveGroup` against the block's string table.
    pub fn decode(buf: Bytes, strings: &StringTable) -> Result<Self> {
        const MESSAGE: &str = "PrimitiveGroup";

        let mut records = Vec::new();
        for field in iterate_fields(buf) {
            let field = field?;
            match GroupField::from(field.number) {
                GroupField::Node => {
                    records.push(decode_node(field.into_bytes(MESSAGE)?, strings)?);
                }
                GroupField::Dense => {
                    records.extend(decode_dense(field.into_bytes(MESSAGE)?, strings)?);
                }
                GroupField::Ways | GroupField::Relations | GroupField::Changesets => {
                    trace!("Skipping non-node entity (field {})", field.number);
                }
                GroupField::Unknown(n) => UnknownFields::Skip.check(MESSAGE, n)?,
            }
        }

        Ok(Self { records })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockField {
    StringTable,
    Group,
    Unknown(u32),
}

impl From<u32> for BlockField {
    fn from(number: u32) -> Self {
        match number {
            1 => Self::StringTable,
            2 => Self::Group,
            n => Self::Unknown(n),
        }
    }
}

/// Decoded `PrimitiveBlock`
///
/// Each group is decoded independently; a group that fails with a
/// recoverable error keeps its error here instead of aborting the block.
#[derive(Debug, Default)]
pub struct DataBlock {
    /// Group results in encoded order
    pub groups: Vec<Result<PrimitiveGroup>>,
}

impl DataBlock {
    /// Decodes a data block payload.
    pub fn decode(payload: Bytes) -> Result<Self> {
        const MESSAGE: &str = "PrimitiveBlock";

        let mut strings = StringTable::default();
        let mut groups = Vec::new();

        for field in iterate_fields(payload) {
            let field = field?;
            match BlockField::from(field.number) {
                BlockField::StringTable => {
                    strings = StringTable::decode(field.into_bytes(MESSAGE)?)?;
                    trace!("String table with {} slots", strings.len());
                }
                BlockField::Group => {
                    match PrimitiveGroup::decode(field.into_bytes(MESSAGE)?, &strings) {
                        Err(e) if !e.is_recoverable() => return Err(e),
                        result => groups.push(result),
                    }
                }
                // granularity, offsets, date granularity
                BlockField::Unknown(n) => UnknownFields::Skip.check(MESSAGE, n)?,
            }
        }

        debug!("Decoded data block with {} group(s)", groups.len());
        Ok(Self { groups })
    }

    /// Number of records across all successfully decoded groups
    pub fn record_count(&self) -> usize {
        self.groups
            .iter()
            .filter_map(|group| group.as_ref().ok())
            .map(|group| group.records.len())
            .sum()
    }
}
