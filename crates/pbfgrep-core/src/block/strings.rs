//! Per-block string dictionary.

use crate::error::{Error, Result};
use crate::wire::{iterate_fields, UnknownFields};
use bytes::Bytes;
use std::sync::Arc;

/// Block-scoped string dictionary.
///
/// Slot 0 is reserved for the empty string. Writers usually encode it as the
/// first entry; when the first encoded entry is not empty the slot is implied
/// and the encoded entries start at index 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringTable {
    entries: Vec<Arc<str>>,
}

impl StringTable {
    /// Decodes a `StringTable` message.
    pub fn decode(buf: Bytes) -> Result<Self> {
        const MESSAGE: &str = "StringTable";

        let mut strings = Vec::new();
        for field in iterate_fields(buf) {
            let field = field?;
            if field.number != 1 {
                UnknownFields::Reject.check(MESSAGE, field.number)?;
                continue;
            }
            let bytes = field.into_bytes(MESSAGE)?;
            let s = String::from_utf8(bytes.to_vec())
                .map_err(|source| Error::InvalidString { message: MESSAGE, source })?;
            strings.push(s);
        }

        Ok(Self::from_strings(strings))
    }

    /// Builds a table from decoded entries in encounter order.
    pub fn from_strings<I, S>(strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let mut entries: Vec<Arc<str>> = strings.into_iter().map(Into::into).collect();
        if entries.first().map_or(true, |first| !first.is_empty()) {
            entries.insert(0, Arc::from(""));
        }
        Self { entries }
    }

    /// Looks up an entry by index.
    pub fn get(&self, index: u64) -> Option<&Arc<str>> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.entries.get(index))
    }

    /// Looks up an entry, treating a dangling index as group corruption.
    pub fn resolve(&self, index: u64) -> Result<Arc<str>> {
        self.get(index).cloned().ok_or_else(|| {
            Error::group_corrupt(format!(
                "string index {} out of range for table of {}",
                index,
                self.entries.len()
            ))
        })
    }

    /// Number of slots, including the reserved one
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no slots at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::string_table;
    use prost::Message;

    fn decode(strings: &[&str]) -> StringTable {
        StringTable::decode(Bytes::from(string_table(strings).encode_to_vec())).unwrap()
    }

    #[test]
    fn test_explicit_reserved_slot() {
        let table = decode(&["", "amenity", "cafe"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(1).map(|s| &**s), Some("amenity"));
        assert_eq!(table.get(2).map(|s| &**s), Some("cafe"));
    }

    #[test]
    fn test_implied_reserved_slot() {
        let table = decode(&["amenity", "cafe"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(0).map(|s| &**s), Some(""));
        assert_eq!(table.get(1).map(|s| &**s), Some("amenity"));
        assert_eq!(table.get(2).map(|s| &**s), Some("cafe"));
        assert!(table.get(3).is_none());
    }

    #[test]
    fn test_resolve_out_of_range() {
        let table = decode(&["", "name"]);
        assert!(matches!(table.resolve(7), Err(Error::GroupCorrupt { .. })));
        assert!(StringTable::default().resolve(0).is_err());
    }

    #[test]
    fn test_rejects_foreign_fields() {
        // Field 2, varint 1
        let err = StringTable::decode(Bytes::from_static(&[0x10, 0x01])).unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedField {
                message: "StringTable",
                field: 2
            }
        ));
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        let err = StringTable::decode(Bytes::from_static(&[0x0A, 0x01, 0xFF])).unwrap_err();
        assert!(matches!(err, Error::InvalidString { .. }));
    }
}
