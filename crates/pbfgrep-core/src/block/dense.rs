//! Node decoding: the dense layout and single explicit nodes.
//!
//! Dense nodes store ids and coordinates as parallel delta-coded arrays.
//! Tags for all nodes share one flat array of string table indices:
//!
//! ```text
//! k1 v1 k2 v2 0  0  k1 v1 0 ...
//! `-- node 0 --' |  `node 2'
//!             node 1
//! ```

use super::{PointRecord, StringTable, Tag};
use crate::error::{Error, Result};
use crate::wire::{
    decode_packed_deltas, decode_packed_varints, iterate_fields, zigzag_decode, UnknownFields,
};
use bytes::Bytes;

/// Tag pair as (key index, value index) into the string table
pub type TagRef = (u64, u64);

/// Splits a flat, zero-terminated tag array into one run of pairs per node.
///
/// The last run must be terminated and every run must hold an even number of
/// indices.
pub fn split_tag_runs(flat: &[u64]) -> Result<Vec<Vec<TagRef>>> {
    let mut runs = Vec::new();
    let mut rest = flat;
    while !rest.is_empty() {
        let end = rest.iter().position(|&index| index == 0).ok_or_else(|| {
            Error::group_corrupt(format!(
                "tag run {} is missing its terminator",
                runs.len()
            ))
        })?;
        runs.push(&rest[..end]);
        rest = &rest[end + 1..];
    }

    runs.into_iter()
        .enumerate()
        .map(|(node, run)| {
            if run.len() % 2 != 0 {
                return Err(Error::group_corrupt(format!(
                    "tag run {} has an odd number of indices",
                    node
                )));
            }
            Ok(run.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect())
        })
        .collect()
}

fn resolve_tags(refs: &[TagRef], strings: &StringTable) -> Result<Vec<Tag>> {
    refs.iter()
        .map(|&(key, value)| Ok((strings.resolve(key)?, strings.resolve(value)?)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DenseField {
    Id,
    Info,
    Lat,
    Lon,
    KeysVals,
    Unknown(u32),
}

impl From<u32> for DenseField {
    fn from(number: u32) -> Self {
        match number {
            1 => Self::Id,
            5 => Self::Info,
            8 => Self::Lat,
            9 => Self::Lon,
            10 => Self::KeysVals,
            n => Self::Unknown(n),
        }
    }
}

/// Decodes a `DenseNodes` message into records.
///
/// A missing tag array means no node carries tags. Arrays of unequal length
/// are reported as [`Error::GroupCorrupt`] and no records are returned.
pub fn decode_dense(buf: Bytes, strings: &StringTable) -> Result<Vec<PointRecord>> {
    const MESSAGE: &str = "DenseNodes";

    let mut ids = Vec::new();
    let mut lats = Vec::new();
    let mut lons = Vec::new();
    let mut keys_vals = None;

    for field in iterate_fields(buf) {
        let field = field?;
        match DenseField::from(field.number) {
            DenseField::Id => ids = decode_packed_deltas(field.into_bytes(MESSAGE)?)?,
            DenseField::Lat => lats = decode_packed_deltas(field.into_bytes(MESSAGE)?)?,
            DenseField::Lon => lons = decode_packed_deltas(field.into_bytes(MESSAGE)?)?,
            DenseField::KeysVals => {
                keys_vals = Some(decode_packed_varints(field.into_bytes(MESSAGE)?)?)
            }
            DenseField::Info => {}
            DenseField::Unknown(n) => UnknownFields::Skip.check(MESSAGE, n)?,
        }
    }

    let runs = match keys_vals {
        Some(flat) => split_tag_runs(&flat)?,
        None => vec![Vec::new(); ids.len()],
    };

    if ids.len() != lats.len() || ids.len() != lons.len() || ids.len() != runs.len() {
        return Err(Error::group_corrupt(format!(
            "dense arrays disagree: ids={} lats={} lons={} tags={}",
            ids.len(),
            lats.len(),
            lons.len(),
            runs.len()
        )));
    }

    ids.into_iter()
        .zip(lats)
        .zip(lons)
        .zip(runs)
        .map(|(((id, lat), lon), run)| {
            Ok(PointRecord {
                id,
                lat,
                lon,
                tags: resolve_tags(&run, strings)?,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeField {
    Id,
    Keys,
    Vals,
    Info,
    Lat,
    Lon,
    Unknown(u32),
}

impl From<u32> for NodeField {
    fn from(number: u32) -> Self {
        match number {
            1 => Self::Id,
            2 => Self::Keys,
            3 => Self::Vals,
            4 => Self::Info,
            8 => Self::Lat,
            9 => Self::Lon,
            n => Self::Unknown(n),
        }
    }
}

/// Decodes an explicitly encoded `Node` message.
pub fn decode_node(buf: Bytes, strings: &StringTable) -> Result<PointRecord> {
    const MESSAGE: &str = "Node";

    let mut record = PointRecord::default();
    let mut keys = Vec::new();
    let mut vals = Vec::new();

    for field in iterate_fields(buf) {
        let field = field?;
        match NodeField::from(field.number) {
            NodeField::Id => record.id = zigzag_decode(field.varint(MESSAGE)?),
            NodeField::Lat => record.lat = zigzag_decode(field.varint(MESSAGE)?),
            NodeField::Lon => record.lon = zigzag_decode(field.varint(MESSAGE)?),
            NodeField::Keys => keys = decode_packed_varints(field.into_bytes(MESSAGE)?)?,
            NodeField::Vals => vals = decode_packed_varints(field.into_bytes(MESSAGE)?)?,
            NodeField::Info => {}
            NodeField::Unknown(n) => UnknownFields::Skip.check(MESSAGE, n)?,
        }
    }

    if keys.len() != vals.len() {
        return Err(Error::group_corrupt(format!(
            "node {} has {} keys but {} values",
            record.id,
            keys.len(),
            vals.len()
        )));
    }

    let refs: Vec<TagRef> = keys.into_iter().zip(vals).collect();
    record.tags = resolve_tags(&refs, strings)?;
    Ok(record)
}
