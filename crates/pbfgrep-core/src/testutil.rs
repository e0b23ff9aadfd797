//! Fixture builders for tests.
//!
//! Messages are encoded with prost so the decoders are checked against an
//! independent protobuf implementation. Signed fields are declared `uint64`
//! and carry values already mapped with [`zigzag_encode`], since the format
//! negates odd values rather than complementing them like `sint64`.

use crate::wire::zigzag_encode;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use prost::Message;
use std::io::Write;

#[derive(Clone, PartialEq, Message)]
pub(crate) struct BlobHeader {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(int32, tag = "3")]
    pub datasize: i32,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct Blob {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub raw: Option<Vec<u8>>,
    #[prost(int32, optional, tag = "2")]
    pub raw_size: Option<i32>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub zlib_data: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub lzma_data: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct HeaderBBox {
    #[prost(uint64, tag = "1")]
    pub left: u64,
    #[prost(uint64, tag = "2")]
    pub right: u64,
    #[prost(uint64, tag = "3")]
    pub top: u64,
    #[prost(uint64, tag = "4")]
    pub bottom: u64,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct HeaderBlock {
    #[prost(message, optional, tag = "1")]
    pub bbox: Option<HeaderBBox>,
    #[prost(string, repeated, tag = "4")]
    pub required_features: Vec<String>,
    #[prost(string, repeated, tag = "5")]
    pub optional_features: Vec<String>,
    #[prost(string, optional, tag = "16")]
    pub writingprogram: Option<String>,
    #[prost(string, optional, tag = "17")]
    pub source: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct StringTable {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub s: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct Node {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(uint32, repeated, packed = "true", tag = "2")]
    pub keys: Vec<u32>,
    #[prost(uint32, repeated, packed = "true", tag = "3")]
    pub vals: Vec<u32>,
    #[prost(uint64, tag = "8")]
    pub lat: u64,
    #[prost(uint64, tag = "9")]
    pub lon: u64,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct DenseNodes {
    #[prost(uint64, repeated, packed = "true", tag = "1")]
    pub id: Vec<u64>,
    #[prost(uint64, repeated, packed = "true", tag = "8")]
    pub lat: Vec<u64>,
    #[prost(uint64, repeated, packed = "true", tag = "9")]
    pub lon: Vec<u64>,
    #[prost(int32, repeated, packed = "true", tag = "10")]
    pub keys_vals: Vec<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct Way {
    #[prost(int64, tag = "1")]
    pub id: i64,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct PrimitiveGroup {
    #[prost(message, repeated, tag = "1")]
    pub nodes: Vec<Node>,
    #[prost(message, optional, tag = "2")]
    pub dense: Option<DenseNodes>,
    #[prost(message, repeated, tag = "3")]
    pub ways: Vec<Way>,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct PrimitiveBlock {
    #[prost(message, optional, tag = "1")]
    pub stringtable: Option<StringTable>,
    #[prost(message, repeated, tag = "2")]
    pub primitivegroup: Vec<PrimitiveGroup>,
    #[prost(int32, optional, tag = "17")]
    pub granularity: Option<i32>,
}

/// Length prefix, `BlobHeader` and `Blob` for one frame.
pub(crate) fn frame(label: &str, blob: &Blob) -> Vec<u8> {
    let body = blob.encode_to_vec();
    let header = BlobHeader {
        r#type: label.to_string(),
        datasize: body.len() as i32,
    }
    .encode_to_vec();

    let mut out = (header.len() as u32).to_be_bytes().to_vec();
    out.extend(header);
    out.extend(body);
    out
}

pub(crate) fn raw_blob(payload: Vec<u8>) -> Blob {
    Blob {
        raw: Some(payload),
        ..Default::default()
    }
}

pub(crate) fn zlib_blob(payload: &[u8]) -> Blob {
    Blob {
        raw_size: Some(payload.len() as i32),
        zlib_data: Some(compress(payload)),
        ..Default::default()
    }
}

pub(crate) fn compress(payload: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).unwrap();
    encoder.finish().unwrap()
}

pub(crate) fn string_table(strings: &[&str]) -> StringTable {
    StringTable {
        s: strings.iter().map(|s| s.as_bytes().to_vec()).collect(),
    }
}

/// Raw varint for a signed field.
pub(crate) fn signed(value: i64) -> u64 {
    zigzag_encode(value)
}

/// Turns absolute values into the encoded delta form stored in dense nodes.
pub(crate) fn deltas(values: &[i64]) -> Vec<u64> {
    let mut previous = 0;
    values
        .iter()
        .map(|&value| {
            let delta = signed(value - previous);
            previous = value;
            delta
        })
        .collect()
}

pub(crate) fn dense(ids: &[i64], lats: &[i64], lons: &[i64], keys_vals: &[i32]) -> DenseNodes {
    DenseNodes {
        id: deltas(ids),
        lat: deltas(lats),
        lon: deltas(lons),
        keys_vals: keys_vals.to_vec(),
    }
}

pub(crate) fn dense_block(strings: &[&str], dense: DenseNodes) -> PrimitiveBlock {
    PrimitiveBlock {
        stringtable: Some(string_table(strings)),
        primitivegroup: vec![PrimitiveGroup {
            dense: Some(dense),
            ..Default::default()
        }],
        granularity: Some(100),
    }
}

/// Header frame with a raw empty payload followed by one compressed data
/// frame: `amenity=cafe` on node 100, no tags on node 101.
pub(crate) fn cafe_file() -> Vec<u8> {
    let block = dense_block(
        &["amenity", "cafe"],
        dense(&[100, 101], &[10, 10], &[20, 21], &[1, 2, 0, 0]),
    );

    let mut out = frame("OSMHeader", &raw_blob(Vec::new()));
    out.extend(frame("OSMData", &zlib_blob(&block.encode_to_vec())));
    out
}
