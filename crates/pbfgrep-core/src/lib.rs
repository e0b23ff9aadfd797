//! # pbfgrep-core
//!
//! A streaming decoder for OpenStreetMap PBF files.
//!
//! This crate provides the core functionality for:
//! - Reading protobuf wire format fields, varints and packed arrays
//! - Splitting a file into frames and inflating zlib-compressed blobs
//! - Decoding header blocks, string tables, explicit nodes and dense nodes
//! - Flattening everything into a lazy stream of point records
//!
//! ## Architecture
//!
//! The library is organized leaf-first:
//!
//! - [`wire`]: Varints, tags and length-delimited fields
//! - [`frame`]: Length-prefixed frames and blob decompression
//! - [`block`]: Header and data block decoding
//! - [`records`]: The record iterator
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! // Print every node tagged amenity=cafe
//! for record in pbfgrep_core::open("./monaco.osm.pbf")? {
//!     let record = record?;
//!     if record.tags.iter().any(|(k, v)| &**k == "amenity" && &**v == "cafe") {
//!         println!("{} {} {}", record.id, record.lat, record.lon);
//!     }
//! }
//! # Ok::<(), pbfgrep_core::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod block;
pub mod error;
pub mod frame;
pub mod records;
pub mod wire;

#[cfg(test)]
mod testutil;

// Re-export primary types for convenience
pub use block::{DataBlock, HeaderBlock, PointRecord, StringTable, Tag};
pub use error::{Error, Result};
pub use frame::{read_frames, Frame, FrameConfig, FrameKind, Frames};
pub use records::{open, Records};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Type label of the file metadata frame
pub const HEADER_BLOCK: &str = "OSMHeader";

/// Type label of data frames
pub const DATA_BLOCK: &str = "OSMData";
