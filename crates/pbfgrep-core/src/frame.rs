//! Outer block framing.
//!
//! A PBF file is a sequence of frames:
//!
//! ```text
//! [u32 big-endian header length][BlobHeader][Blob]
//! ```
//!
//! `BlobHeader` names the block kind and the length of the following `Blob`.
//! The `Blob` carries the block either raw or zlib-compressed. [`Frames`]
//! reads one frame per call to `next` and hands out the decompressed payload.

use crate::error::{Error, Result};
use crate::wire::{iterate_fields, UnknownFields};
use crate::{DATA_BLOCK, HEADER_BLOCK};
use bytes::Bytes;
use flate2::read::ZlibDecoder;
use std::io::{self, Read};
use tracing::{debug, trace};

/// Limits applied while reading frames
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest accepted `BlobHeader`
    pub max_header_size: usize,
    /// Largest accepted `Blob`, compressed or not
    pub max_blob_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_header_size: 64 * 1024,
            max_blob_size: 32 * 1024 * 1024,
        }
    }
}

impl FrameConfig {
    /// Creates a new frame config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum header size
    pub fn max_header_size(mut self, size: usize) -> Self {
        self.max_header_size = size;
        self
    }

    /// Sets the maximum blob size
    pub fn max_blob_size(mut self, size: usize) -> Self {
        self.max_blob_size = size;
        self
    }
}

/// Block kind named by a frame's type label
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// File metadata (`OSMHeader`)
    Header,
    /// Entity data (`OSMData`)
    Data,
    /// Any other label
    Other(String),
}

/// One decoded frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw type label from the `BlobHeader`
    pub label: Bytes,
    /// Decompressed block bytes
    pub payload: Bytes,
}

impl Frame {
    /// Classifies the frame by its label
    pub fn kind(&self) -> FrameKind {
        match self.label.as_ref() {
            l if l == HEADER_BLOCK.as_bytes() => FrameKind::Header,
            l if l == DATA_BLOCK.as_bytes() => FrameKind::Data,
            l => FrameKind::Other(String::from_utf8_lossy(l).into_owned()),
        }
    }
}

/// A frame body before decompression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Blob {
    /// Uncompressed payload
    Raw(Bytes),
    /// zlib stream and the declared inflated size
    Zlib {
        /// Declared size after inflation
        raw_size: usize,
        /// Compressed bytes
        data: Bytes,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlobHeaderField {
    Type,
    IndexData,
    DataSize,
    Unknown(u32),
}

impl From<u32> for BlobHeaderField {
    fn from(number: u32) -> Self {
        match number {
            1 => Self::Type,
            2 => Self::IndexData,
            3 => Self::DataSize,
            n => Self::Unknown(n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlobField {
    Raw,
    RawSize,
    Zlib,
    Lzma,
    Bzip2,
    Lz4,
    Zstd,
    Unknown(u32),
}

impl From<u32> for BlobField {
    fn from(number: u32) -> Self {
        match number {
            1 => Self::Raw,
            2 => Self::RawSize,
            3 => Self::Zlib,
            4 => Self::Lzma,
            5 => Self::Bzip2,
            6 => Self::Lz4,
            7 => Self::Zstd,
            n => Self::Unknown(n),
        }
    }
}

impl Blob {
    /// Decodes a `Blob` message.
    ///
    /// A zero-length message carries no encoding at all and is read as an
    /// empty raw payload.
    pub fn decode(body: Bytes, config: &FrameConfig) -> Result<Self> {
        const MESSAGE: &str = "Blob";

        if body.is_empty() {
            return Ok(Blob::Raw(Bytes::new()));
        }

        let mut raw = None;
        let mut raw_size = 0;
        let mut zlib = None;

        for field in iterate_fields(body) {
            let field = field?;
            match BlobField::from(field.number) {
                BlobField::Raw => raw = Some(field.into_bytes(MESSAGE)?),
                BlobField::RawSize => raw_size = field.varint(MESSAGE)?,
                BlobField::Zlib => zlib = Some(field.into_bytes(MESSAGE)?),
                BlobField::Lzma => return Err(Error::unsupported_encoding("lzma")),
                BlobField::Bzip2 => return Err(Error::unsupported_encoding("bzip2")),
                BlobField::Lz4 => return Err(Error::unsupported_encoding("lz4")),
                BlobField::Zstd => return Err(Error::unsupported_encoding("zstd")),
                BlobField::Unknown(n) => UnknownFields::Skip.check(MESSAGE, n)?,
            }
        }

        if let Some(raw) = raw {
            return Ok(Blob::Raw(raw));
        }

        let Some(data) = zlib else {
            return Err(Error::unsupported_encoding("none"));
        };

        let raw_size = usize::try_from(raw_size)
            .ok()
            .filter(|&size| size <= config.max_blob_size)
            .ok_or(Error::FrameTooLarge {
                part: "inflated blob",
                size: usize::try_from(raw_size).unwrap_or(usize::MAX),
                max: config.max_blob_size,
            })?;

        Ok(Blob::Zlib { raw_size, data })
    }

    /// Returns the block bytes, inflating if needed.
    pub fn into_payload(self) -> Result<Bytes> {
        match self {
            Blob::Raw(bytes) => Ok(bytes),
            Blob::Zlib { raw_size, data } => {
                let mut out = Vec::with_capacity(raw_size);
                // One extra byte is enough to detect an oversized stream
                ZlibDecoder::new(data.as_ref())
                    .take(raw_size as u64 + 1)
                    .read_to_end(&mut out)
                    .map_err(Error::Decompress)?;

                if out.len() != raw_size {
                    return Err(Error::SizeMismatch {
                        expected: raw_size,
                        actual: out.len(),
                    });
                }

                trace!("Inflated {} -> {} bytes", data.len(), raw_size);
                Ok(Bytes::from(out))
            }
        }
    }
}

/// Reads frames from a byte stream.
pub fn read_frames<R: Read>(reader: R) -> Frames<R> {
    Frames::new(reader)
}

/// Lazy iterator over the frames of a stream
#[derive(Debug)]
pub struct Frames<R> {
    reader: R,
    config: FrameConfig,
    offset: usize,
    done: bool,
}

impl<R: Read> Frames<R> {
    /// Creates a frame reader with default limits
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, FrameConfig::default())
    }

    /// Creates a frame reader with custom limits
    pub fn with_config(reader: R, config: FrameConfig) -> Self {
        Self {
            reader,
            config,
            offset: 0,
            done: false,
        }
    }

    /// Bytes consumed from the stream so far
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Reads the 4-byte length prefix; `None` on a clean end of stream.
    fn read_length_prefix(&mut self) -> Result<Option<usize>> {
        let mut prefix = [0u8; 4];
        let mut filled = 0;

        while filled < prefix.len() {
            match self.reader.read(&mut prefix[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }

        match filled {
            0 => Ok(None),
            4 => {
                self.offset += 4;
                Ok(Some(u32::from_be_bytes(prefix) as usize))
            }
            n => Err(Error::truncated(self.offset + n)),
        }
    }

    fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::truncated(self.offset)
            } else {
                Error::Io(e)
            }
        })?;
        self.offset += len;
        Ok(Bytes::from(buf))
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        const MESSAGE: &str = "BlobHeader";

        let Some(header_len) = self.read_length_prefix()? else {
            return Ok(None);
        };
        if header_len > self.config.max_header_size {
            return Err(Error::FrameTooLarge {
                part: "blob header",
                size: header_len,
                max: self.config.max_header_size,
            });
        }

        let start = self.offset - 4;
        let header = self.read_bytes(header_len)?;

        let mut label = None;
        let mut datasize = 0;
        for field in iterate_fields(header) {
            let field = field?;
            match BlobHeaderField::from(field.number) {
                BlobHeaderField::Type => label = Some(field.into_bytes(MESSAGE)?),
                BlobHeaderField::DataSize => datasize = field.varint(MESSAGE)?,
                BlobHeaderField::IndexData => {}
                BlobHeaderField::Unknown(n) => UnknownFields::Skip.check(MESSAGE, n)?,
            }
        }
        let label = label.ok_or(Error::MissingField {
            message: MESSAGE,
            field: 1,
        })?;

        let body_len = usize::try_from(datasize)
            .ok()
            .filter(|&size| size <= self.config.max_blob_size)
            .ok_or(Error::FrameTooLarge {
                part: "blob",
                size: usize::try_from(datasize).unwrap_or(usize::MAX),
                max: self.config.max_blob_size,
            })?;

        let body = self.read_bytes(body_len)?;
        let payload = Blob::decode(body, &self.config)?.into_payload()?;

        debug!(
            "Frame '{}' at offset {}: {} byte body, {} byte payload",
            String::from_utf8_lossy(&label),
            start,
            body_len,
            payload.len()
        );

        Ok(Some(Frame { label, payload }))
    }
}

impl<R: Read> Iterator for Frames<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for Frames<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{self, compress, frame, raw_blob, zlib_blob};
    use pretty_assertions::assert_eq;
    use prost::Message;

    fn read_all(data: Vec<u8>) -> Vec<Result<Frame>> {
        read_frames(data.as_slice()).collect()
    }

    #[test]
    fn test_frame_config_builder() {
        let config = FrameConfig::new().max_header_size(128).max_blob_size(4096);
        assert_eq!(config.max_header_size, 128);
        assert_eq!(config.max_blob_size, 4096);
    }

    #[test]
    fn test_empty_stream() {
        assert!(read_all(Vec::new()).is_empty());
    }

    #[test]
    fn test_raw_and_zlib_frames() {
        let mut data = frame("OSMHeader", &raw_blob(b"header".to_vec()));
        data.extend(frame("OSMData", &zlib_blob(b"compressed payload")));
        data.extend(frame("Custom", &raw_blob(Vec::new())));

        let frames: Vec<Frame> = read_all(data).into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].kind(), FrameKind::Header);
        assert_eq!(frames[0].payload.as_ref(), b"header");
        assert_eq!(frames[1].kind(), FrameKind::Data);
        assert_eq!(frames[1].payload.as_ref(), b"compressed payload");
        assert_eq!(frames[2].kind(), FrameKind::Other("Custom".to_string()));
        assert!(frames[2].payload.is_empty());
    }

    #[test]
    fn test_zero_length_body() {
        let data = frame("OSMHeader", &testutil::Blob::default());
        let frames = read_all(data);
        assert!(frames[0].as_ref().unwrap().payload.is_empty());
    }

    #[test]
    fn test_partial_length_prefix() {
        let mut data = frame("OSMData", &raw_blob(b"x".to_vec()));
        data.extend([0x00, 0x00]);

        let frames = read_all(data);
        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_ok());
        assert!(matches!(frames[1], Err(Error::TruncatedInput { .. })));
    }

    #[test]
    fn test_truncated_at_every_length() {
        let data = frame("OSMData", &zlib_blob(b"some bytes worth compressing"));

        for cut in 1..data.len() {
            let frames = read_all(data[..cut].to_vec());
            assert_eq!(frames.len(), 1, "cut at {}", cut);
            assert!(
                matches!(frames[0], Err(Error::TruncatedInput { .. })),
                "cut at {}: {:?}",
                cut,
                frames[0]
            );
        }
    }

    #[test]
    fn test_size_mismatch() {
        let payload = b"exactly twenty bytes";
        for raw_size in [payload.len() - 1, payload.len() + 1] {
            let blob = testutil::Blob {
                raw_size: Some(raw_size as i32),
                zlib_data: Some(compress(payload)),
                ..Default::default()
            };
            let frames = read_all(frame("OSMData", &blob));
            assert!(
                matches!(frames[0], Err(Error::SizeMismatch { expected, .. }) if expected == raw_size),
                "{:?}",
                frames[0]
            );
        }
    }

    #[test]
    fn test_unsupported_encodings() {
        let blob = testutil::Blob {
            raw_size: Some(3),
            lzma_data: Some(vec![1, 2, 3]),
            ..Default::default()
        };
        let frames = read_all(frame("OSMData", &blob));
        assert!(matches!(
            &frames[0],
            Err(Error::UnsupportedEncoding { encoding }) if encoding == "lzma"
        ));

        // Only a raw size, no data
        let blob = testutil::Blob {
            raw_size: Some(3),
            ..Default::default()
        };
        let frames = read_all(frame("OSMData", &blob));
        assert!(matches!(frames[0], Err(Error::UnsupportedEncoding { .. })));
    }

    #[test]
    fn test_corrupt_zlib_stream() {
        let blob = testutil::Blob {
            raw_size: Some(4),
            zlib_data: Some(vec![0xDE, 0xAD, 0xBE, 0xEF]),
            ..Default::default()
        };
        let frames = read_all(frame("OSMData", &blob));
        assert!(matches!(frames[0], Err(Error::Decompress(_))));
    }

    #[test]
    fn test_frame_limits() {
        let data = frame("OSMData", &raw_blob(vec![0; 64]));

        let config = FrameConfig::new().max_header_size(2);
        let result: Vec<_> = Frames::with_config(data.as_slice(), config).collect();
        assert!(matches!(
            result[0],
            Err(Error::FrameTooLarge {
                part: "blob header",
                ..
            })
        ));

        let config = FrameConfig::new().max_blob_size(16);
        let result: Vec<_> = Frames::with_config(data.as_slice(), config).collect();
        assert!(matches!(
            result[0],
            Err(Error::FrameTooLarge { part: "blob", .. })
        ));
    }

    #[test]
    fn test_missing_type_label() {
        let body = raw_blob(b"x".to_vec()).encode_to_vec();
        let header = testutil::BlobHeader {
            r#type: String::new(),
            datasize: body.len() as i32,
        }
        .encode_to_vec();

        let mut data = (header.len() as u32).to_be_bytes().to_vec();
        data.extend(header);
        data.extend(body);

        let frames = read_all(data);
        assert!(matches!(
            frames[0],
            Err(Error::MissingField {
                message: "BlobHeader",
                field: 1
            })
        ));
    }
}
