//! Error types for the pbfgrep-core library.
//!
//! Every decoding step reports failures through [`Error`]. Structural errors
//! are fatal for the whole stream; [`Error::GroupCorrupt`] is scoped to one
//! primitive group and the caller may keep reading past it.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pbfgrep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all decoding operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to open the input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to open
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Reading from the input stream failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input ended in the middle of a field or frame
    #[error("input truncated at offset {offset}")]
    TruncatedInput {
        /// Byte offset at which more input was expected
        offset: usize,
    },

    /// Varint does not fit in 64 bits, or a delta sum left the i64 range
    #[error("integer overflow at offset {offset}")]
    Overflow {
        /// Byte offset where the value starts
        offset: usize,
    },

    /// Invalid field number in a tag
    #[error("invalid field number {number}: must be between 1 and {max}")]
    InvalidFieldNumber {
        /// The invalid field number
        number: u64,
        /// Maximum valid field number
        max: u32,
    },

    /// Field uses a wire type this decoder does not read
    #[error("unsupported wire type {wire_type} for field {field}")]
    UnsupportedWireType {
        /// Field number from the tag
        field: u64,
        /// Raw wire type bits
        wire_type: u8,
    },

    /// Frame body uses a compression scheme this decoder does not implement
    #[error("unsupported blob encoding: {encoding}")]
    UnsupportedEncoding {
        /// Name of the encoding found in the body
        encoding: String,
    },

    /// Decompressed payload length differs from the declared raw size
    #[error("decompressed size mismatch: declared {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Declared raw size
        expected: usize,
        /// Bytes actually produced (capped at `expected + 1`)
        actual: usize,
    },

    /// A field runs past the end of its enclosing message
    #[error("field at offset {offset} overruns its {declared}-byte message")]
    FrameSizeMismatch {
        /// Declared length of the enclosing message
        declared: usize,
        /// Offset of the offending field within the message
        offset: usize,
    },

    /// Frame header or body exceeds the configured limit
    #[error("{part} of {size} bytes exceeds the limit of {max} bytes")]
    FrameTooLarge {
        /// Which part of the frame was too large
        part: &'static str,
        /// Declared size
        size: usize,
        /// Configured limit
        max: usize,
    },

    /// The zlib stream inside a frame body is corrupt
    #[error("failed to inflate blob: {0}")]
    Decompress(#[source] std::io::Error),

    /// A required field is absent
    #[error("{message} is missing required field {field}")]
    MissingField {
        /// Message being decoded
        message: &'static str,
        /// Field number
        field: u32,
    },

    /// A field number not allowed in this message
    #[error("unexpected field {field} in {message}")]
    UnexpectedField {
        /// Message being decoded
        message: &'static str,
        /// Field number
        field: u32,
    },

    /// A known field was encoded with the wrong wire type
    #[error("field {field} of {message} has the wrong wire type")]
    UnexpectedFieldType {
        /// Message being decoded
        message: &'static str,
        /// Field number
        field: u32,
    },

    /// A string field is not valid UTF-8
    #[error("{message} contains invalid UTF-8: {source}")]
    InvalidString {
        /// Message being decoded
        message: &'static str,
        /// Underlying conversion error
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// A primitive group is internally inconsistent
    #[error("corrupt primitive group: {details}")]
    GroupCorrupt {
        /// Description of the inconsistency
        details: String,
    },
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new truncation error
    pub fn truncated(offset: usize) -> Self {
        Self::TruncatedInput { offset }
    }

    /// Creates a new unsupported encoding error
    pub fn unsupported_encoding(encoding: impl Into<String>) -> Self {
        Self::UnsupportedEncoding {
            encoding: encoding.into(),
        }
    }

    /// Creates a new corrupt group error
    pub fn group_corrupt(details: impl Into<String>) -> Self {
        Self::GroupCorrupt {
            details: details.into(),
        }
    }

    /// Returns true if decoding can continue with the next group
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::GroupCorrupt { .. })
    }
}
