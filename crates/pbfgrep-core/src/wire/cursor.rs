//! Byte cursor shared by the wire readers.

use bytes::Bytes;

/// Forward-only read position over an immutable byte buffer.
///
/// Length-delimited reads hand out zero-copy slices of the underlying
/// [`Bytes`], so decoded fields can outlive the cursor.
#[derive(Debug, Clone)]
pub struct Cursor {
    buf: Bytes,
    pos: usize,
}

impl Cursor {
    /// Creates a cursor positioned at the start of `buf`
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self {
            buf: buf.into(),
            pos: 0,
        }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total length of the underlying buffer
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Returns true once every byte has been consumed
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn next_byte(&mut self) -> Option<u8> {
        let byte = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    /// Takes exactly `len` bytes, or nothing if fewer remain.
    pub(crate) fn take(&mut self, len: usize) -> Option<Bytes> {
        if len > self.remaining() {
            return None;
        }
        let slice = self.buf.slice(self.pos..self.pos + len);
        self.pos += len;
        Some(slice)
    }
}
