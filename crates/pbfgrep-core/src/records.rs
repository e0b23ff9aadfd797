//! Flat, lazy stream of point records across a whole file.

use crate::block::{DataBlock, HeaderBlock, PointRecord};
use crate::error::{Error, Result};
use crate::frame::{Frame, FrameConfig, FrameKind, Frames};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Iterator over every node in a PBF stream.
///
/// Frames are read only when the records of the previous one are exhausted,
/// so dropping the iterator early leaves the rest of the stream unread.
/// A corrupt group yields one [`Error::GroupCorrupt`] in place of its records
/// and iteration may continue; any other error ends the stream.
#[derive(Debug)]
pub struct Records<R> {
    frames: Frames<R>,
    pending: VecDeque<Result<PointRecord>>,
    header: Option<HeaderBlock>,
    finished: bool,
}

impl<R: Read> Records<R> {
    /// Creates a record iterator with default frame limits
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, FrameConfig::default())
    }

    /// Creates a record iterator with custom frame limits
    pub fn with_config(reader: R, config: FrameConfig) -> Self {
        Self {
            frames: Frames::with_config(reader, config),
            pending: VecDeque::new(),
            header: None,
            finished: false,
        }
    }

    /// The most recent header block seen so far
    pub fn header(&self) -> Option<&HeaderBlock> {
        self.header.as_ref()
    }

    /// Bytes consumed from the underlying stream
    pub fn offset(&self) -> usize {
        self.frames.offset()
    }

    fn load(&mut self, frame: Frame) -> Result<()> {
        match frame.kind() {
            FrameKind::Header => {
                let header = HeaderBlock::decode(frame.payload)?;
                let unsupported = header.unsupported_features();
                if !unsupported.is_empty() {
                    warn!("File requires unsupported features: {:?}", unsupported);
                }
                debug!("Header block: {:?}", header);
                self.header = Some(header);
            }
            FrameKind::Data => {
                let block = DataBlock::decode(frame.payload)?;
                for group in block.groups {
                    match group {
                        Ok(group) => self.pending.extend(group.records.into_iter().map(Ok)),
                        Err(e) => self.pending.push_back(Err(e)),
                    }
                }
            }
            FrameKind::Other(label) => debug!("Skipping frame '{}'", label),
        }
        Ok(())
    }
}

impl<R: Read> Iterator for Records<R> {
    type Item = Result<PointRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            if self.finished {
                return None;
            }

            let loaded = match self.frames.next() {
                Some(Ok(frame)) => self.load(frame),
                Some(Err(e)) => Err(e),
                None => {
                    self.finished = true;
                    continue;
                }
            };

            if let Err(e) = loaded {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for Records<R> {}

/// Opens a PBF file for sequential reading.
pub fn open(path: impl AsRef<Path>) -> Result<Records<BufReader<File>>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::file_read(path, e))?;
    Ok(Records::new(BufReader::new(file)))
}
