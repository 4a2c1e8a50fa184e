use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by ROM loading, the byte accessors, the call-site
/// scanner and the segment table.
#[derive(Error, Debug)]
pub enum RomError {
    /// Reading or writing the ROM file failed. Fatal for that operation.
    #[error("i/o error on {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A byte-store access ran past the end of the image. Indicates a
    /// caller bug or a truncated image.
    #[error("read/write of {width} bytes at {offset:#010x} out of range (image is {len:#x} bytes)")]
    OutOfRange { offset: u32, width: u32, len: usize },

    /// The scanner was pointed at an address outside the image or not on
    /// an instruction boundary.
    #[error("invalid scan region: file offset {offset:#010x} (image is {len:#x} bytes)")]
    InvalidScanRegion { offset: u32, len: usize },

    /// A compressed block did not carry the expected magic or its streams
    /// ran out early.
    #[error("corrupt MIO0 block: {0}")]
    CorruptBlock(String),

    /// Address resolution against a segment that was never populated.
    #[error("segment {0:#04x} is not mapped")]
    UnmappedSegment(u8),

    /// A raw file-offset mapping was requested for a segment holding
    /// decompressed data, which has no stable file correspondence.
    #[error("segment {0:#04x} holds decompressed data and has no file mapping")]
    SegmentIsCompressed(u8),
}

impl RomError {
    pub(crate) fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        RomError::File {
            path: path.into(),
            source,
        }
    }
}
