//! The virtual segmented memory model over a loaded image.
//!
//! Game pointers are segment-relative: the top byte of a 32-bit address
//! selects one of 32 segments and the low 24 bits are an offset inside it.
//! Each populated segment holds either a raw copy of a file byte range
//! (which keeps a stable mapping back to absolute file offsets) or the
//! decompressed contents of a MIO0 block (which does not — compressed
//! segments can only be read segment-relative).

use crate::error::RomError;
use crate::mio0;
use log::warn;

/// Number of segment slots. Index 0 is reserved: a zero segment byte in a
/// game pointer means "no segment" and is never populated.
pub const SEGMENT_COUNT: usize = 0x20;

/// Storage behind one populated segment slot.
#[derive(Debug, Clone)]
enum SegmentData {
    /// Copy of `image[file_start..file_end]`; addresses inside it resolve
    /// back to absolute file offsets.
    Raw { file_start: u32, data: Vec<u8> },
    /// Output of the MIO0 decoder; no file-offset correspondence.
    Decoded { data: Vec<u8> },
}

impl SegmentData {
    fn bytes(&self) -> &[u8] {
        match self {
            SegmentData::Raw { data, .. } => data,
            SegmentData::Decoded { data } => data,
        }
    }
}

/// The 32-slot segment table. Created empty at image load, populated by
/// region setup and the boot-code scan, and replaced wholesale when a new
/// image is loaded.
#[derive(Debug, Default)]
pub struct SegmentTable {
    slots: [Option<SegmentData>; SEGMENT_COUNT],
}

impl SegmentTable {
    pub fn new() -> Self {
        SegmentTable::default()
    }

    /// Map `image[start..end]` into a segment slot.
    ///
    /// With `compressed` set, the range is decoded as one MIO0 block and
    /// the segment holds the output; a corrupt block propagates as
    /// [`RomError::CorruptBlock`] and leaves the slot unset. An inverted
    /// window (`start > end`) is a silent no-op so that callers may probe
    /// speculative windows, and so is an out-of-range window against a
    /// short image.
    pub fn set_segment(
        &mut self,
        index: u8,
        image: &[u8],
        start: u32,
        end: u32,
        compressed: bool,
    ) -> Result<(), RomError> {
        let index = index as usize;
        // Slot 0 means "no segment" in game pointers and stays empty, and
        // an index past the table maps nothing rather than aliasing onto a
        // low slot.
        if index == 0 || index >= SEGMENT_COUNT || start > end {
            return Ok(());
        }
        let range = match image.get(start as usize..end as usize) {
            Some(r) => r,
            None => {
                warn!(
                    "segment {:#04x} window {:#x}..{:#x} is outside the image, skipping",
                    index, start, end
                );
                return Ok(());
            }
        };

        self.slots[index] = Some(if compressed {
            SegmentData::Decoded {
                data: mio0::decode(range)?,
            }
        } else {
            SegmentData::Raw {
                file_start: start,
                data: range.to_vec(),
            }
        });
        Ok(())
    }

    /// Drop every mapping. Used when a new image replaces the current one.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }

    fn slot(&self, segment: u8) -> Option<&SegmentData> {
        self.slots.get(segment as usize).and_then(Option::as_ref)
    }

    /// Whether a slot holds decompressed data.
    pub fn is_compressed(&self, segment: u8) -> bool {
        matches!(self.slot(segment), Some(SegmentData::Decoded { .. }))
    }

    /// Whether a slot is populated at all.
    pub fn is_mapped(&self, segment: u8) -> bool {
        self.slot(segment).is_some()
    }

    /// The materialized contents of a segment.
    pub fn segment_bytes(&self, segment: u8) -> Result<&[u8], RomError> {
        self.slot(segment)
            .map(SegmentData::bytes)
            .ok_or(RomError::UnmappedSegment(segment))
    }

    /// Resolve a segment-relative address (segment byte in the top 8 bits,
    /// offset in the low 24) to an absolute file offset.
    ///
    /// Only raw segments have a file mapping; a compressed segment fails
    /// with [`RomError::SegmentIsCompressed`].
    pub fn resolve(&self, segment_address: u32) -> Result<u32, RomError> {
        self.resolve_offset((segment_address >> 24) as u8, segment_address & 0x00FF_FFFF)
    }

    /// As [`resolve`](Self::resolve), with segment and offset already split.
    pub fn resolve_offset(&self, segment: u8, offset: u32) -> Result<u32, RomError> {
        match self.slot(segment) {
            None => Err(RomError::UnmappedSegment(segment)),
            Some(SegmentData::Decoded { .. }) => Err(RomError::SegmentIsCompressed(segment)),
            Some(SegmentData::Raw { file_start, .. }) => Ok(file_start + offset),
        }
    }

    /// Read `size` bytes at a segment-relative address, zero-filling
    /// anything past the end of the segment's data. Level and object data
    /// routinely probe speculative addresses; this read path degrades to
    /// zeros instead of failing.
    pub fn read_range(&self, segment_address: u32, size: u32) -> Vec<u8> {
        let segment = (segment_address >> 24) as u8;
        let offset = (segment_address & 0x00FF_FFFF) as usize;
        let mut out = vec![0u8; size as usize];
        if let Ok(bytes) = self.segment_bytes(segment) {
            for (i, slot) in out.iter_mut().enumerate() {
                if let Some(b) = bytes.get(offset + i) {
                    *slot = *b;
                }
            }
        }
        out
    }
}
