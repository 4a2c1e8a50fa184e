//! The loaded ROM image and everything derived from it.
//!
//! [`Rom`] owns the normalized byte buffer, the facts classified from it
//! (byte order, region, build type) and the segment table built over it.
//! One value represents one loaded image; loading a different file replaces
//! the whole aggregate rather than mutating it piecewise. There is no
//! process-wide instance: whoever loads the ROM owns it and passes it on.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::asm;
use crate::endian::{self, Endianness};
use crate::error::RomError;
use crate::mio0;
use crate::region::{self, BuildType, Region, RegionConstants};
use crate::segment::SegmentTable;

/// Segment populated by the boot-code scan.
pub const SEG_DYNAMIC: u8 = 0x02;
/// Segment with a statically known per-region window.
pub const SEG_STATIC: u8 = 0x15;

/// Notifications for the settings collaborator: the core reports final file
/// paths, it does not persist anything itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RomEvent {
    Loaded(PathBuf),
    Saved(PathBuf),
}

type EventHook = Box<dyn FnMut(&RomEvent)>;

/// A loaded, normalized ROM image with its segment table.
pub struct Rom {
    bytes: Vec<u8>,
    path: PathBuf,
    endianness: Endianness,
    region: Region,
    build_type: BuildType,
    segments: SegmentTable,
    dirty: bool,
    event_hook: Option<EventHook>,
}

impl fmt::Debug for Rom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rom")
            .field("path", &self.path)
            .field("len", &self.bytes.len())
            .field("endianness", &self.endianness)
            .field("region", &self.region)
            .field("build_type", &self.build_type)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Rom {
    /// Load an image from disk: read the whole file, normalize its byte
    /// order, classify it and populate the segment table.
    pub fn load(path: impl AsRef<Path>) -> Result<Rom, RomError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| RomError::file(path, e))?;
        Rom::from_bytes(bytes, path)
    }

    /// As [`load`](Self::load), from an already-read buffer. This is the
    /// whole load pipeline: normalization runs exactly once, before any
    /// classification or address resolution.
    pub fn from_bytes(mut bytes: Vec<u8>, path: impl Into<PathBuf>) -> Result<Rom, RomError> {
        let endianness = Endianness::detect(&bytes);
        endian::normalize(&mut bytes, endianness);
        if bytes.len() % 4 != 0 {
            warn!(
                "image length {:#x} is not word-aligned, padding with zeros",
                bytes.len()
            );
            bytes.resize(bytes.len().next_multiple_of(4), 0);
        }

        let region = region::classify(&bytes);
        let constants = region::constants(region);
        let marker = bytes.get(constants.seg15_window.0 as usize).copied();
        let build_type = if marker == Some(region::EXTENDED_MARKER) {
            BuildType::Extended
        } else {
            BuildType::Vanilla
        };

        let mut rom = Rom {
            bytes,
            path: path.into(),
            endianness,
            region,
            build_type,
            segments: SegmentTable::new(),
            dirty: false,
            event_hook: None,
        };
        rom.setup_segments();

        info!("ROM = {}", rom.path.display());
        info!("ROM internal name = {}", rom.internal_name());
        info!("ROM endian = {}", rom.endianness.as_text());
        info!("ROM region = {}", rom.region.as_text());
        info!("ROM type = {}", rom.build_type.as_text());
        Ok(rom)
    }

    /// Replace this ROM wholesale with a freshly loaded image, keeping the
    /// registered event hook, and notify it.
    pub fn reload_from(&mut self, path: impl AsRef<Path>) -> Result<(), RomError> {
        let fresh = Rom::load(path)?;
        let hook = self.event_hook.take();
        *self = fresh;
        self.event_hook = hook;
        let event = RomEvent::Loaded(self.path.clone());
        self.notify(&event);
        Ok(())
    }

    /// Register the notification callback for load/save events.
    pub fn set_event_hook(&mut self, hook: EventHook) {
        self.event_hook = Some(hook);
    }

    fn notify(&mut self, event: &RomEvent) {
        if let Some(hook) = self.event_hook.as_mut() {
            hook(event);
        }
    }

    // --- facts -----------------------------------------------------------

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn build_type(&self) -> BuildType {
        self.build_type
    }

    pub fn constants(&self) -> &'static RegionConstants {
        region::constants(self.region)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The 20-character internal name from the header, for diagnostics.
    /// The field is padded out with NULs and spaces; both are stripped.
    /// Reads safely: a short image yields a short name.
    pub fn internal_name(&self) -> String {
        let start = region::INTERNAL_NAME_OFFSET as usize;
        let end = start + region::INTERNAL_NAME_LEN as usize;
        let field = self
            .bytes
            .get(start..end.min(self.bytes.len()))
            .unwrap_or(&[]);
        String::from_utf8_lossy(field)
            .trim_end_matches(['\0', ' '])
            .to_string()
    }

    // --- byte accessors --------------------------------------------------

    fn check_range(&self, offset: u32, width: u32) -> Result<usize, RomError> {
        let end = offset as usize + width as usize;
        if end > self.bytes.len() {
            return Err(RomError::OutOfRange {
                offset,
                width,
                len: self.bytes.len(),
            });
        }
        Ok(offset as usize)
    }

    pub fn read_byte(&self, offset: u32) -> Result<u8, RomError> {
        let i = self.check_range(offset, 1)?;
        Ok(self.bytes[i])
    }

    pub fn read_halfword(&self, offset: u32) -> Result<i16, RomError> {
        Ok(self.read_halfword_unsigned(offset)? as i16)
    }

    pub fn read_halfword_unsigned(&self, offset: u32) -> Result<u16, RomError> {
        let i = self.check_range(offset, 2)?;
        Ok(u16::from_be_bytes([self.bytes[i], self.bytes[i + 1]]))
    }

    pub fn read_word(&self, offset: u32) -> Result<i32, RomError> {
        Ok(self.read_word_unsigned(offset)? as i32)
    }

    pub fn read_word_unsigned(&self, offset: u32) -> Result<u32, RomError> {
        let i = self.check_range(offset, 4)?;
        Ok(u32::from_be_bytes([
            self.bytes[i],
            self.bytes[i + 1],
            self.bytes[i + 2],
            self.bytes[i + 3],
        ]))
    }

    pub fn write_byte(&mut self, offset: u32, value: u8) -> Result<(), RomError> {
        let i = self.check_range(offset, 1)?;
        self.bytes[i] = value;
        self.dirty = true;
        Ok(())
    }

    pub fn write_halfword(&mut self, offset: u32, value: u16) -> Result<(), RomError> {
        let i = self.check_range(offset, 2)?;
        self.bytes[i..i + 2].copy_from_slice(&value.to_be_bytes());
        self.dirty = true;
        Ok(())
    }

    pub fn write_word(&mut self, offset: u32, value: u32) -> Result<(), RomError> {
        let i = self.check_range(offset, 4)?;
        self.bytes[i..i + 4].copy_from_slice(&value.to_be_bytes());
        self.dirty = true;
        Ok(())
    }

    // --- save ------------------------------------------------------------

    /// Write the image back to its own path in the byte order it was
    /// loaded in.
    pub fn save(&mut self) -> Result<(), RomError> {
        self.save_as_inner(self.path.clone(), self.endianness)
    }

    /// Write the image to `path` in the requested on-disk order, which
    /// becomes the ROM's order for subsequent saves.
    pub fn save_as(
        &mut self,
        path: impl Into<PathBuf>,
        order: Endianness,
    ) -> Result<(), RomError> {
        self.save_as_inner(path.into(), order)
    }

    fn save_as_inner(&mut self, path: PathBuf, order: Endianness) -> Result<(), RomError> {
        // The transforms are self-inverse: denormalize, write, restore.
        // In-memory order is restored even when the write fails; the
        // on-disk state of a failed write is undefined and fatal for this
        // operation.
        endian::normalize(&mut self.bytes, order);
        let result = fs::write(&path, &self.bytes);
        endian::normalize(&mut self.bytes, order);
        result.map_err(|e| RomError::file(&path, e))?;

        self.endianness = order;
        self.path = path;
        self.dirty = false;
        let event = RomEvent::Saved(self.path.clone());
        self.notify(&event);
        Ok(())
    }

    // --- segments --------------------------------------------------------

    /// Populate the segment table from the region constants and the
    /// boot-code scan. Failures here are never fatal: a segment that cannot
    /// be mapped stays unset and dependent reads surface
    /// [`RomError::UnmappedSegment`].
    pub fn setup_segments(&mut self) {
        let constants = region::constants(self.region);

        let (start, end) = match self.find_dynamic_segment(constants) {
            Some(window) => window,
            None => {
                warn!(
                    "segment {:#04x} not found in boot code, using the static {} window",
                    SEG_DYNAMIC,
                    constants.region.as_text()
                );
                constants.seg02_default_window
            }
        };
        info!("segment {:#04x} window: {:#010x}..{:#010x}", SEG_DYNAMIC, start, end);
        let compressed = self
            .read_word_unsigned(start)
            .map(|magic| magic == mio0::MAGIC)
            .unwrap_or(false);
        if let Err(e) = self
            .segments
            .set_segment(SEG_DYNAMIC, &self.bytes, start, end, compressed)
        {
            warn!("segment {:#04x} left unmapped: {}", SEG_DYNAMIC, e);
        }

        let (start, end) = constants.seg15_window;
        let compressed = self.build_type == BuildType::Vanilla;
        if let Err(e) = self
            .segments
            .set_segment(SEG_STATIC, &self.bytes, start, end, compressed)
        {
            warn!("segment {:#04x} left unmapped: {}", SEG_STATIC, e);
        }
    }

    /// Scan the region's segment-init function for the allocation call that
    /// maps the dynamic segment, and recover its window from the call's
    /// second and third arguments.
    fn find_dynamic_segment(&self, constants: &RegionConstants) -> Option<(u32, u32)> {
        let calls =
            match asm::find_calls_in_function(&self.bytes, constants.seg02_init, constants.ram_to_rom) {
                Ok(calls) => calls,
                Err(e) => {
                    warn!("boot code scan failed: {}", e);
                    return None;
                }
            };

        calls.iter().find_map(|call| {
            if call.target != constants.seg02_alloc || call.args[0] != Some(SEG_DYNAMIC as u32) {
                return None;
            }
            let (start, end) = (call.args[1]?, call.args[2]?);
            // The allocator takes physical cartridge offsets; a KSEG0
            // pointer or inverted window means the capture is unreliable.
            if start >= 0x8000_0000 || start >= end || end as usize > self.bytes.len() {
                warn!(
                    "discarding implausible segment window {:#010x}..{:#010x}",
                    start, end
                );
                return None;
            }
            Some((start, end))
        })
    }

    /// Map a file byte range into a segment slot; see
    /// [`SegmentTable::set_segment`].
    pub fn set_segment(
        &mut self,
        index: u8,
        start: u32,
        end: u32,
        compressed: bool,
    ) -> Result<(), RomError> {
        self.segments.set_segment(index, &self.bytes, start, end, compressed)
    }

    pub fn segments(&self) -> &SegmentTable {
        &self.segments
    }

    /// Resolve a segment-relative address to an absolute file offset.
    pub fn resolve(&self, segment_address: u32) -> Result<u32, RomError> {
        self.segments.resolve(segment_address)
    }

    /// Zero-fill-on-overrun read at a segment-relative address.
    pub fn read_range(&self, segment_address: u32, size: u32) -> Vec<u8> {
        self.segments.read_range(segment_address, size)
    }

    pub fn is_segment_compressed(&self, segment: u8) -> bool {
        self.segments.is_compressed(segment)
    }
}
