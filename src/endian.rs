//! On-disk byte-order detection and normalization.
//!
//! N64 images circulate in three byte orders, conventionally tagged by file
//! extension: .z64 (big-endian, the console's native order), .v64 ("mixed",
//! every adjacent byte pair swapped) and .n64 (little-endian, every 4-byte
//! word reversed). All in-memory reads and writes in this crate assume the
//! buffer has been normalized to big-endian; the same transforms are applied
//! in reverse when saving back to a non-native order. Both transforms are
//! their own inverse.

use log::warn;

/// Byte order of a ROM image as found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    /// .z64 — the console's native order. No transform needed.
    Big,
    /// .v64 — adjacent byte pairs swapped.
    Mixed,
    /// .n64 — each 4-byte word reversed.
    Little,
}

impl Endianness {
    /// Classify an image from its first two bytes (the start of the ROM
    /// header magic). Unrecognized leading bytes classify as big-endian so
    /// that an unusual image can still be inspected.
    pub fn detect(bytes: &[u8]) -> Endianness {
        match (bytes.first(), bytes.get(1)) {
            (Some(0x80), Some(0x37)) => Endianness::Big,
            (Some(0x37), Some(0x80)) => Endianness::Mixed,
            (Some(0x40), Some(0x12)) => Endianness::Little,
            (a, b) => {
                warn!(
                    "unrecognized leading bytes {:02x?} {:02x?}, assuming big-endian",
                    a, b
                );
                Endianness::Big
            }
        }
    }

    pub fn as_text(&self) -> &'static str {
        match self {
            Endianness::Big => "Big Endian",
            Endianness::Mixed => "Middle Endian",
            Endianness::Little => "Little Endian",
        }
    }
}

/// Swap every adjacent byte pair in place. Converts between mixed (.v64)
/// and big-endian order; self-inverse.
pub fn swap_mixed(bytes: &mut [u8]) {
    for pair in bytes.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
}

/// Reverse every aligned 4-byte word in place. Converts between
/// little-endian (.n64) and big-endian order; self-inverse.
pub fn swap_little(bytes: &mut [u8]) {
    for word in bytes.chunks_exact_mut(4) {
        word.swap(0, 3);
        word.swap(1, 2);
    }
}

/// Apply the transform that takes a buffer in `order` to big-endian, or
/// equivalently (both transforms are self-inverse) takes a big-endian
/// buffer back to `order`.
pub fn normalize(bytes: &mut [u8], order: Endianness) {
    match order {
        Endianness::Big => {}
        Endianness::Mixed => swap_mixed(bytes),
        Endianness::Little => swap_little(bytes),
    }
}
