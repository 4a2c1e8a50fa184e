//! Regional revision classification and the per-region constant table.
//!
//! The four retail revisions of the game place their fixed lookup tables and
//! boot code at different file offsets and RAM addresses. Everything that
//! varies by region lives in one [`RegionConstants`] row so that address
//! resolution never depends on scattered globals; adding a region is a data
//! change.

use log::warn;

/// Regional revision of a ROM image, read from the header region byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Japan,
    JapanShindou,
    NorthAmerica,
    Europe,
}

impl Region {
    pub fn as_text(&self) -> &'static str {
        match self {
            Region::NorthAmerica => "North America",
            Region::Europe => "Europe",
            Region::Japan => "Japan",
            Region::JapanShindou => "Japan (Shindou edition)",
        }
    }
}

/// Whether the image is an 8MB retail build (segments stored MIO0
/// compressed) or an extended build with segments already decompressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildType {
    Vanilla,
    Extended,
}

impl BuildType {
    pub fn as_text(&self) -> &'static str {
        match self {
            BuildType::Vanilla => "Vanilla (compressed)",
            BuildType::Extended => "Extended (decompressed)",
        }
    }
}

/// File offset of the header byte that identifies the region.
pub const REGION_BYTE_OFFSET: usize = 0x3E;
/// File offset of the revision byte distinguishing the two Japanese builds.
pub const REVISION_BYTE_OFFSET: usize = 0x3F;
/// File offsets of the 20-byte internal name field.
pub const INTERNAL_NAME_OFFSET: u32 = 0x20;
pub const INTERNAL_NAME_LEN: u32 = 20;

/// Marker byte at the start of the segment 0x15 window that identifies an
/// extended (decompressed) build.
pub const EXTENDED_MARKER: u8 = 0x17;

/// Everything about a region that the loader and the segment setup need:
/// fixed table offsets, the segment 0x15 static window, and the addresses
/// driving the segment 0x02 boot-code scan.
#[derive(Debug, Clone, Copy)]
pub struct RegionConstants {
    pub region: Region,
    /// File offset of the macro-object preset table.
    pub macro_preset_table: u32,
    /// File offset of the special-object preset table.
    pub special_preset_table: u32,
    /// Static file window of segment 0x15 (start, end).
    pub seg15_window: (u32, u32),
    /// RAM address of the function that initializes segment 0x02 at boot.
    pub seg02_init: u32,
    /// RAM address of the allocation routine that init function calls to
    /// map segment 0x02.
    pub seg02_alloc: u32,
    /// RAM-to-file base for this region's code segment: code at RAM address
    /// `a` sits at file offset `a - ram_to_rom`.
    pub ram_to_rom: u32,
    /// Fallback file window for segment 0x02 if the boot-code scan comes up
    /// empty. Only the North American vanilla values are known good; for
    /// other regions the scan is expected to succeed.
    pub seg02_default_window: (u32, u32),
}

const NORTH_AMERICA: RegionConstants = RegionConstants {
    region: Region::NorthAmerica,
    macro_preset_table: 0xEC7E0,
    special_preset_table: 0xED350,
    seg15_window: (0x2ABCA0, 0x2AC6B0),
    seg02_init: 0x8024_8964,
    seg02_alloc: 0x8027_87D8,
    ram_to_rom: 0x8024_5000,
    seg02_default_window: (0x108A40, 0x114750),
};

const EUROPE: RegionConstants = RegionConstants {
    region: Region::Europe,
    macro_preset_table: 0xBD590,
    special_preset_table: 0xBE100,
    seg15_window: (0x28CEE0, 0x28D8F0),
    seg02_init: 0x8024_4100,
    seg02_alloc: 0x8026_9994,
    ram_to_rom: 0x8024_0800,
    seg02_default_window: (0xDE190, 0xE49F0),
};

const JAPAN: RegionConstants = RegionConstants {
    region: Region::Japan,
    macro_preset_table: 0xEB6D0,
    special_preset_table: 0xEC240,
    seg15_window: (0x2AA240, 0x2AAC50),
    seg02_init: 0x8024_8934,
    seg02_alloc: 0x8027_8228,
    ram_to_rom: 0x8024_5000,
    seg02_default_window: (0x1076D0, 0x112B50),
};

const JAPAN_SHINDOU: RegionConstants = RegionConstants {
    region: Region::JapanShindou,
    macro_preset_table: 0xC8D60,
    special_preset_table: 0xC98D0,
    seg15_window: (0x286AC0, 0x2874D0),
    seg02_init: 0x8024_B958,
    seg02_alloc: 0x8027_1EF4,
    ram_to_rom: 0x8024_8000,
    seg02_default_window: (0xE42F0, 0xEF770),
};

/// Look up the constant row for a region.
pub fn constants(region: Region) -> &'static RegionConstants {
    match region {
        Region::NorthAmerica => &NORTH_AMERICA,
        Region::Europe => &EUROPE,
        Region::Japan => &JAPAN,
        Region::JapanShindou => &JAPAN_SHINDOU,
    }
}

/// Classify the region from the normalized header bytes.
///
/// `0x45` is North America, `0x50` Europe, `0x4A` Japan with the revision
/// byte splitting the original release (`< 3`) from the Shindou edition
/// (`>= 3`). An unrecognized byte is never fatal: the most common region is
/// assumed so the image can still be inspected, with addresses possibly off.
pub fn classify(bytes: &[u8]) -> Region {
    let region_byte = bytes.get(REGION_BYTE_OFFSET).copied().unwrap_or(0);
    match region_byte {
        0x45 => Region::NorthAmerica,
        0x50 => Region::Europe,
        0x4A => {
            let revision = bytes.get(REVISION_BYTE_OFFSET).copied().unwrap_or(0);
            if revision < 3 {
                Region::Japan
            } else {
                Region::JapanShindou
            }
        }
        other => {
            warn!(
                "unrecognized region byte {:#04x} at offset {:#x}, assuming North America",
                other, REGION_BYTE_OFFSET
            );
            Region::NorthAmerica
        }
    }
}
