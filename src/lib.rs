//! Core ROM model for Super Mario 64 editing tools.
//!
//! Loads an N64 ROM image in any of the three circulating byte orders,
//! normalizes it to the console's native big-endian order, classifies its
//! regional revision and build type, and exposes a segmented virtual memory
//! model over the image so that geometry, object tables and compressed
//! blobs can be addressed segment-relative instead of by raw file offset.
//!
//! One segment's window is not statically known: it is recovered by
//! scanning the game's own boot code for the allocation call that maps it
//! (see [`asm`]). Rendering, editing UI and settings persistence live in
//! other crates; everything here is the synchronous load pipeline
//! `bytes -> variant -> scan -> segments` and the read/write API over the
//! result.

#[macro_use]
extern crate lazy_static;

pub mod asm;
pub mod endian;
pub mod error;
pub mod levels;
pub mod mio0;
pub mod region;
pub mod rom;
pub mod segment;

pub use endian::Endianness;
pub use error::RomError;
pub use region::{BuildType, Region};
pub use rom::{Rom, RomEvent};
