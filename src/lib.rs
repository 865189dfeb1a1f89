//! Read-oriented FAT12/16/32 and ISO9660/Joliet directory and file engine,
//! operating over a raw 512-byte-sector read interface with minimal RAM
//! (spec §1).
//!
//! `no_std` by default (the target is an embedded storage controller);
//! build with `--no-default-features` for a hosted build, e.g. to run the
//! integration tests under `tests/` against an in-memory `SectorDevice`.

#![cfg_attr(all(feature = "no_std", not(test)), no_std)]

#[allow(unused_extern_crates)]
extern crate core; // keeps rust-analyzer looking into the standard library

#[macro_export]
macro_rules! using_std { ($($i:item)*) => ($(#[cfg(not(feature = "no_std"))]$i)*) }

pub mod config;
pub mod cursor;
pub mod entry;
pub mod error;
pub mod fat;
pub mod fs;
pub mod geometry;
pub mod iso;
pub mod navigator;
pub mod path;
pub mod seek;
pub mod storage;

pub use entry::{Attributes, Entry, EntryKind, Location, TypeFilter, TypeTag};
pub use error::Error;
pub use fs::{FileHandle, Filesystem};
pub use geometry::{FsType, Geometry};
pub use navigator::{Navigator, PlayTimeClock};
pub use seek::SeekMode;
pub use storage::{ReadError, SectorDevice, WriteError};
