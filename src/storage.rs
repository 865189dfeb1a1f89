//! The sector device contract (spec §6).
//!
//! Generalizes the teacher's `Storage` trait. The teacher pulled the trait
//! itself in from a private git dependency (`storage-traits`) and kept this
//! file as a disconnected sketch (`lib.rs` never declared `mod storage;`,
//! and `erase()`'s default impl doesn't even parse). That dependency isn't
//! fetchable from a registry, so the trait is defined here instead, keeping
//! the teacher's `GenericArray<u8, SECTOR_SIZE>` buffer shape and its
//! `ReadError`/`WriteError` split. Only the read path is required; spec §1
//! marks writes and erasure out of scope for this engine.

use core::fmt::Debug;

use generic_array::{ArrayLength, GenericArray};
use typenum::marker_traits::Unsigned;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ReadError<T> {
    /// `read_bytes`/`read_sector` requested an offset past the end of the
    /// device. The offset (in bytes) is given, not the sector index.
    OutOfRange { requested_offset: usize },
    Other(T),
}

impl<T> From<T> for ReadError<T> {
    fn from(other: T) -> Self {
        ReadError::Other(other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum WriteError<T> {
    OutOfRange { requested_offset: usize },
    Other(T),
}

impl<T> From<T> for WriteError<T> {
    fn from(other: T) -> Self {
        WriteError::Other(other)
    }
}

crate::using_std! {
    use core::fmt;

    macro_rules! display_using_debug {
        ($ty:ty) => {
            impl<T: fmt::Debug> fmt::Display for $ty<T> {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    fmt::Debug::fmt(self, f)
                }
            }
        };
    }

    macro_rules! err {
        ($ty:ty) => {
            display_using_debug!($ty);
            impl<T: fmt::Debug> std::error::Error for $ty<T> {}
        };
    }

    err!(ReadError);
    err!(WriteError);
}

/// Implementors give access to a raw, partition-relative, 512-byte-sector
/// storage medium. Sector index `0` is the first sector of the partition
/// (or of the whole medium, for an unpartitioned image).
pub trait SectorDevice {
    #[allow(non_camel_case_types)]
    type SECTOR_SIZE: ArrayLength<u8>;

    type ReadErr: Debug;
    type WriteErr: Debug;

    /// Reads an arbitrary byte range. There is no guarantee the requested
    /// range is sector-aligned or smaller than a sector.
    fn read_bytes(
        &mut self,
        offset: usize,
        buffer: &mut [u8],
    ) -> Result<(), ReadError<Self::ReadErr>>;

    /// Reads one whole sector. The default implementation just calls
    /// `read_bytes`; implementations that can do better for their medium
    /// should override it.
    #[inline]
    fn read_sector(
        &mut self,
        sector_idx: usize,
        buffer: &mut GenericArray<u8, Self::SECTOR_SIZE>,
    ) -> Result<(), ReadError<Self::ReadErr>> {
        self.read_bytes(sector_idx * Self::SECTOR_SIZE::to_usize(), buffer.as_mut_slice())
    }

    /// Writes one whole sector. Not required by this crate's read-only
    /// core (spec §1 non-goals); implementors that don't support writes can
    /// return an error from every call.
    fn write_sector(
        &mut self,
        sector_idx: usize,
        buffer: &GenericArray<u8, Self::SECTOR_SIZE>,
    ) -> Result<(), WriteError<Self::WriteErr>>;

    /// Number of sectors in the partition.
    fn sector_count(&self) -> usize;

    /// One greater than the largest valid byte offset.
    fn byte_count(&self) -> usize {
        self.sector_count() * Self::SECTOR_SIZE::to_usize()
    }
}
