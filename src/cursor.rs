//! Tagged-variant cursors (spec §9 "Aliased variables across formats").
//!
//! The source aliases FAT and ISO cursor state through `#define`s onto the
//! same global cells. This crate replaces that with an explicit enum: one
//! `DirCursor`/`FileCursor` value that is either the FAT or the ISO variant,
//! dispatched by a single `match`.

use generic_array::GenericArray;
use typenum::consts::U512;

use crate::entry::Entry;
use crate::error::Error;
use crate::fat::dir::FatDirCursor;
use crate::fat::file::FatFileCursor;
use crate::fat::table::Cluster;
use crate::geometry::Geometry;
use crate::iso::dir::IsoDirCursor;
use crate::iso::file::IsoFileCursor;
use crate::seek::SeekMode;
use crate::storage::SectorDevice;

/// A directory cursor over either on-disk format (spec §3's directory
/// cursor, generalized over FAT's cluster chain / fixed root region and
/// ISO's contiguous extent).
pub enum DirCursor {
    Fat(FatDirCursor),
    Iso(IsoDirCursor),
}

impl DirCursor {
    pub fn rewind(&mut self) {
        match self {
            DirCursor::Fat(c) => c.rewind(),
            DirCursor::Iso(c) => c.rewind(),
        }
    }

    pub fn next<D: SectorDevice<SECTOR_SIZE = U512>>(
        &mut self,
        device: &mut D,
        geometry: &Geometry,
    ) -> Result<Option<Entry>, Error<D::ReadErr>> {
        match self {
            DirCursor::Fat(c) => c.next(device, geometry),
            DirCursor::Iso(c) => c.next(device, geometry),
        }
    }
}

/// A file cursor over either on-disk format (spec §3's file cursor).
pub enum FileCursor {
    Fat(FatFileCursor),
    Iso(IsoFileCursor),
}

impl FileCursor {
    pub fn open<D: SectorDevice<SECTOR_SIZE = U512>>(
        device: &mut D,
        geometry: &Geometry,
        location: crate::entry::Location,
        size_bytes: u32,
    ) -> Result<Self, Error<D::ReadErr>> {
        Ok(if geometry.is_fat() {
            let first_cluster: Cluster = match location {
                crate::entry::Location::Cluster(c) => c,
                crate::entry::Location::Extent(_) => return Err(Error::NotAFile),
            };
            FileCursor::Fat(FatFileCursor::open(device, geometry, first_cluster, size_bytes)?)
        } else {
            let extent = match location {
                crate::entry::Location::Extent(e) => e,
                crate::entry::Location::Cluster(_) => return Err(Error::NotAFile),
            };
            FileCursor::Iso(IsoFileCursor::open(geometry, extent, size_bytes))
        })
    }

    pub fn size_bytes(&self) -> u32 {
        match self {
            FileCursor::Fat(c) => c.size_bytes(),
            FileCursor::Iso(c) => c.size_bytes(),
        }
    }

    pub fn position(&self) -> u32 {
        match self {
            FileCursor::Fat(c) => c.position(),
            FileCursor::Iso(c) => c.position(),
        }
    }

    pub fn eof(&self) -> bool {
        match self {
            FileCursor::Fat(c) => c.eof(),
            FileCursor::Iso(c) => c.eof(),
        }
    }

    pub fn seek(&mut self, mode: SeekMode, offset: i64) -> u64 {
        match self {
            FileCursor::Fat(c) => c.seek(mode, offset),
            FileCursor::Iso(c) => c.seek(mode, offset),
        }
    }

    pub fn read<D: SectorDevice<SECTOR_SIZE = U512>>(
        &mut self,
        device: &mut D,
        geometry: &Geometry,
        out: &mut [u8],
    ) -> Result<usize, Error<D::ReadErr>> {
        match self {
            FileCursor::Fat(c) => c.read(device, geometry, out),
            FileCursor::Iso(c) => c.read(device, out),
        }
    }
}

/// Opens a directory cursor at `location` (spec §4.7's path resolver
/// output). `include_labels` controls whether FAT `ATTR_VOLUME_ID` entries
/// are surfaced (spec §4.12); `skip_dot_entries` controls whether an ISO
/// directory's synthetic `.`/`..` records are surfaced — `Navigator::
/// goto_parent` needs the raw `..` record's own location, plain enumeration
/// does not (spec §4.6).
pub fn open_dir_cursor<D: SectorDevice<SECTOR_SIZE = U512>>(
    device: &mut D,
    geometry: &Geometry,
    location: crate::entry::Location,
    size_bytes: u32,
    include_labels: bool,
    skip_dot_entries: bool,
) -> Result<DirCursor, Error<D::ReadErr>> {
    if geometry.is_fat() {
        let cluster = match location {
            crate::entry::Location::Cluster(c) => c,
            crate::entry::Location::Extent(_) => return Err(Error::NotADirectory),
        };
        let fat_location = if cluster == 0 {
            crate::fat::dir::root_location(geometry)
        } else {
            crate::fat::dir::FatDirLocation::Chain(cluster)
        };
        Ok(DirCursor::Fat(FatDirCursor::open(device, geometry, fat_location, include_labels)?))
    } else {
        let extent = match location {
            crate::entry::Location::Extent(e) => e,
            crate::entry::Location::Cluster(_) => return Err(Error::NotADirectory),
        };
        let joliet = matches!(geometry.fs_type, crate::geometry::FsType::Joliet);
        Ok(DirCursor::Iso(IsoDirCursor::open(geometry, extent, size_bytes, joliet, skip_dot_entries)))
    }
}

/// The root directory's location and size (spec §4.3's derived root-dir
/// geometry), format-neutral.
pub fn root_location_and_size(geometry: &Geometry) -> (crate::entry::Location, u32) {
    if geometry.is_fat() {
        (crate::entry::Location::Cluster(geometry.root_cluster), 0)
    } else {
        (crate::entry::Location::Extent(geometry.root_extent_start), geometry.root_extent_size)
    }
}
