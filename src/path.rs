//! Path resolver (spec §4.7).
//!
//! Grounded on `original_source/FAT.C`'s `SplitNameFromPath`/
//! `RelativePathToSectorCluster`/`FullPathToSectorCluster`: split a path
//! like `C:\dir\sub\file.ext` on `\`, walk directory entries
//! case-insensitively for every non-terminal segment, and match the
//! terminal segment against the kind the caller expects.

use typenum::consts::U512;

use crate::config::MAX_PATH;
use crate::cursor::{open_dir_cursor, root_location_and_size};
use crate::entry::{Entry, Location};
use crate::error::Error;
use crate::geometry::Geometry;
use crate::storage::SectorDevice;

/// A directory or file located by the resolver: where its data lives, how
/// big it is, and whether it's a directory (spec §4.7's "located entry").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub location: Location,
    pub size_bytes: u32,
    pub is_dir: bool,
}

impl From<&Entry> for Located {
    fn from(entry: &Entry) -> Self {
        Self { location: entry.location, size_bytes: entry.size_bytes, is_dir: entry.is_dir() }
    }
}

/// Scans one directory for a case-insensitive name match of the expected
/// kind (spec §4.7 steps 4-5).
fn find_entry<D: SectorDevice<SECTOR_SIZE = U512>>(
    device: &mut D,
    geometry: &Geometry,
    dir: Located,
    segment: &str,
    want_dir: bool,
) -> Result<Entry, Error<D::ReadErr>> {
    let mut cursor = open_dir_cursor(device, geometry, dir.location, dir.size_bytes, false, true)?;
    while let Some(entry) = cursor.next(device, geometry)? {
        if entry.is_dir() != want_dir {
            continue;
        }
        if entry.name.eq_ignore_case(segment.as_bytes()) {
            return Ok(entry);
        }
    }
    Err(Error::NotFound)
}

/// Resolves `path` relative to `current`, per spec §4.7's numbered
/// algorithm. `want_dir` is the terminal segment's expected kind; every
/// non-terminal segment is always expected to be a directory.
///
/// Only drive `C` is recognized: this engine mounts a single partition per
/// `Filesystem`, so a drive letter is accepted syntactically (spec §4.7
/// step 1) but any letter other than `C` resolves to `NotFound` rather than
/// mounting a second partition — see `DESIGN.md`.
pub fn resolve<D: SectorDevice<SECTOR_SIZE = U512>>(
    device: &mut D,
    geometry: &Geometry,
    current: Located,
    path: &str,
    want_dir: bool,
) -> Result<Located, Error<D::ReadErr>> {
    if path.len() > MAX_PATH {
        return Err(Error::PathTooLong);
    }

    let mut cur = current;
    let mut rest = path;

    let bytes = rest.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        if !bytes[0].eq_ignore_ascii_case(&b'C') {
            return Err(Error::NotFound);
        }
        rest = &rest[2..];
    }

    if let Some(stripped) = rest.strip_prefix('\\') {
        let (location, size_bytes) = root_location_and_size(geometry);
        cur = Located { location, size_bytes, is_dir: true };
        rest = stripped;
    }

    if rest.is_empty() {
        if want_dir && !cur.is_dir {
            return Err(Error::NotADirectory);
        }
        if !want_dir && cur.is_dir {
            return Err(Error::NotAFile);
        }
        return Ok(cur);
    }

    let mut segments = rest.split('\\').peekable();
    while let Some(segment) = segments.next() {
        if segment.is_empty() {
            continue;
        }
        if !cur.is_dir {
            return Err(Error::NotADirectory);
        }
        let is_last = segments.peek().is_none();
        let want = if is_last { want_dir } else { true };
        let entry = find_entry(device, geometry, cur, segment, want)?;
        cur = Located::from(&entry);
    }

    Ok(cur)
}
