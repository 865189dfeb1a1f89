//! Navigator policy: `goto_next/prev/parent/first/last/child` and the
//! `file_seek_prev`/`file_seek_next`/`file_entry_dir` helpers (spec §4.9,
//! §4.10's directory-cursor state machine).
//!
//! Grounded on `original_source/.../FILE/FILE.C`, which is also where
//! `F_SEEK_TIME = 4` comes from (spec §9's design-note confirmation).
//! Simplification: rather than keeping the optional `entry_deltas` compact
//! table (spec §3), `goto_prev`/a missed `goto_child` restore rewind the
//! underlying cursor and re-walk forward to the target index. Directories
//! in this engine's target class are small enough that the rescan is cheap,
//! and skipping the table avoids another fixed-capacity array; see
//! `DESIGN.md`.

use typenum::consts::U512;

use crate::config::F_SEEK_TIME;
use crate::cursor::{open_dir_cursor, DirCursor};
use crate::entry::{Entry, TypeFilter};
use crate::error::Error;
use crate::geometry::Geometry;
use crate::storage::SectorDevice;

/// External collaborator (spec §4.9): a play-time clock `file_seek_prev`
/// consults to decide whether to restart the current file instead of
/// truly seeking to the previous one. The clock source itself is out of
/// scope (spec §1's non-goals).
pub trait PlayTimeClock {
    fn elapsed_minutes(&self) -> u8;
    fn elapsed_seconds(&self) -> u8;
}

fn is_navigable(entry: &Entry, filter: TypeFilter) -> bool {
    let name = entry.name.as_bytes();
    if name == b"." || name == b".." {
        return false;
    }
    entry.type_tag().matches(filter)
}

/// Directory cursor + navigation state (spec §3's directory cursor, §4.10's
/// state machine collapsed into `index`: `-1` is `PastEnd`/before-first,
/// `>= 0` is `AtFirst`/`AtMiddle`/`AtLast`).
pub struct Navigator {
    location: crate::entry::Location,
    size_bytes: u32,
    cursor: DirCursor,
    index: i64,
    current_entry: Option<Entry>,
    /// Whether `ATTR_VOLUME_ID` entries are surfaced (spec §4.5 rule 4,
    /// made caller-facing per `SPEC_FULL.md` §4.12).
    include_labels: bool,
}

impl Navigator {
    pub fn open<D: SectorDevice<SECTOR_SIZE = U512>>(
        device: &mut D,
        geometry: &Geometry,
        location: crate::entry::Location,
        size_bytes: u32,
    ) -> Result<Self, Error<D::ReadErr>> {
        let cursor = open_dir_cursor(device, geometry, location, size_bytes, false, true)?;
        Ok(Self { location, size_bytes, cursor, index: -1, current_entry: None, include_labels: false })
    }

    /// Toggles whether volume-label entries are surfaced by `goto_next`
    /// (`SPEC_FULL.md` §4.12), reopening the cursor at the current
    /// directory's start if the setting actually changed.
    pub fn set_include_labels<D: SectorDevice<SECTOR_SIZE = U512>>(
        &mut self,
        device: &mut D,
        geometry: &Geometry,
        include_labels: bool,
    ) -> Result<(), Error<D::ReadErr>> {
        if self.include_labels == include_labels {
            return Ok(());
        }
        self.include_labels = include_labels;
        self.cursor = open_dir_cursor(device, geometry, self.location, self.size_bytes, include_labels, true)?;
        self.index = -1;
        self.current_entry = None;
        Ok(())
    }

    pub fn location(&self) -> crate::entry::Location {
        self.location
    }

    pub fn size_bytes(&self) -> u32 {
        self.size_bytes
    }

    pub fn current(&self) -> Option<&Entry> {
        self.current_entry.as_ref()
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    /// `goto_next(filter)` (spec §4.9): advances past non-matching entries,
    /// returning `false` (`NoMore`) at the end without wrapping. Caller
    /// decides whether to wrap by calling `goto_first` again.
    pub fn goto_next<D: SectorDevice<SECTOR_SIZE = U512>>(
        &mut self,
        device: &mut D,
        geometry: &Geometry,
        filter: TypeFilter,
    ) -> Result<bool, Error<D::ReadErr>> {
        loop {
            match self.cursor.next(device, geometry)? {
                None => {
                    self.current_entry = None;
                    return Ok(false);
                }
                Some(entry) => {
                    if is_navigable(&entry, filter) {
                        self.index += 1;
                        log::trace!("goto_next: advanced to index {} ({:?})", self.index, entry.name.as_bytes());
                        self.current_entry = Some(entry);
                        return Ok(true);
                    }
                }
            }
        }
    }

    /// Rebuilds the cursor at its start and advances to filter-match index
    /// `target` (inclusive), leaving `self.index == target` on success.
    /// `pub(crate)` so `Filesystem::enumerate_disk` can resume a parent
    /// directory at its saved position (spec §9's "No-recursion directory
    /// walk" note).
    pub(crate) fn seek_to_index<D: SectorDevice<SECTOR_SIZE = U512>>(
        &mut self,
        device: &mut D,
        geometry: &Geometry,
        filter: TypeFilter,
        target: i64,
    ) -> Result<bool, Error<D::ReadErr>> {
        self.cursor.rewind();
        self.index = -1;
        self.current_entry = None;
        if target < 0 {
            return Ok(false);
        }
        for _ in 0..=target {
            if !self.goto_next(device, geometry, filter)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// `goto_prev(filter)` (spec §4.9). The underlying cursors are
    /// forward-only, so this rewinds and re-walks to `index - 1`.
    pub fn goto_prev<D: SectorDevice<SECTOR_SIZE = U512>>(
        &mut self,
        device: &mut D,
        geometry: &Geometry,
        filter: TypeFilter,
    ) -> Result<bool, Error<D::ReadErr>> {
        if self.index <= 0 {
            self.cursor.rewind();
            self.index = -1;
            self.current_entry = None;
            return Ok(false);
        }
        self.seek_to_index(device, geometry, filter, self.index - 1)
    }

    /// `goto_first` (spec §4.9).
    pub fn goto_first<D: SectorDevice<SECTOR_SIZE = U512>>(
        &mut self,
        device: &mut D,
        geometry: &Geometry,
        filter: TypeFilter,
    ) -> Result<bool, Error<D::ReadErr>> {
        self.cursor.rewind();
        self.index = -1;
        self.current_entry = None;
        self.goto_next(device, geometry, filter)
    }

    /// `goto_last` (spec §4.9).
    pub fn goto_last<D: SectorDevice<SECTOR_SIZE = U512>>(
        &mut self,
        device: &mut D,
        geometry: &Geometry,
        filter: TypeFilter,
    ) -> Result<bool, Error<D::ReadErr>> {
        if !self.goto_first(device, geometry, filter)? {
            return Ok(false);
        }
        while self.goto_next(device, geometry, filter)? {}
        // The final `goto_next` above hit the end and cleared
        // `current_entry`, but left `index` at the last match it found.
        // Re-walk to that index to get `current_entry` populated again.
        let last_index = self.index;
        self.seek_to_index(device, geometry, filter, last_index)
    }

    /// `goto_child(filter)` (spec §4.9): the current entry must be a
    /// directory. Enters it and positions at the first filter-matching
    /// entry; if none match, restores the parent directory and its prior
    /// position (`NoMatchingFiles`).
    pub fn goto_child<D: SectorDevice<SECTOR_SIZE = U512>>(
        &mut self,
        device: &mut D,
        geometry: &Geometry,
        filter: TypeFilter,
    ) -> Result<(), Error<D::ReadErr>> {
        let entry = self.current_entry.clone().ok_or(Error::NotADirectory)?;
        if !entry.is_dir() {
            return Err(Error::NotADirectory);
        }

        let parent_location = self.location;
        let parent_size = self.size_bytes;
        let parent_index = self.index;

        self.location = entry.location;
        self.size_bytes = entry.size_bytes;
        self.cursor =
            open_dir_cursor(device, geometry, self.location, self.size_bytes, self.include_labels, true)?;
        self.index = -1;
        self.current_entry = None;

        if self.goto_next(device, geometry, filter)? {
            return Ok(());
        }

        // No matching entries: restore the parent (spec §4.9's
        // "restore the parent directory" clause).
        self.location = parent_location;
        self.size_bytes = parent_size;
        self.cursor =
            open_dir_cursor(device, geometry, self.location, self.size_bytes, self.include_labels, true)?;
        self.seek_to_index(device, geometry, filter, parent_index)?;
        Err(Error::NoMatchingFiles)
    }

    /// `goto_parent()` (spec §4.9): restores the enclosing directory and
    /// positions at the child that was previously active, if found;
    /// otherwise at the first match. Uses the directory's own `..` record
    /// rather than an explicit caller-held stack — per spec §9's
    /// "No-recursion directory walk" note, the explicit stack is only for
    /// `enumerate_disk`'s depth-first sweep.
    pub fn goto_parent<D: SectorDevice<SECTOR_SIZE = U512>>(
        &mut self,
        device: &mut D,
        geometry: &Geometry,
        filter: TypeFilter,
    ) -> Result<(), Error<D::ReadErr>> {
        let descending_from = self.location;

        let mut raw = open_dir_cursor(device, geometry, self.location, self.size_bytes, true, false)?;
        let mut parent: Option<(crate::entry::Location, u32)> = None;
        while let Some(entry) = raw.next(device, geometry)? {
            if entry.name.as_bytes() == b".." {
                // ISO's `..` record carries the parent's own extent size
                // (FAT's doesn't — 0 is fine there, `FatDirLocation` never
                // needs a size).
                parent = Some((entry.location, entry.size_bytes));
                break;
            }
        }
        let (parent_location, parent_size) =
            parent.unwrap_or_else(|| crate::cursor::root_location_and_size(geometry));

        self.location = parent_location;
        self.size_bytes = parent_size;
        self.cursor =
            open_dir_cursor(device, geometry, self.location, self.size_bytes, self.include_labels, true)?;
        self.index = -1;
        self.current_entry = None;

        // Re-scan for the child we descended from; fall back to the first
        // match if it's gone or was never a navigable entry.
        let mut found = false;
        loop {
            if !self.goto_next(device, geometry, filter)? {
                break;
            }
            if self.current_entry.as_ref().map(|e| e.location) == Some(descending_from) {
                found = true;
                break;
            }
        }
        if !found {
            self.goto_first(device, geometry, filter)?;
        }
        Ok(())
    }
}

/// `file_seek_next` (spec §1, §4.9): a thin alias over `goto_next`, kept
/// separate so callers mirror the source's three-helper surface.
pub fn file_seek_next<D: SectorDevice<SECTOR_SIZE = U512>>(
    nav: &mut Navigator,
    device: &mut D,
    geometry: &Geometry,
    filter: TypeFilter,
) -> Result<bool, Error<D::ReadErr>> {
    nav.goto_next(device, geometry, filter)
}

/// `file_seek_prev` (spec §4.9): the time-biased previous rule. If the
/// clock shows the current file has played for `>= F_SEEK_TIME` seconds
/// within its first minute, restart the current file (no cursor move,
/// reported as `Ok(true)` with the current entry unchanged); otherwise
/// behaves exactly like `goto_prev`.
pub fn file_seek_prev<D: SectorDevice<SECTOR_SIZE = U512>>(
    nav: &mut Navigator,
    device: &mut D,
    geometry: &Geometry,
    filter: TypeFilter,
    clock: &dyn PlayTimeClock,
) -> Result<bool, Error<D::ReadErr>> {
    if clock.elapsed_minutes() == 0 && clock.elapsed_seconds() >= F_SEEK_TIME {
        return Ok(nav.current().is_some());
    }
    nav.goto_prev(device, geometry, filter)
}

/// `file_entry_dir` (spec §1): thin helper that descends into the current
/// entry if it's a directory, matching the source's combined
/// "enter-if-directory" navigation call.
pub fn file_entry_dir<D: SectorDevice<SECTOR_SIZE = U512>>(
    nav: &mut Navigator,
    device: &mut D,
    geometry: &Geometry,
    filter: TypeFilter,
) -> Result<(), Error<D::ReadErr>> {
    nav.goto_child(device, geometry, filter)
}
