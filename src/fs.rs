//! Top-level API (spec §6): `Filesystem<D>` context replacing the source's
//! single global `CORE` record, per the "Global mutable state → explicit
//! context" Design Note (spec §9). Every operation named in spec §6 —
//! `mount`, `cd`, `enumerate_folder`, `enumerate_disk`, `volume_inquiry`,
//! `open`/`read`/`seek`/`close`/`eof` — is a method here, threading the
//! owned `SectorDevice` and the immutable `Geometry` through the lower
//! layers (`path`, `navigator`, `cursor`).

use typenum::consts::U512;

use crate::config::{MAX_OPEN_FILES, MAX_PATH, MAX_WALK_DEPTH};
use crate::cursor::{root_location_and_size, FileCursor};
use crate::entry::{Attributes, Entry, Location, TypeFilter};
use crate::error::Error;
use crate::geometry::Geometry;
use crate::navigator::{file_entry_dir, file_seek_next, file_seek_prev, Navigator, PlayTimeClock};
use crate::path::{resolve, Located};
use crate::seek::SeekMode;
use crate::storage::SectorDevice;

/// Opaque handle returned by `open`, indexing into `Filesystem`'s
/// fixed-size open-file table (spec §6, `config::MAX_OPEN_FILES`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHandle(usize);

struct OpenFile {
    cursor: FileCursor,
}

/// Fixed-capacity textual current-directory path (`SPEC_FULL.md` §4.11),
/// mirroring `original_source/FAT.C`'s `CORE.current_folder`: not purely
/// derivable from the directory cursor, which only carries sector/cluster
/// coordinates, so it's tracked alongside the cursor and updated
/// incrementally by `cd`.
struct CurrentPath {
    buf: [u8; MAX_PATH],
    len: usize,
}

impl CurrentPath {
    fn root() -> Self {
        let mut buf = [0u8; MAX_PATH];
        buf[0] = b'C';
        buf[1] = b':';
        buf[2] = b'\\';
        Self { buf, len: 3 }
    }

    fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("C:\\")
    }

    fn reset_to_root(&mut self) {
        self.len = 3;
    }

    fn push_segment(&mut self, segment: &[u8]) {
        if self.len > 3 && self.len < MAX_PATH {
            self.buf[self.len] = b'\\';
            self.len += 1;
        }
        for &b in segment {
            if self.len >= MAX_PATH {
                break;
            }
            self.buf[self.len] = b;
            self.len += 1;
        }
    }

    /// Truncates at the last `\`, matching `cd("..")`'s effect on the
    /// source's `current_folder` string. Never truncates past the root.
    fn pop_segment(&mut self) {
        if self.len <= 3 {
            return;
        }
        let mut i = self.len;
        while i > 3 && self.buf[i - 1] != b'\\' {
            i -= 1;
        }
        self.len = if i <= 3 { 3 } else { i - 1 };
    }
}

/// One saved return point in `enumerate_disk`'s explicit directory stack
/// (spec §9's "No-recursion directory walk" note): where to resume once
/// the subdirectory just entered is exhausted.
#[derive(Clone, Copy)]
struct DirSnapshot {
    location: Location,
    size_bytes: u32,
    index: i64,
}

/// The filesystem context (spec §6's top-level API), generic over the
/// backing `SectorDevice`. Owns the device, the immutable mounted
/// `Geometry`, the current-directory `Navigator`, the textual current
/// path, a fixed-capacity open-file table, and `enumerate_disk`'s explicit
/// walk stack.
pub struct Filesystem<D: SectorDevice<SECTOR_SIZE = U512>> {
    device: D,
    geometry: Geometry,
    navigator: Navigator,
    current_path: CurrentPath,
    open_files: [Option<OpenFile>; MAX_OPEN_FILES],
    walk_stack: [Option<DirSnapshot>; MAX_WALK_DEPTH],
    walk_depth: usize,
}

impl<D: SectorDevice<SECTOR_SIZE = U512>> Filesystem<D> {
    /// `mount(partition)` (spec §4.3, §6): parses the MBR/BPB or ISO volume
    /// descriptor and positions the navigator at the root directory
    /// (`AtRoot`, spec §4.10's initial state).
    pub fn mount(mut device: D, partition: u8) -> Result<Self, Error<D::ReadErr>> {
        let geometry = Geometry::mount(&mut device, partition)?;
        let (location, size_bytes) = root_location_and_size(&geometry);
        let navigator = Navigator::open(&mut device, &geometry, location, size_bytes)?;

        Ok(Self {
            device,
            geometry,
            navigator,
            current_path: CurrentPath::root(),
            open_files: core::array::from_fn(|_| None),
            walk_stack: [None; MAX_WALK_DEPTH],
            walk_depth: 0,
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// The textual absolute current directory path (`SPEC_FULL.md` §4.11),
    /// e.g. `C:\a\b`.
    pub fn current_path(&self) -> &str {
        self.current_path.as_str()
    }

    /// `cd(path)` (spec §6). `up` mirrors the source's second mode flag
    /// for `cd('..', 1)`: when set, `path` is ignored and the navigator
    /// ascends to the enclosing directory via `Navigator::goto_parent`
    /// instead of resolving a new path.
    pub fn cd(&mut self, path: &str, up: bool) -> Result<(), Error<D::ReadErr>> {
        if up {
            self.navigator.goto_parent(&mut self.device, &self.geometry, TypeFilter::ALL)?;
            self.current_path.pop_segment();
            return Ok(());
        }

        let current = Located {
            location: self.navigator.location(),
            size_bytes: self.navigator.size_bytes(),
            is_dir: true,
        };
        let located = resolve(&mut self.device, &self.geometry, current, path, true)?;
        self.navigator = Navigator::open(&mut self.device, &self.geometry, located.location, located.size_bytes)?;

        let bytes = path.as_bytes();
        let rest = if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
            &path[2..]
        } else {
            path
        };
        if let Some(stripped) = rest.strip_prefix('\\') {
            self.current_path.reset_to_root();
            for segment in stripped.split('\\').filter(|s| !s.is_empty()) {
                self.current_path.push_segment(segment.as_bytes());
            }
        } else {
            for segment in rest.split('\\').filter(|s| !s.is_empty()) {
                self.current_path.push_segment(segment.as_bytes());
            }
        }
        Ok(())
    }

    /// `enumerate_folder()` (spec §6): advances the hidden current-directory
    /// cursor and returns the next entry, or `EndOfDirectory` ("`NoMore`")
    /// when exhausted. `include_labels` makes the spec §4.5 rule 4 /
    /// §4.12 volume-label skip caller-facing rather than an internal-only
    /// default.
    pub fn enumerate_folder(&mut self, include_labels: bool) -> Result<(Entry, Attributes), Error<D::ReadErr>> {
        self.navigator.set_include_labels(&mut self.device, &self.geometry, include_labels)?;
        if self.navigator.goto_next(&mut self.device, &self.geometry, TypeFilter::ALL)? {
            let entry = self.navigator.current().expect("goto_next returned true").clone();
            let attributes = entry.attributes;
            Ok((entry, attributes))
        } else {
            Err(Error::EndOfDirectory)
        }
    }

    /// Resets `enumerate_disk`'s depth-first walk to start at the root
    /// directory (spec §6, S5's "starting at `C:\`").
    pub fn enumerate_disk_reset(&mut self) -> Result<(), Error<D::ReadErr>> {
        let (location, size_bytes) = root_location_and_size(&self.geometry);
        self.navigator = Navigator::open(&mut self.device, &self.geometry, location, size_bytes)?;
        self.walk_stack = [None; MAX_WALK_DEPTH];
        self.walk_depth = 0;
        Ok(())
    }

    /// `enumerate_disk(...)` (spec §6): depth-first, descending into every
    /// non-hidden subdirectory, emitting every entry (directories
    /// included). Returns `Ok(None)` once the whole tree under the root
    /// has been walked. Uses an explicit fixed-capacity stack rather than
    /// the source's implicit `cd`/`cd('..')` recursion (spec §9's
    /// "No-recursion directory walk" note); a subdirectory found once the
    /// stack is at `MAX_WALK_DEPTH` is emitted but not descended into, and
    /// the occurrence is logged.
    pub fn enumerate_disk_next(&mut self) -> Result<Option<(Entry, Attributes)>, Error<D::ReadErr>> {
        loop {
            if self.navigator.goto_next(&mut self.device, &self.geometry, TypeFilter::ALL)? {
                let entry = self.navigator.current().expect("goto_next returned true").clone();
                let attributes = entry.attributes;

                if entry.is_dir() && !attributes.contains(Attributes::HIDDEN) {
                    if self.walk_depth < MAX_WALK_DEPTH {
                        self.walk_stack[self.walk_depth] = Some(DirSnapshot {
                            location: self.navigator.location(),
                            size_bytes: self.navigator.size_bytes(),
                            index: self.navigator.index(),
                        });
                        self.walk_depth += 1;
                        self.navigator = Navigator::open(&mut self.device, &self.geometry, entry.location, entry.size_bytes)?;
                    } else {
                        log::warn!(
                            "enumerate_disk: max walk depth {} reached, not descending into {:?}",
                            MAX_WALK_DEPTH,
                            entry.name.as_bytes(),
                        );
                    }
                }

                return Ok(Some((entry, attributes)));
            }

            if self.walk_depth == 0 {
                return Ok(None);
            }
            self.walk_depth -= 1;
            let snapshot = self.walk_stack[self.walk_depth].take().expect("walk_depth tracks occupied slots");
            self.navigator =
                Navigator::open(&mut self.device, &self.geometry, snapshot.location, snapshot.size_bytes)?;
            self.navigator.seek_to_index(&mut self.device, &self.geometry, TypeFilter::ALL, snapshot.index)?;
        }
    }

    /// `volume_inquiry(drive)` (spec §6): `(total_sectors, free_sectors)`.
    /// Free space is computed by scanning the FAT for entries whose raw
    /// value is `0` (the free-cluster marker); ISO9660/Joliet always
    /// reports `free = 0` (no allocation bitmap to scan, spec §6).
    pub fn volume_inquiry(&mut self) -> Result<(u32, u32), Error<D::ReadErr>> {
        if !self.geometry.is_fat() {
            return Ok((0, 0));
        }

        let mut free_clusters = 0u32;
        for cluster in 2..(2 + self.geometry.count_of_clusters) {
            if crate::fat::table::is_free_cluster(&mut self.device, &self.geometry, cluster)? {
                free_clusters += 1;
            }
        }

        let free_sectors = free_clusters * self.geometry.sectors_per_cluster as u32;
        Ok((self.geometry.total_sectors, free_sectors))
    }

    /// `open(path)` (spec §6): resolves `path` relative to the current
    /// directory and opens a file cursor, failing with
    /// `TooManyOpenFiles` if `config::MAX_OPEN_FILES` handles are already
    /// outstanding.
    pub fn open(&mut self, path: &str) -> Result<FileHandle, Error<D::ReadErr>> {
        let current = Located {
            location: self.navigator.location(),
            size_bytes: self.navigator.size_bytes(),
            is_dir: true,
        };
        let located = resolve(&mut self.device, &self.geometry, current, path, false)?;

        let slot = self.open_files.iter().position(Option::is_none).ok_or(Error::TooManyOpenFiles)?;
        let cursor = FileCursor::open(&mut self.device, &self.geometry, located.location, located.size_bytes)?;
        self.open_files[slot] = Some(OpenFile { cursor });
        Ok(FileHandle(slot))
    }

    fn file(&self, handle: FileHandle) -> Result<&OpenFile, Error<D::ReadErr>> {
        self.open_files.get(handle.0).and_then(Option::as_ref).ok_or(Error::NotFound)
    }

    fn file_mut(&mut self, handle: FileHandle) -> Result<&mut OpenFile, Error<D::ReadErr>> {
        self.open_files.get_mut(handle.0).and_then(Option::as_mut).ok_or(Error::NotFound)
    }

    /// `read(handle, &mut buf)` (spec §6): fills `buf` with up to
    /// `buf.len()` bytes, stopping at `eof()`; returns the count read.
    pub fn read(&mut self, handle: FileHandle, buf: &mut [u8]) -> Result<usize, Error<D::ReadErr>> {
        let file = self.open_files.get_mut(handle.0).and_then(Option::as_mut).ok_or(Error::NotFound)?;
        file.cursor.read(&mut self.device, &self.geometry, buf)
    }

    /// `seek(handle, mode, offset)` (spec §6).
    pub fn seek(&mut self, handle: FileHandle, mode: SeekMode, offset: i64) -> Result<u64, Error<D::ReadErr>> {
        Ok(self.file_mut(handle)?.cursor.seek(mode, offset))
    }

    /// `eof(handle)` (spec §6, spec §3 invariant 4).
    pub fn eof(&self, handle: FileHandle) -> Result<bool, Error<D::ReadErr>> {
        Ok(self.file(handle)?.cursor.eof())
    }

    /// `close(handle)` (spec §6): frees the open-file slot. Closing an
    /// already-closed or unknown handle is a no-op, matching the source's
    /// tolerant `fclose`.
    pub fn close(&mut self, handle: FileHandle) {
        if let Some(slot) = self.open_files.get_mut(handle.0) {
            *slot = None;
        }
    }

    /// `goto_next(filter)` (spec §4.9), delegated to the current-directory
    /// `Navigator`.
    pub fn goto_next(&mut self, filter: TypeFilter) -> Result<bool, Error<D::ReadErr>> {
        self.navigator.goto_next(&mut self.device, &self.geometry, filter)
    }

    /// `goto_prev(filter)` (spec §4.9).
    pub fn goto_prev(&mut self, filter: TypeFilter) -> Result<bool, Error<D::ReadErr>> {
        self.navigator.goto_prev(&mut self.device, &self.geometry, filter)
    }

    /// `goto_first(filter)` (spec §4.9).
    pub fn goto_first(&mut self, filter: TypeFilter) -> Result<bool, Error<D::ReadErr>> {
        self.navigator.goto_first(&mut self.device, &self.geometry, filter)
    }

    /// `goto_last(filter)` (spec §4.9).
    pub fn goto_last(&mut self, filter: TypeFilter) -> Result<bool, Error<D::ReadErr>> {
        self.navigator.goto_last(&mut self.device, &self.geometry, filter)
    }

    /// `file_entry_dir(filter)` (spec §1): descends into the current entry
    /// if it is a directory.
    pub fn file_entry_dir(&mut self, filter: TypeFilter) -> Result<(), Error<D::ReadErr>> {
        file_entry_dir(&mut self.navigator, &mut self.device, &self.geometry, filter)
    }

    /// `file_seek_next(filter)` (spec §4.9): thin alias over `goto_next`.
    pub fn file_seek_next(&mut self, filter: TypeFilter) -> Result<bool, Error<D::ReadErr>> {
        file_seek_next(&mut self.navigator, &mut self.device, &self.geometry, filter)
    }

    /// `file_seek_prev(filter, clock)` (spec §4.9): the time-biased
    /// previous rule.
    pub fn file_seek_prev(
        &mut self,
        filter: TypeFilter,
        clock: &dyn PlayTimeClock,
    ) -> Result<bool, Error<D::ReadErr>> {
        file_seek_prev(&mut self.navigator, &mut self.device, &self.geometry, filter, clock)
    }

    pub fn current_entry(&self) -> Option<&Entry> {
        self.navigator.current()
    }
}
