//! FAT directory iterator (spec §4.5).
//!
//! Classifies 32-byte directory entries (end-of-directory, deleted, LFN
//! continuation, volume label, short 8.3 entry), reconstructing VFAT long
//! names across preceding LFN records. Grounded on the teacher's
//! `DirEntry::from_arr`/`DirIter` offset layout in the original
//! `fat/dir.rs`, generalized from a single-cluster, FAT32-only iterator to
//! one that walks the fragment cache and falls back to the root region for
//! FAT12/16.

use core::convert::TryInto;

use generic_array::GenericArray;
use typenum::consts::U512;

use crate::config::MAX_FILENAME_LEN;
use crate::entry::{Attributes, Entry, EntryKind, Location, Name};
use crate::error::Error;
use crate::fat::table::{Cluster, DirFragmentCache, FragmentCache};
use crate::geometry::Geometry;
use crate::storage::SectorDevice;

const ENTRY_SIZE: usize = 32;

/// Where a FAT directory's entries live: a cluster chain (subdirectory, or
/// FAT32 root) or the fixed-size FAT12/16 root region.
#[derive(Debug, Clone, Copy)]
pub enum FatDirLocation {
    Chain(Cluster),
    Root { first_sector: u32, sector_count: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawState {
    Exists,
    Deleted,
    End,
}

fn raw_state(raw: &[u8; ENTRY_SIZE]) -> RawState {
    match raw[0] {
        0x00 => RawState::End,
        0xE5 => RawState::Deleted,
        _ => RawState::Exists,
    }
}

fn is_lfn(raw: &[u8; ENTRY_SIZE]) -> bool {
    raw[11] == 0x0F
}

/// Accumulates UCS-2LE LFN fragments in on-disk (reverse-ordinal) order and
/// reassembles them into a `Name`, per spec §4.5 rule 3 and the Open
/// Question's resolution (accumulate, truncate at the first NUL).
struct LfnAccumulator {
    // One slot per ordinal (1-based, up to 20 records -> 255 chars); stores
    // the 13 UCS-2 code units each record carries.
    slots: [[u16; 13]; MAX_FILENAME_LEN / 13 + 1],
    seen: [bool; MAX_FILENAME_LEN / 13 + 1],
    max_ordinal: usize,
}

impl LfnAccumulator {
    fn new() -> Self {
        Self {
            slots: [[0u16; 13]; MAX_FILENAME_LEN / 13 + 1],
            seen: [false; MAX_FILENAME_LEN / 13 + 1],
            max_ordinal: 0,
        }
    }

    fn reset(&mut self) {
        self.seen = [false; MAX_FILENAME_LEN / 13 + 1];
        self.max_ordinal = 0;
    }

    fn accept(&mut self, raw: &[u8; ENTRY_SIZE]) {
        let ordinal = (raw[0] & 0x1F) as usize;
        if ordinal == 0 || ordinal >= self.slots.len() {
            return;
        }
        if raw[0] & 0x40 != 0 {
            self.max_ordinal = self.max_ordinal.max(ordinal);
        }

        let mut units = [0u16; 13];
        for (i, offset) in [1usize, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30].iter().enumerate() {
            units[i] = u16::from_le_bytes([raw[*offset], raw[*offset + 1]]);
        }
        self.slots[ordinal] = units;
        self.seen[ordinal] = true;
    }

    fn is_complete(&self) -> bool {
        self.max_ordinal > 0 && (1..=self.max_ordinal).all(|i| self.seen[i])
    }

    fn reconstruct(&self, name: &mut Name) {
        name.clear();
        'outer: for ordinal in 1..=self.max_ordinal {
            if !self.seen[ordinal] {
                break;
            }
            for &unit in self.slots[ordinal].iter() {
                if unit == 0x0000 {
                    break 'outer;
                }
                // Latin-1/ASCII projection: this engine targets ASCII 8.3
                // systems; non-ASCII UCS-2 code units degrade to '?'.
                let byte = if unit < 0x80 { unit as u8 } else { b'?' };
                if !name.push(byte) {
                    break 'outer;
                }
            }
        }
    }
}

fn parse_short_name(raw: &[u8; ENTRY_SIZE], name: &mut Name, extension: &mut [u8; 3]) {
    name.clear();
    for &b in raw[0..8].iter() {
        if b == 0x20 {
            break;
        }
        name.push(b.to_ascii_uppercase());
    }
    for i in 0..3 {
        extension[i] = raw[8 + i].to_ascii_uppercase();
    }
    if extension[0] != 0x20 && extension[0] != 0 {
        name.push(b'.');
        for &b in extension.iter() {
            if b == 0x20 || b == 0 {
                break;
            }
            name.push(b);
        }
    }
}

fn parse_entry(raw: &[u8; ENTRY_SIZE]) -> Entry {
    let mut name = Name::default();
    let mut extension = [0u8; 3];
    parse_short_name(raw, &mut name, &mut extension);

    let attribute_byte = raw[11];
    let attributes = Attributes::from_bits_truncate(attribute_byte);

    let kind = if attributes.contains(Attributes::VOLUME_ID) {
        EntryKind::VolumeLabel
    } else if attributes.contains(Attributes::DIRECTORY) {
        EntryKind::Directory
    } else {
        EntryKind::File
    };

    // Open Question resolution: always OR the cluster halves together,
    // regardless of FAT width (spec §9).
    let cluster_high = u16::from_le_bytes(raw[20..22].try_into().unwrap()) as u32;
    let cluster_low = u16::from_le_bytes(raw[26..28].try_into().unwrap()) as u32;
    let cluster = (cluster_high << 16) | cluster_low;

    let size_bytes = u32::from_le_bytes(raw[28..32].try_into().unwrap());

    Entry {
        kind,
        attributes,
        name,
        extension,
        location: Location::Cluster(cluster),
        size_bytes,
    }
}

/// Directory cursor over a FAT directory (spec §3's directory cursor,
/// §4.10's state machine). Owns its fragment cache.
pub struct FatDirCursor {
    location: FatDirLocation,
    fragments: DirFragmentCache,
    /// Byte offset from the start of the directory's logical entry stream.
    byte_offset: u32,
    at_end: bool,
    include_labels: bool,
}

impl FatDirCursor {
    pub fn open<D: SectorDevice<SECTOR_SIZE = U512>>(
        device: &mut D,
        geometry: &Geometry,
        location: FatDirLocation,
        include_labels: bool,
    ) -> Result<Self, Error<D::ReadErr>> {
        let fragments = match location {
            FatDirLocation::Chain(cluster) => FragmentCache::build(device, geometry, cluster)?,
            FatDirLocation::Root { .. } => DirFragmentCache::default(),
        };

        Ok(Self { location, fragments, byte_offset: 0, at_end: false, include_labels })
    }

    pub fn rewind(&mut self) {
        self.byte_offset = 0;
        self.at_end = false;
    }

    /// Reads the raw 32-byte entry at `byte_offset`, resolving it to a
    /// physical sector either via the fragment cache (chain) or directly
    /// (fixed-size root region).
    fn read_raw<D: SectorDevice<SECTOR_SIZE = U512>>(
        &self,
        device: &mut D,
        geometry: &Geometry,
        byte_offset: u32,
    ) -> Result<Option<[u8; ENTRY_SIZE]>, Error<D::ReadErr>> {
        let (sector, in_sector_offset) = match self.location {
            FatDirLocation::Root { first_sector, sector_count } => {
                let sector_in_region = byte_offset / 512;
                if sector_in_region >= sector_count {
                    return Ok(None);
                }
                (first_sector as u64 + sector_in_region as u64, byte_offset % 512)
            }
            FatDirLocation::Chain(_) => {
                let bytes_per_cluster = geometry.sectors_per_cluster as u32 * 512;
                let cluster_ordinal = byte_offset / bytes_per_cluster;
                let within_cluster = byte_offset % bytes_per_cluster;

                let cluster = self.fragments.resolve_cluster(device, geometry, cluster_ordinal)?;

                let first_sector = geometry.first_sector_of_cluster(cluster);
                let sector_in_cluster = within_cluster / 512;
                (first_sector as u64 + sector_in_cluster as u64, within_cluster % 512)
            }
        };

        let mut buf: GenericArray<u8, U512> = GenericArray::default();
        device.read_sector(sector as usize, &mut buf)?;

        let mut raw = [0u8; ENTRY_SIZE];
        raw.copy_from_slice(&buf[in_sector_offset as usize..in_sector_offset as usize + ENTRY_SIZE]);
        Ok(Some(raw))
    }

    /// Advances past the current entry and returns the next classified
    /// entry, or `None` at end-of-directory (spec §4.5's end-of-directory
    /// semantics: sentinel byte, or chain/root-region exhaustion).
    pub fn next<D: SectorDevice<SECTOR_SIZE = U512>>(
        &mut self,
        device: &mut D,
        geometry: &Geometry,
    ) -> Result<Option<Entry>, Error<D::ReadErr>> {
        if self.at_end {
            return Ok(None);
        }

        let mut lfn = LfnAccumulator::new();

        loop {
            let raw = match self.read_raw(device, geometry, self.byte_offset)? {
                Some(raw) => raw,
                None => {
                    self.at_end = true;
                    return Ok(None);
                }
            };

            match raw_state(&raw) {
                RawState::End => {
                    self.at_end = true;
                    return Ok(None);
                }
                RawState::Deleted => {
                    self.byte_offset += ENTRY_SIZE as u32;
                    lfn.reset();
                    continue;
                }
                RawState::Exists if is_lfn(&raw) => {
                    lfn.accept(&raw);
                    self.byte_offset += ENTRY_SIZE as u32;
                    continue;
                }
                RawState::Exists => {
                    self.byte_offset += ENTRY_SIZE as u32;
                    let mut entry = parse_entry(&raw);

                    if entry.attributes.contains(Attributes::VOLUME_ID) && !self.include_labels {
                        lfn.reset();
                        continue;
                    }

                    if lfn.is_complete() {
                        lfn.reconstruct(&mut entry.name);
                    }

                    return Ok(Some(entry));
                }
            }
        }
    }
}

/// `root_dir_sectors` worth of fixed FAT12/16 root-directory region.
pub fn root_location(geometry: &Geometry) -> FatDirLocation {
    if geometry.root_dir_entries != 0 {
        FatDirLocation::Root {
            first_sector: geometry.first_root_sector,
            sector_count: geometry.root_dir_sectors,
        }
    } else {
        FatDirLocation::Chain(geometry.root_cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_trims_padding_and_joins_extension() {
        let mut raw = [0x20u8; ENTRY_SIZE];
        raw[0..8].copy_from_slice(b"README  ");
        raw[8..11].copy_from_slice(b"TXT");

        let mut name = Name::default();
        let mut ext = [0u8; 3];
        parse_short_name(&raw, &mut name, &mut ext);

        assert_eq!(name.as_bytes(), b"README.TXT");
        assert_eq!(&ext, b"TXT");
    }

    #[test]
    fn end_of_directory_sentinel_detected() {
        let raw = [0u8; ENTRY_SIZE];
        assert_eq!(raw_state(&raw), RawState::End);
    }

    #[test]
    fn deleted_entry_detected() {
        let mut raw = [0u8; ENTRY_SIZE];
        raw[0] = 0xE5;
        assert_eq!(raw_state(&raw), RawState::Deleted);
    }
}
