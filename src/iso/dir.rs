//! ISO9660/Joliet directory iterator (spec §4.6).
//!
//! Entries are variable-length directory records rather than fixed 32-byte
//! slots: byte 0 gives the record length (0 means "padding to the next
//! logical block"). Unlike a FAT cluster chain, an ISO directory's extent is
//! contiguous, so no fragment cache is needed here.

use core::convert::TryInto;

use generic_array::GenericArray;
use typenum::consts::U512;

use crate::entry::{Attributes, Entry, EntryKind, Location, Name};
use crate::error::Error;
use crate::geometry::Geometry;
use crate::storage::SectorDevice;

/// ISO9660 Level 1/2 allows logical blocks up to 2048 bytes (the CD-ROM
/// sector size); this engine doesn't target larger-block media.
const MAX_LOGICAL_BLOCK_SIZE: usize = 2048;

fn decode_name(identifier: &[u8], joliet: bool) -> Name {
    let mut name = Name::default();
    if joliet {
        for pair in identifier.chunks_exact(2) {
            let unit = u16::from_be_bytes([pair[0], pair[1]]);
            if unit == 0 || unit == b';' as u16 {
                break;
            }
            let byte = if unit < 0x80 { unit as u8 } else { b'?' };
            if !name.push(byte.to_ascii_uppercase()) {
                break;
            }
        }
    } else {
        for &b in identifier {
            if b == 0 || b == b';' {
                break;
            }
            if !name.push(b.to_ascii_uppercase()) {
                break;
            }
        }
    }
    name
}

fn extension_of(name: &Name) -> [u8; 3] {
    let bytes = name.as_bytes();
    let mut extension = [0u8; 3];
    if let Some(dot) = bytes.iter().rposition(|&b| b == b'.') {
        for (i, &b) in bytes[dot + 1..].iter().take(3).enumerate() {
            extension[i] = b;
        }
    }
    extension
}

/// Parses one directory record (spec §4.6); `record` is exactly
/// `record[0]` bytes long (the caller slices it off the logical block).
fn parse_record(record: &[u8], joliet: bool) -> Entry {
    let extent: u32 = u32::from_le_bytes(record[2..6].try_into().unwrap());
    let size_bytes: u32 = u32::from_le_bytes(record[10..14].try_into().unwrap());
    let flags = record[25];
    let identifier_len = record[32] as usize;
    let identifier = &record[33..33 + identifier_len];

    let is_dir = flags & 0x02 != 0;
    let is_hidden = flags & 0x01 != 0;

    let name = decode_name(identifier, joliet);
    let extension = extension_of(&name);

    let mut attributes = Attributes::empty();
    if is_dir {
        attributes |= Attributes::DIRECTORY;
    }
    if is_hidden {
        attributes |= Attributes::HIDDEN;
    }

    Entry {
        kind: if is_dir { EntryKind::Directory } else { EntryKind::File },
        attributes,
        name,
        extension,
        location: Location::Extent(extent),
        size_bytes,
    }
}

/// True for the two synthetic `.`/`..` records every ISO directory opens
/// with (spec §4.6): a one-byte identifier of `0x00` or `0x01`.
fn is_dot_record(record: &[u8]) -> bool {
    let identifier_len = record[32] as usize;
    identifier_len == 1 && matches!(record[33], 0x00 | 0x01)
}

/// Directory cursor over an ISO9660/Joliet extent (spec §3's directory
/// cursor). `skip_dot_entries` controls whether `.`/`..` are surfaced;
/// `Navigator::goto_parent` needs the raw `..` record; plain enumeration
/// does not (spec §4.6: "not exposed to navigation as file candidates").
pub struct IsoDirCursor {
    extent_lba: u32,
    size_bytes: u32,
    logical_block_size: u32,
    joliet: bool,
    skip_dot_entries: bool,

    block_ordinal: u32,
    byte_in_block: u32,
    at_end: bool,

    cached_block: Option<u32>,
    block_buf: [u8; MAX_LOGICAL_BLOCK_SIZE],
}

impl IsoDirCursor {
    pub fn open(geometry: &Geometry, extent_lba: u32, size_bytes: u32, joliet: bool, skip_dot_entries: bool) -> Self {
        Self {
            extent_lba,
            size_bytes,
            logical_block_size: geometry.logical_block_size as u32,
            joliet,
            skip_dot_entries,
            block_ordinal: 0,
            byte_in_block: 0,
            at_end: false,
            cached_block: None,
            block_buf: [0u8; MAX_LOGICAL_BLOCK_SIZE],
        }
    }

    pub fn rewind(&mut self) {
        self.block_ordinal = 0;
        self.byte_in_block = 0;
        self.at_end = false;
    }

    fn load_block<D: SectorDevice<SECTOR_SIZE = U512>>(
        &mut self,
        device: &mut D,
        geometry: &Geometry,
    ) -> Result<(), Error<D::ReadErr>> {
        if self.cached_block == Some(self.block_ordinal) {
            return Ok(());
        }

        let lba = self.extent_lba + self.block_ordinal;
        let first_sector = geometry.iso_lba_to_sector(lba) as u64;
        let sectors_per_block = (self.logical_block_size / 512).max(1);

        for i in 0..sectors_per_block {
            let mut sector: GenericArray<u8, U512> = GenericArray::default();
            device.read_sector((first_sector + i as u64) as usize, &mut sector)?;
            let start = i as usize * 512;
            self.block_buf[start..start + 512].copy_from_slice(&sector);
        }

        self.cached_block = Some(self.block_ordinal);
        Ok(())
    }

    /// Advances and returns the next classified entry, or `None` at
    /// end-of-directory (extent exhausted).
    pub fn next<D: SectorDevice<SECTOR_SIZE = U512>>(
        &mut self,
        device: &mut D,
        geometry: &Geometry,
    ) -> Result<Option<Entry>, Error<D::ReadErr>> {
        loop {
            if self.at_end {
                return Ok(None);
            }

            if self.byte_in_block >= self.logical_block_size {
                self.block_ordinal += 1;
                self.byte_in_block = 0;
            }

            if self.block_ordinal * self.logical_block_size >= self.size_bytes {
                self.at_end = true;
                return Ok(None);
            }

            self.load_block(device, geometry)?;

            let idx = self.byte_in_block as usize;
            let record_len = self.block_buf[idx];

            if record_len == 0 {
                // Padding to the next logical block (spec §4.6).
                self.block_ordinal += 1;
                self.byte_in_block = 0;
                continue;
            }

            let mut record = [0u8; 255];
            record[..record_len as usize].copy_from_slice(&self.block_buf[idx..idx + record_len as usize]);
            self.byte_in_block += record_len as u32;

            let record = &record[..record_len as usize];
            if is_dot_record(record) && self.skip_dot_entries {
                continue;
            }

            return Ok(Some(parse_record(record, self.joliet)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_record(extent: u32, size: u32, is_dir: bool, name: &[u8]) -> [u8; 64] {
        let mut record = [0u8; 64];
        let name_len = name.len();
        let len = 33 + name_len + (1 - name_len % 2);
        record[0] = len as u8;
        record[2..6].copy_from_slice(&extent.to_le_bytes());
        record[6..10].copy_from_slice(&extent.to_be_bytes());
        record[10..14].copy_from_slice(&size.to_le_bytes());
        record[14..18].copy_from_slice(&size.to_be_bytes());
        record[25] = if is_dir { 0x02 } else { 0x00 };
        record[32] = name_len as u8;
        record[33..33 + name_len].copy_from_slice(name);
        record
    }

    #[test]
    fn parses_iso_ascii_name_and_strips_version() {
        let record = build_record(100, 12, false, b"HELLO.TXT;1");
        let entry = parse_record(&record[..record[0] as usize], false);
        assert_eq!(entry.name.as_bytes(), b"HELLO.TXT");
        assert_eq!(&entry.extension, b"TXT");
        assert_eq!(entry.location, Location::Extent(100));
        assert_eq!(entry.size_bytes, 12);
    }

    #[test]
    fn parses_joliet_name_from_every_other_byte() {
        let mut name = [0u8; 8];
        for (i, ch) in b"abc.txt".iter().enumerate() {
            name[i * 2 + 1] = *ch;
        }
        let record = build_record(200, 4, false, &name[..7 * 2]);
        let entry = parse_record(&record[..record[0] as usize], true);
        assert_eq!(entry.name.as_bytes(), b"ABC.TXT");
    }

    #[test]
    fn detects_dot_and_dotdot_records() {
        let mut dot = [0u8; 34];
        dot[0] = 34;
        dot[32] = 1;
        dot[33] = 0x00;
        assert!(is_dot_record(&dot[..34]));

        let mut dotdot = dot;
        dotdot[33] = 0x01;
        assert!(is_dot_record(&dotdot[..34]));
    }
}
