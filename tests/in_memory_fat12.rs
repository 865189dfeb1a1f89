//! Integration tests against a hand-built FAT12 image held in memory,
//! replacing the teacher's `tests/file_backed.rs` (which depended on the
//! unfetchable `storage-traits::FileBackedStorage` and only contained a
//! placeholder assertion that was never meant to pass). `VecDevice` below is
//! the `SectorDevice` impl `SPEC_FULL.md`'s test-tooling section calls for:
//! std-only, backed by a `Vec<u8>`, no partition-table/filesystem tooling
//! involved in building the image — every byte is laid out by hand so the
//! test exercises exactly the geometry math and cursor/navigator logic this
//! crate implements.
//!
//! Layout (512-byte sectors, partition starts at LBA 1):
//!   0      MBR, one partition entry (FAT12, relative_sector = 1)
//!   1      DBR / BPB
//!   2      FAT (1 sector, 1 FAT)
//!   3      root directory (16 entries)
//!   4      cluster 2: HELLO.TXT contents
//!   5      cluster 3: "long name.txt" contents
//!   6      cluster 4: SUBDIR's directory contents
//!   7      cluster 5: CHILD.TXT contents
//!   8..20  unused data clusters (free space for volume_inquiry)

use generic_array::GenericArray;
use typenum::consts::U512;

use volfs::storage::{ReadError, SectorDevice, WriteError};
use volfs::{Error, FsType, PlayTimeClock, SeekMode, TypeFilter};

const SECTOR: usize = 512;
// The partition itself only spans 20 sectors (declared in the DBR below),
// but `Geometry::mount` unconditionally probes for an ISO volume descriptor
// (once at raw LBA 64, once more at partition-relative sector 64 before
// falling back to FAT) before trusting the MBR/BPB; the backing image has
// to be big enough for both reads to succeed (as all-zero, i.e. not
// "CD001") even though nothing in the declared FAT geometry reaches that
// far.
const IMAGE_SECTORS: usize = 66;

struct VecDevice {
    data: Vec<u8>,
}

impl VecDevice {
    fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl SectorDevice for VecDevice {
    type SECTOR_SIZE = U512;
    type ReadErr = ();
    type WriteErr = ();

    fn read_bytes(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), ReadError<()>> {
        let end = offset + buffer.len();
        if end > self.data.len() {
            return Err(ReadError::OutOfRange { requested_offset: offset });
        }
        buffer.copy_from_slice(&self.data[offset..end]);
        Ok(())
    }

    fn write_sector(
        &mut self,
        _sector_idx: usize,
        _buffer: &GenericArray<u8, U512>,
    ) -> Result<(), WriteError<()>> {
        Err(WriteError::Other(()))
    }

    fn sector_count(&self) -> usize {
        self.data.len() / SECTOR
    }
}

fn sector_mut(image: &mut [u8], index: usize) -> &mut [u8] {
    &mut image[index * SECTOR..(index + 1) * SECTOR]
}

/// Packs `value` (12 bits) into cluster `cluster`'s FAT12 entry, preserving
/// the neighboring cluster's nibble the way real FAT12 tables share bytes
/// across odd/even cluster pairs. Callers must write clusters in ascending
/// order so each write's "preserve the other nibble" step sees bits already
/// written by its even/odd neighbor, not stale zeros.
fn set_fat12_entry(fat: &mut [u8], cluster: u32, value: u16) {
    let bit_offset = cluster as usize * 12;
    let byte_offset = bit_offset / 8;
    let value = value & 0x0FFF;
    if cluster % 2 == 0 {
        fat[byte_offset] = (value & 0xFF) as u8;
        let preserved_hi_nibble = fat[byte_offset + 1] & 0xF0;
        fat[byte_offset + 1] = preserved_hi_nibble | ((value >> 8) as u8 & 0x0F);
    } else {
        let preserved_lo_nibble = fat[byte_offset] & 0x0F;
        fat[byte_offset] = preserved_lo_nibble | (((value & 0x0F) as u8) << 4);
        fat[byte_offset + 1] = (value >> 4) as u8;
    }
}

fn write_short_entry(entry: &mut [u8], name8: &[u8; 8], ext3: &[u8; 3], attr: u8, cluster: u16, size: u32) {
    entry[0..8].copy_from_slice(name8);
    entry[8..11].copy_from_slice(ext3);
    entry[11] = attr;
    entry[20..22].copy_from_slice(&0u16.to_le_bytes());
    entry[26..28].copy_from_slice(&cluster.to_le_bytes());
    entry[28..32].copy_from_slice(&size.to_le_bytes());
}

/// Writes one VFAT LFN continuation record. `name` must be ASCII and at
/// most 13 bytes; shorter names are NUL/0xFFFF-padded per the VFAT
/// convention (only exercised by the exactly-13-byte case in this file, but
/// kept general since it costs nothing extra).
fn write_lfn_entry(entry: &mut [u8], ordinal: u8, last: bool, name: &[u8]) {
    entry[0] = ordinal | if last { 0x40 } else { 0x00 };
    entry[11] = 0x0F;
    const OFFSETS: [usize; 13] = [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];
    for (i, &offset) in OFFSETS.iter().enumerate() {
        let unit: u16 = if i < name.len() {
            name[i] as u16
        } else if i == name.len() {
            0x0000
        } else {
            0xFFFF
        };
        entry[offset..offset + 2].copy_from_slice(&unit.to_le_bytes());
    }
}

const HELLO_CONTENT: &[u8] = b"hello world\n";
const LONG_NAME: &[u8] = b"long name.txt";
const LONG_CONTENT: &[u8] = b"this is a long file\n";
const CHILD_CONTENT: &[u8] = b"child file\n";

fn build_fat12_image() -> Vec<u8> {
    let mut image = vec![0u8; IMAGE_SECTORS * SECTOR];

    // MBR (sector 0): one valid partition entry starting at LBA 1.
    {
        let mbr = sector_mut(&mut image, 0);
        let entry = &mut mbr[0x1BE..0x1BE + 16];
        entry[0] = 0x00; // boot_indicator
        entry[4] = 0x01; // system_id (FAT12)
        entry[8..12].copy_from_slice(&1u32.to_le_bytes()); // relative_sector
        entry[12..16].copy_from_slice(&20u32.to_le_bytes()); // total_sectors
        mbr[510] = 0xAA;
        mbr[511] = 0x55;
    }

    // DBR / BPB (sector 1, the partition's relative sector 0).
    {
        let dbr = sector_mut(&mut image, 1);
        dbr[0x0B..0x0D].copy_from_slice(&512u16.to_le_bytes()); // bytes_per_sector
        dbr[0x0D] = 1; // sectors_per_cluster
        dbr[0x0E..0x10].copy_from_slice(&1u16.to_le_bytes()); // reserved_sectors
        dbr[0x10] = 1; // fat_count
        dbr[0x11..0x13].copy_from_slice(&16u16.to_le_bytes()); // root_dir_entries
        dbr[0x13..0x15].copy_from_slice(&20u16.to_le_bytes()); // total_sectors_16
        dbr[0x16..0x18].copy_from_slice(&1u16.to_le_bytes()); // sectors_per_fat_16
        dbr[510] = 0xAA;
        dbr[511] = 0x55;
    }

    // FAT (sector 2): clusters 2-5 each a one-cluster end-of-chain file/dir;
    // everything past that is left zeroed (free).
    {
        let fat = sector_mut(&mut image, 2);
        for cluster in 2..=5u32 {
            set_fat12_entry(fat, cluster, 0x0FFF);
        }
    }

    // Root directory (sector 3).
    {
        let root = sector_mut(&mut image, 3);
        write_short_entry(&mut root[0..32], b"HELLO   ", b"TXT", 0x20, 2, HELLO_CONTENT.len() as u32);
        write_lfn_entry(&mut root[32..64], 1, true, LONG_NAME);
        write_short_entry(&mut root[64..96], b"LONGNA~1", b"TXT", 0x20, 3, LONG_CONTENT.len() as u32);
        write_short_entry(&mut root[96..128], b"SUBDIR  ", b"   ", 0x10, 4, 0);
        // Remaining entries stay zeroed: byte 0 == 0x00 is the
        // end-of-directory sentinel.
    }

    // Cluster 2: HELLO.TXT's data.
    sector_mut(&mut image, 4)[..HELLO_CONTENT.len()].copy_from_slice(HELLO_CONTENT);

    // Cluster 3: the long-named file's data.
    sector_mut(&mut image, 5)[..LONG_CONTENT.len()].copy_from_slice(LONG_CONTENT);

    // Cluster 4: SUBDIR's directory contents ("." / ".." / CHILD.TXT).
    {
        let subdir = sector_mut(&mut image, 6);
        write_short_entry(&mut subdir[0..32], b".       ", b"   ", 0x10, 4, 0);
        write_short_entry(&mut subdir[32..64], b"..      ", b"   ", 0x10, 0, 0);
        write_short_entry(&mut subdir[64..96], b"CHILD   ", b"TXT", 0x20, 5, CHILD_CONTENT.len() as u32);
    }

    // Cluster 5: CHILD.TXT's data.
    sector_mut(&mut image, 7)[..CHILD_CONTENT.len()].copy_from_slice(CHILD_CONTENT);

    image
}

fn mount() -> volfs::Filesystem<VecDevice> {
    let device = VecDevice::new(build_fat12_image());
    volfs::Filesystem::mount(device, 0).expect("mount should succeed against a well-formed FAT12 image")
}

fn read_all(fs: &mut volfs::Filesystem<VecDevice>, handle: volfs::FileHandle) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 7]; // deliberately not a divisor of any content length
    loop {
        let n = fs.read(handle, &mut buf).expect("read should succeed");
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    out
}

#[test]
fn mount_derives_fat12_geometry() {
    let fs = mount();
    let geometry = fs.geometry();
    assert_eq!(geometry.fs_type, FsType::Fat12);
    assert_eq!(geometry.total_sectors, 20);
    assert_eq!(geometry.sectors_per_cluster, 1);
    assert_eq!(geometry.root_dir_entries, 16);
    assert_eq!(fs.current_path(), "C:\\");
}

#[test]
fn enumerate_folder_lists_root_entries_with_lfn_reconstructed() {
    let mut fs = mount();
    let mut names = Vec::new();
    loop {
        match fs.enumerate_folder(false) {
            Ok((entry, _attrs)) => names.push(entry.name.as_bytes().to_vec()),
            Err(Error::EndOfDirectory) => break,
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
    assert_eq!(
        names,
        vec![b"HELLO.TXT".to_vec(), LONG_NAME.to_vec(), b"SUBDIR".to_vec()],
    );
}

#[test]
fn open_and_read_short_name_file() {
    let mut fs = mount();
    let handle = fs.open("HELLO.TXT").expect("HELLO.TXT should resolve");
    assert_eq!(read_all(&mut fs, handle), HELLO_CONTENT);
}

#[test]
fn open_resolves_reconstructed_long_name() {
    let mut fs = mount();
    let handle = fs.open("long name.txt").expect("reconstructed LFN should resolve");
    assert_eq!(read_all(&mut fs, handle), LONG_CONTENT);
}

#[test]
fn open_is_case_insensitive() {
    let mut fs = mount();
    let handle = fs.open("hello.txt").expect("path match should ignore case");
    assert_eq!(read_all(&mut fs, handle), HELLO_CONTENT);
}

#[test]
fn seek_absolute_is_idempotent() {
    let mut fs = mount();
    let handle = fs.open("HELLO.TXT").unwrap();

    let first_pass = read_all(&mut fs, handle);
    fs.seek(handle, SeekMode::Absolute, 0).unwrap();
    let second_pass = read_all(&mut fs, handle);

    assert_eq!(first_pass, second_pass);
    assert_eq!(first_pass, HELLO_CONTENT);
}

#[test]
fn eof_holds_once_every_byte_is_read() {
    let mut fs = mount();
    let handle = fs.open("HELLO.TXT").unwrap();

    assert!(!fs.eof(handle).unwrap());
    read_all(&mut fs, handle);
    assert!(fs.eof(handle).unwrap());

    let mut buf = [0u8; 4];
    assert_eq!(fs.read(handle, &mut buf).unwrap(), 0);
}

#[test]
fn seek_past_end_clamps_to_size_and_sets_eof() {
    let mut fs = mount();
    let handle = fs.open("HELLO.TXT").unwrap();

    let pos = fs.seek(handle, SeekMode::Absolute, 10_000).unwrap();
    assert_eq!(pos, HELLO_CONTENT.len() as u64);
    assert!(fs.eof(handle).unwrap());
}

#[test]
fn cd_into_subdir_and_back_updates_current_path_and_listing() {
    let mut fs = mount();

    fs.cd("SUBDIR", false).expect("SUBDIR should resolve as a directory");
    assert_eq!(fs.current_path(), "C:\\SUBDIR");

    let (entry, _) = fs.enumerate_folder(false).expect("CHILD.TXT should be the only entry");
    assert_eq!(entry.name.as_bytes(), b"CHILD.TXT");
    assert!(matches!(fs.enumerate_folder(false), Err(Error::EndOfDirectory)));

    fs.cd("", true).expect("cd('..') should succeed from a first-level subdirectory");
    assert_eq!(fs.current_path(), "C:\\");

    let handle = fs.open("SUBDIR\\CHILD.TXT").expect("nested relative path should resolve");
    assert_eq!(read_all(&mut fs, handle), CHILD_CONTENT);
}

#[test]
fn enumerate_disk_walks_the_whole_tree_depth_first() {
    let mut fs = mount();
    fs.enumerate_disk_reset().unwrap();

    let mut names = Vec::new();
    while let Some((entry, _attrs)) = fs.enumerate_disk_next().unwrap() {
        names.push(entry.name.as_bytes().to_vec());
    }

    assert_eq!(
        names,
        vec![
            b"HELLO.TXT".to_vec(),
            LONG_NAME.to_vec(),
            b"SUBDIR".to_vec(),
            b"CHILD.TXT".to_vec(),
        ],
    );
}

#[test]
fn volume_inquiry_reports_total_and_free_sectors() {
    let mut fs = mount();
    // 17 data clusters total (count_of_clusters), 4 in use (HELLO.TXT,
    // the long-named file, SUBDIR, CHILD.TXT), 1 sector per cluster.
    assert_eq!(fs.volume_inquiry().unwrap(), (20, 13));
}

#[test]
fn goto_next_extension_filter_finds_only_directories() {
    let mut fs = mount();
    assert!(fs.goto_first(TypeFilter::DIR).unwrap());
    assert_eq!(fs.current_entry().unwrap().name.as_bytes(), b"SUBDIR");
    assert!(!fs.goto_next(TypeFilter::DIR).unwrap());
}

struct FixedClock {
    minutes: u8,
    seconds: u8,
}

impl PlayTimeClock for FixedClock {
    fn elapsed_minutes(&self) -> u8 {
        self.minutes
    }
    fn elapsed_seconds(&self) -> u8 {
        self.seconds
    }
}

#[test]
fn file_seek_prev_restarts_instead_of_seeking_when_recently_started() {
    let mut fs = mount();
    assert!(fs.goto_first(TypeFilter::ALL).unwrap());
    assert_eq!(fs.current_entry().unwrap().name.as_bytes(), b"HELLO.TXT");
    assert!(fs.goto_next(TypeFilter::ALL).unwrap());
    assert_eq!(fs.current_entry().unwrap().name.as_bytes(), LONG_NAME);

    // Past F_SEEK_TIME within the first minute: restart in place.
    let past_threshold = FixedClock { minutes: 0, seconds: 5 };
    assert!(fs.file_seek_prev(TypeFilter::ALL, &past_threshold).unwrap());
    assert_eq!(fs.current_entry().unwrap().name.as_bytes(), LONG_NAME);

    // Still early: behaves like a real goto_prev.
    let before_threshold = FixedClock { minutes: 0, seconds: 1 };
    assert!(fs.file_seek_prev(TypeFilter::ALL, &before_threshold).unwrap());
    assert_eq!(fs.current_entry().unwrap().name.as_bytes(), b"HELLO.TXT");
}

#[test]
fn open_unknown_drive_letter_is_not_found() {
    let mut fs = mount();
    assert!(matches!(fs.open("D:\\HELLO.TXT"), Err(Error::NotFound)));
}

#[test]
fn too_many_open_files_is_rejected() {
    let mut fs = mount();
    let mut handles = Vec::new();
    for _ in 0..volfs::config::MAX_OPEN_FILES {
        handles.push(fs.open("HELLO.TXT").unwrap());
    }
    assert!(matches!(fs.open("HELLO.TXT"), Err(Error::TooManyOpenFiles)));

    fs.close(handles.pop().unwrap());
    assert!(fs.open("HELLO.TXT").is_ok());
}
