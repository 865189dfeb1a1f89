//! Partition & BPB/volume-descriptor loader (spec §4.3).
//!
//! Parses the MBR, falls back to a bare DBR when there's no valid partition
//! table (the removable-media case `original_source/FAT.C`'s
//! `Read_partition_PBP` handles), then reads either a FAT BPB or an
//! ISO9660/Joliet volume descriptor and derives the rest of the geometry
//! spec §3 lists. Follows the teacher's `e!`-macro offset-parsing style
//! from `fat/boot_sector.rs`.

use core::convert::TryInto;

use generic_array::GenericArray;
use typenum::consts::U512;

use crate::error::Error;
use crate::storage::SectorDevice;

macro_rules! e {
    ($ty:tt, $buf:expr, $offset:literal) => {
        $ty::from_le_bytes($buf[$offset..($offset + core::mem::size_of::<$ty>())].try_into().unwrap())
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsType {
    Fat12,
    Fat16,
    Fat32,
    Iso9660,
    Joliet,
}

/// One MBR partition table entry (spec §4.3 step 1 / §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MbrPartitionEntry {
    pub boot_indicator: u8,
    pub system_id: u8,
    pub relative_sector: u32,
    pub total_sectors: u32,
}

impl MbrPartitionEntry {
    fn is_valid(&self) -> bool {
        matches!(self.boot_indicator, 0x00 | 0x80) && self.system_id != 0
    }

    fn parse(buf: &[u8]) -> Self {
        Self {
            boot_indicator: buf[0],
            system_id: buf[4],
            relative_sector: e!(u32, buf, 8),
            total_sectors: e!(u32, buf, 12),
        }
    }
}

/// Volume geometry, derived once per mount and never mutated thereafter
/// (spec §3's first lifecycle rule).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub fs_type: FsType,
    pub partition_start_lba: u32,

    // FAT fields; unused (zeroed) for ISO9660/Joliet.
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub fat_count: u8,
    pub sectors_per_fat: u32,
    pub root_dir_entries: u16,
    pub total_sectors: u32,

    pub first_fat_sector: u32,
    pub first_data_sector: u32,
    pub first_root_sector: u32,
    pub root_dir_sectors: u32,
    pub count_of_clusters: u32,
    pub root_cluster: u32,

    // ISO fields; unused (zeroed) for FAT.
    pub logical_block_size: u16,
    pub root_extent_start: u32,
    pub root_extent_size: u32,
}

impl Geometry {
    /// `mount(partition_index)` (spec §4.3, §6).
    pub fn mount<D: SectorDevice<SECTOR_SIZE = U512>>(
        device: &mut D,
        partition_index: u8,
    ) -> Result<Self, Error<D::ReadErr>> {
        // A bare ISO9660/Joliet image carries no partition table at all —
        // its first 16 sectors are an all-zero system area, so LBA 0 never
        // has the `0x55AA` MBR signature `read_mbr` requires (`ISO9660.C`'s
        // `iso_install` detects ISO on a path that never reads an MBR).
        // Probe for `CD001` at raw LBA 64 before requiring that signature,
        // so plain ISO media mounts even without a partition table.
        if Self::looks_like_iso(device, 0)? {
            return Self::read_iso_volume(device, 0);
        }

        let mut sector: GenericArray<u8, U512> = GenericArray::default();
        device.read_sector(0, &mut sector)?;

        let partition = Self::read_mbr(&sector, partition_index).map_err(lift_err)?;

        if Self::looks_like_iso(device, partition.relative_sector)? {
            return Self::read_iso_volume(device, partition.relative_sector);
        }

        let mut dbr: GenericArray<u8, U512> = GenericArray::default();
        device
            .read_sector(partition.relative_sector as usize, &mut dbr)
            ?;

        Self::read_fat_bpb(&dbr, partition.relative_sector).map_err(lift_err)
    }

    fn read_mbr(sector: &[u8], partition_index: u8) -> Result<MbrPartitionEntry, Error<()>> {
        let signature = e!(u16, sector, 510);
        if signature != 0x55AA {
            // No MBR signature at all: nothing sane to fall back to.
            return Err(Error::InvalidFormat);
        }

        let offset = 0x1BE + 16 * (partition_index as usize);
        let candidate = MbrPartitionEntry::parse(&sector[offset..offset + 16]);

        if candidate.is_valid() {
            return Ok(candidate);
        }

        // Edge case (spec §4.3 step 2): a signature with no valid partition
        // entry means this is actually a bare DBR at LBA 0, not an MBR.
        if partition_index == 0 {
            Ok(MbrPartitionEntry {
                boot_indicator: 0x00,
                system_id: 0x06,
                relative_sector: 0,
                total_sectors: 0,
            })
        } else {
            Err(Error::NotFound)
        }
    }

    fn looks_like_iso<D: SectorDevice<SECTOR_SIZE = U512>>(
        device: &mut D,
        partition_start: u32,
    ) -> Result<bool, Error<D::ReadErr>> {
        let mut sector: GenericArray<u8, U512> = GenericArray::default();
        // ISO volume descriptors start at sector 16 of the partition; 512
        // byte sectors mean a 2048 byte logical block spans 4 sectors.
        let candidate_lba = partition_start as usize + 16 * 4;
        device.read_sector(candidate_lba, &mut sector)?;
        Ok(&sector[1..6] == b"CD001")
    }

    fn read_fat_bpb(dbr: &[u8], partition_start: u32) -> Result<Self, Error<()>> {
        let signature = e!(u16, dbr, 510);
        if signature != 0x55AA {
            return Err(Error::InvalidFormat);
        }

        let bytes_per_sector: u16 = e!(u16, dbr, 0x0B);
        let sectors_per_cluster: u8 = dbr[0x0D];
        let reserved_sectors: u16 = e!(u16, dbr, 0x0E);
        let fat_count: u8 = dbr[0x10];
        let root_dir_entries: u16 = e!(u16, dbr, 0x11);
        let total_sectors_16: u16 = e!(u16, dbr, 0x13);
        let sectors_per_fat_16: u16 = e!(u16, dbr, 0x16);
        let total_sectors_32: u32 = e!(u32, dbr, 0x20);
        let sectors_per_fat_32: u32 = e!(u32, dbr, 0x24);
        let root_cluster_32: u32 = e!(u32, dbr, 0x2C);

        if bytes_per_sector != 512 {
            return Err(Error::InvalidFormat);
        }

        let total_sectors = if total_sectors_16 != 0 {
            total_sectors_16 as u32
        } else {
            total_sectors_32
        };

        let sectors_per_fat = if sectors_per_fat_16 != 0 {
            sectors_per_fat_16 as u32
        } else {
            sectors_per_fat_32
        };

        let root_dir_sectors =
            ((root_dir_entries as u32 * 32) + (bytes_per_sector as u32 - 1)) / (bytes_per_sector as u32);

        let first_fat_sector = partition_start + reserved_sectors as u32;
        let first_root_sector = first_fat_sector + (fat_count as u32 * sectors_per_fat);
        let first_data_sector = first_root_sector + root_dir_sectors;

        let data_sectors = total_sectors.saturating_sub(
            reserved_sectors as u32 + fat_count as u32 * sectors_per_fat + root_dir_sectors,
        );
        let count_of_clusters = if sectors_per_cluster == 0 {
            0
        } else {
            data_sectors / sectors_per_cluster as u32
        };

        let fs_type = if root_dir_entries != 0 {
            if count_of_clusters < 4085 {
                FsType::Fat12
            } else {
                FsType::Fat16
            }
        } else {
            FsType::Fat32
        };

        Ok(Self {
            fs_type,
            partition_start_lba: partition_start,
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            fat_count,
            sectors_per_fat,
            root_dir_entries,
            total_sectors,
            first_fat_sector,
            first_data_sector,
            first_root_sector,
            root_dir_sectors,
            count_of_clusters,
            root_cluster: if matches!(fs_type, FsType::Fat32) { root_cluster_32 } else { 0 },
            logical_block_size: 0,
            root_extent_start: 0,
            root_extent_size: 0,
        })
    }

    /// Walks volume descriptor types 0..255 starting at partition sector 16
    /// (in 2048-byte logical blocks), preferring a Supplementary VD
    /// (Joliet) over a Primary VD (spec §4.3 step 5).
    fn read_iso_volume<D: SectorDevice<SECTOR_SIZE = U512>>(
        device: &mut D,
        partition_start: u32,
    ) -> Result<Self, Error<D::ReadErr>> {
        let mut pvd_found: Option<Self> = None;
        let mut svd_found: Option<Self> = None;

        for vd_index in 0..256u32 {
            let lba = partition_start as usize + (16 + vd_index) as usize * 4;
            let mut block = [0u8; 2048];
            for quarter in 0..4 {
                let mut sector: GenericArray<u8, U512> = GenericArray::default();
                device.read_sector(lba + quarter, &mut sector)?;
                block[quarter * 512..(quarter + 1) * 512].copy_from_slice(&sector);
            }

            if &block[1..6] != b"CD001" {
                break;
            }

            let descriptor_type = block[0];
            match descriptor_type {
                0xFF => break,
                1 => {
                    if pvd_found.is_none() {
                        pvd_found = Some(Self::parse_iso_descriptor(&block, partition_start, FsType::Iso9660));
                    }
                }
                2 => {
                    if svd_found.is_none() {
                        svd_found = Some(Self::parse_iso_descriptor(&block, partition_start, FsType::Joliet));
                    }
                }
                _ => {}
            }
        }

        svd_found.or(pvd_found).ok_or(Error::InvalidFormat)
    }

    fn parse_iso_descriptor(block: &[u8; 2048], partition_start: u32, fs_type: FsType) -> Self {
        let logical_block_size: u16 = e!(u16, block, 128);
        let root_record = &block[156..156 + 34];
        let root_extent_start: u32 = e!(u32, root_record, 2);
        let root_extent_size: u32 = e!(u32, root_record, 10);

        Self {
            fs_type,
            partition_start_lba: partition_start,
            bytes_per_sector: 0,
            sectors_per_cluster: 0,
            reserved_sectors: 0,
            fat_count: 0,
            sectors_per_fat: 0,
            root_dir_entries: 0,
            total_sectors: 0,
            first_fat_sector: 0,
            first_data_sector: 0,
            first_root_sector: 0,
            root_dir_sectors: 0,
            count_of_clusters: 0,
            root_cluster: 0,
            logical_block_size,
            root_extent_start,
            root_extent_size,
        }
    }

    pub fn is_fat(&self) -> bool {
        matches!(self.fs_type, FsType::Fat12 | FsType::Fat16 | FsType::Fat32)
    }

    pub fn first_sector_of_cluster(&self, cluster: u32) -> u32 {
        self.first_data_sector + (cluster - 2) * self.sectors_per_cluster as u32
    }

    /// Logical-block index to absolute 512-byte sector index, for ISO.
    pub fn iso_lba_to_sector(&self, lba: u32) -> u32 {
        self.partition_start_lba + lba * (self.logical_block_size as u32 / 512).max(1)
    }
}

// `Geometry::mount` composes helpers returning `Error<()>` internally (MBR
// parsing has no device error of its own) with ones returning `Error<D::
// ReadErr>`; this converts between them at the call boundary.
fn lift_err<E>(e: Error<()>) -> Error<E> {
    match e {
        Error::Io(()) => Error::InvalidFormat,
        Error::InvalidFormat => Error::InvalidFormat,
        Error::NotFound => Error::NotFound,
        Error::NotADirectory => Error::NotADirectory,
        Error::NotAFile => Error::NotAFile,
        Error::PathTooLong => Error::PathTooLong,
        Error::EndOfDirectory => Error::EndOfDirectory,
        Error::EndOfFile => Error::EndOfFile,
        Error::NoFragmentBudget => Error::NoFragmentBudget,
        Error::NoMatchingFiles => Error::NoMatchingFiles,
        Error::TooManyOpenFiles => Error::TooManyOpenFiles,
    }
}
