//! FAT chain walker and fixed-capacity fragment cache (spec §4.4).
//!
//! Grounded on the teacher's `FatEntryTracer` (an `Iterator` that walks a
//! cluster chain one FAT lookup at a time, caching the last FAT sector it
//! read) and `cluster_idx_to_fat_sector_and_offset`/
//! `cluster_to_sector_range`. Cleaned of `dbg!()` artifacts and the write
//! path (`grow_file`, `FatEntryWrapper::write`) since spec §1 marks FAT32
//! free-cluster-hint writeback out of scope. Extended to FAT12/16-width
//! entries (the teacher only modeled FAT32's 4-byte entries).

use core::ops::Range;

use generic_array::GenericArray;
use typenum::consts::U512;

use crate::config::{MAX_DIR_FRAGMENT_NUMBER, MAX_FILE_FRAGMENT_NUMBER};
use crate::error::Error;
use crate::geometry::{FsType, Geometry};
use crate::storage::SectorDevice;

pub type Cluster = u32;
pub type Sector = u64;

const END_OF_CHAIN_FAT12: u32 = 0x0FF8;
const END_OF_CHAIN_FAT16: u32 = 0xFFF8;
const END_OF_CHAIN_FAT32: u32 = 0x0FFF_FFF8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextCluster {
    Cluster(Cluster),
    EndOfChain,
    Bad,
}

/// Reads the single raw FAT entry for `cluster`, masked to the volume's
/// entry width but otherwise uninterpreted: `0` means free, `>=` the
/// format's end-of-chain threshold means end-of-chain, anything else is a
/// cluster number. Shared by `next_cluster` and `is_free_cluster`.
fn read_raw_entry<D: SectorDevice<SECTOR_SIZE = U512>>(
    device: &mut D,
    geometry: &Geometry,
    cluster: Cluster,
) -> Result<u32, Error<D::ReadErr>> {
    let (sector, byte_offset) = fat_sector_and_offset(geometry, cluster);

    let mut buf: GenericArray<u8, U512> = GenericArray::default();
    device.read_sector(sector as usize, &mut buf)?;

    Ok(match geometry.fs_type {
        FsType::Fat12 => {
            // A 12-bit entry can straddle a sector boundary; re-read the
            // next sector's first byte when it does.
            let lo = buf[byte_offset as usize] as u32;
            let hi = if (byte_offset as usize) + 1 < 512 {
                buf[byte_offset as usize + 1] as u32
            } else {
                let mut next_buf: GenericArray<u8, U512> = GenericArray::default();
                device.read_sector(sector as usize + 1, &mut next_buf)?;
                next_buf[0] as u32
            };
            let word = lo | (hi << 8);
            if cluster % 2 == 0 {
                word & 0x0FFF
            } else {
                word >> 4
            }
        }
        FsType::Fat16 => {
            u16::from_le_bytes([buf[byte_offset as usize], buf[byte_offset as usize + 1]]) as u32
        }
        FsType::Fat32 => {
            u32::from_le_bytes([
                buf[byte_offset as usize],
                buf[byte_offset as usize + 1],
                buf[byte_offset as usize + 2],
                buf[byte_offset as usize + 3],
            ]) & 0x0FFF_FFFF
        }
        FsType::Iso9660 | FsType::Joliet => 0,
    })
}

/// `next_cluster(current)` (spec §4.4). Reads the single FAT entry for
/// `current` according to the volume's FAT width.
pub fn next_cluster<D: SectorDevice<SECTOR_SIZE = U512>>(
    device: &mut D,
    geometry: &Geometry,
    current: Cluster,
) -> Result<NextCluster, Error<D::ReadErr>> {
    if matches!(geometry.fs_type, FsType::Iso9660 | FsType::Joliet) {
        return Ok(NextCluster::Bad);
    }

    let raw = read_raw_entry(device, geometry, current)?;

    let end_of_chain = match geometry.fs_type {
        FsType::Fat12 => raw >= END_OF_CHAIN_FAT12,
        FsType::Fat16 => raw >= END_OF_CHAIN_FAT16,
        FsType::Fat32 => raw >= END_OF_CHAIN_FAT32,
        FsType::Iso9660 | FsType::Joliet => unreachable!(),
    };

    if raw == 0 {
        Ok(NextCluster::Bad)
    } else if end_of_chain {
        Ok(NextCluster::EndOfChain)
    } else {
        Ok(NextCluster::Cluster(raw))
    }
}

/// `volume_inquiry`'s free-space scan (spec §6): a cluster is free iff its
/// raw FAT entry is exactly `0`. Distinct from `next_cluster`'s `Bad`,
/// which also covers entries that are nonzero but neither a valid cluster
/// number nor an end-of-chain marker.
pub fn is_free_cluster<D: SectorDevice<SECTOR_SIZE = U512>>(
    device: &mut D,
    geometry: &Geometry,
    cluster: Cluster,
) -> Result<bool, Error<D::ReadErr>> {
    Ok(read_raw_entry(device, geometry, cluster)? == 0)
}

fn fat_sector_and_offset(geometry: &Geometry, cluster: Cluster) -> (Sector, u32) {
    let bit_width = match geometry.fs_type {
        FsType::Fat12 => 12,
        FsType::Fat16 => 16,
        FsType::Fat32 | FsType::Iso9660 | FsType::Joliet => 32,
    };
    let bit_offset = cluster as u64 * bit_width;
    let sector = geometry.first_fat_sector as u64 + (bit_offset / 8) / 512;
    let byte_offset = ((bit_offset / 8) % 512) as u32;
    (sector, byte_offset)
}

/// A contiguous run of clusters; adjacent clusters discovered while walking
/// a chain are coalesced into one fragment (spec §3's fragment-cache
/// invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub start_cluster: Cluster,
    pub run_length_clusters: u32,
}

/// Fixed-capacity cluster-chain fragment cache ("Fragment cache →
/// fixed-capacity arena", spec §9). `N` is `MAX_DIR_FRAGMENT_NUMBER` or
/// `MAX_FILE_FRAGMENT_NUMBER`; no heap allocation is used.
#[derive(Debug, Clone)]
pub struct FragmentCache<const N: usize> {
    fragments: [Fragment; N],
    len: usize,
    /// Set once the chain is fully walked without hitting the cap.
    complete: bool,
}

impl<const N: usize> Default for FragmentCache<N> {
    fn default() -> Self {
        Self {
            fragments: [Fragment { start_cluster: 0, run_length_clusters: 0 }; N],
            len: 0,
            complete: false,
        }
    }
}

impl<const N: usize> FragmentCache<N> {
    /// Walks the chain starting at `first_cluster`, filling the cache up to
    /// its capacity. Returns once the cache is full (leaving `complete =
    /// false`, i.e. `partial`) or the chain ends.
    pub fn build<D: SectorDevice<SECTOR_SIZE = U512>>(
        device: &mut D,
        geometry: &Geometry,
        first_cluster: Cluster,
    ) -> Result<Self, Error<D::ReadErr>> {
        let mut cache = Self::default();
        if first_cluster < 2 {
            cache.complete = true;
            return Ok(cache);
        }

        let mut current = first_cluster;
        loop {
            if cache.len == 0 {
                cache.fragments[0] = Fragment { start_cluster: current, run_length_clusters: 1 };
                cache.len = 1;
            } else {
                let last = &mut cache.fragments[cache.len - 1];
                if last.start_cluster + last.run_length_clusters == current {
                    last.run_length_clusters += 1;
                } else if cache.len < N {
                    cache.fragments[cache.len] = Fragment { start_cluster: current, run_length_clusters: 1 };
                    cache.len += 1;
                } else {
                    // Cache is full and this cluster doesn't extend the last
                    // fragment: stop early, leave `partial`.
                    return Ok(cache);
                }
            }

            match next_cluster(device, geometry, current)? {
                NextCluster::Cluster(next) => current = next,
                NextCluster::EndOfChain => {
                    cache.complete = true;
                    return Ok(cache);
                }
                NextCluster::Bad => {
                    log::warn!("FAT chain starting at cluster {} hit a bad entry", first_cluster);
                    cache.complete = true;
                    return Ok(cache);
                }
            }
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.complete
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments[..self.len]
    }

    /// Maps a zero-based cluster ordinal within the chain to the actual
    /// cluster number, consulting only the cached prefix. `None` means the
    /// ordinal lies past the cached fragments; the caller must fall back to
    /// `next_cluster` from the last cached cluster (`NoFragmentBudget`).
    pub fn cluster_at_ordinal(&self, ordinal: u32) -> Option<Cluster> {
        let mut remaining = ordinal;
        for fragment in self.fragments() {
            if remaining < fragment.run_length_clusters {
                return Some(fragment.start_cluster + remaining);
            }
            remaining -= fragment.run_length_clusters;
        }
        None
    }

    /// Total cluster count covered by the cached fragments (not necessarily
    /// the whole chain if `is_partial()`).
    pub fn cached_cluster_count(&self) -> u32 {
        self.fragments().iter().map(|f| f.run_length_clusters).sum()
    }

    pub fn last_cached_cluster(&self) -> Option<Cluster> {
        self.fragments().last().map(|f| f.start_cluster + f.run_length_clusters - 1)
    }

    /// Resolves a cluster ordinal, falling back to a single-step FAT walk
    /// from the last cached cluster when the ordinal lies past the cached
    /// prefix. Per spec §7, `NoFragmentBudget` is "not fatal" — the cursor
    /// still works, it just costs an extra chain walk — so this only
    /// surfaces a hard error when the chain itself is exhausted or broken
    /// before reaching `ordinal`.
    pub fn resolve_cluster<D: SectorDevice<SECTOR_SIZE = U512>>(
        &self,
        device: &mut D,
        geometry: &Geometry,
        ordinal: u32,
    ) -> Result<Cluster, Error<D::ReadErr>> {
        if let Some(cluster) = self.cluster_at_ordinal(ordinal) {
            return Ok(cluster);
        }

        let cached_count = self.cached_cluster_count();
        let mut current = self.last_cached_cluster().ok_or(Error::NoFragmentBudget)?;
        let steps = ordinal - cached_count + 1;
        log::warn!(
            "fragment cache exhausted at ordinal {} (cached {}); falling back to a FAT walk",
            ordinal,
            cached_count,
        );

        for _ in 0..steps {
            match next_cluster(device, geometry, current)? {
                NextCluster::Cluster(next) => current = next,
                NextCluster::EndOfChain | NextCluster::Bad => return Err(Error::NoFragmentBudget),
            }
        }
        Ok(current)
    }
}

pub type DirFragmentCache = FragmentCache<MAX_DIR_FRAGMENT_NUMBER>;
pub type FileFragmentCache = FragmentCache<MAX_FILE_FRAGMENT_NUMBER>;

pub fn cluster_to_sector_range(geometry: &Geometry, cluster: Cluster) -> Range<Sector> {
    let start = geometry.first_sector_of_cluster(cluster) as Sector;
    start..(start + geometry.sectors_per_cluster as Sector)
}
