//! ISO9660/Joliet file cursor (spec §4.8).
//!
//! ISO extents are contiguous, so `seek` is O(1) (`target_sector =
//! extent_start + target / logical_block_size`, spec §4.8) — no fragment
//! cache is needed, unlike `fat::file::FatFileCursor`.

use generic_array::GenericArray;
use typenum::consts::U512;

use crate::error::Error;
use crate::geometry::Geometry;
use crate::seek::SeekMode;
use crate::storage::SectorDevice;

pub struct IsoFileCursor {
    start_sector: u64,
    size_bytes: u32,
    byte_offset: u32,
    cached_sector: Option<u64>,
    buf: GenericArray<u8, U512>,
}

impl IsoFileCursor {
    pub fn open(geometry: &Geometry, extent_lba: u32, size_bytes: u32) -> Self {
        Self {
            start_sector: geometry.iso_lba_to_sector(extent_lba) as u64,
            size_bytes,
            byte_offset: 0,
            cached_sector: None,
            buf: GenericArray::default(),
        }
    }

    pub fn size_bytes(&self) -> u32 {
        self.size_bytes
    }

    pub fn position(&self) -> u32 {
        self.byte_offset
    }

    pub fn eof(&self) -> bool {
        self.byte_offset >= self.size_bytes
    }

    pub fn seek(&mut self, mode: SeekMode, offset: i64) -> u64 {
        let base = match mode {
            SeekMode::Absolute => 0i64,
            SeekMode::Relative => self.byte_offset as i64,
        };
        let target = (base + offset).clamp(0, self.size_bytes as i64);
        self.byte_offset = target as u32;
        self.byte_offset as u64
    }

    pub fn read_byte<D: SectorDevice<SECTOR_SIZE = U512>>(
        &mut self,
        device: &mut D,
    ) -> Result<u8, Error<D::ReadErr>> {
        if self.eof() {
            return Err(Error::EndOfFile);
        }

        let sector = self.start_sector + (self.byte_offset / 512) as u64;
        if self.cached_sector != Some(sector) {
            device.read_sector(sector as usize, &mut self.buf)?;
            self.cached_sector = Some(sector);
        }

        let byte = self.buf[(self.byte_offset % 512) as usize];
        self.byte_offset += 1;
        Ok(byte)
    }

    pub fn read<D: SectorDevice<SECTOR_SIZE = U512>>(
        &mut self,
        device: &mut D,
        out: &mut [u8],
    ) -> Result<usize, Error<D::ReadErr>> {
        let mut n = 0;
        while n < out.len() && !self.eof() {
            out[n] = self.read_byte(device)?;
            n += 1;
        }
        Ok(n)
    }
}
