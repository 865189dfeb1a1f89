//! The canonical, format-neutral directory entry (spec §3) shared by the
//! FAT and ISO directory iterators.

use bitflags::bitflags;

bitflags! {
    /// FAT attribute byte / ISO file-flag bits, normalized onto one bitset
    /// so `Navigator`/`Entry` consumers don't need to know which format an
    /// entry came from. Replaces the teacher's single-purpose
    /// `Attribute`/`AttributeSet` pair in `fat/dir.rs` (`other_examples/
    /// manifests/rafalh-rust-fatfs` uses this exact crate for the same
    /// problem in a `no_std` FAT driver).
    #[derive(Default)]
    pub struct Attributes: u8 {
        const READ_ONLY  = 0x01;
        const HIDDEN     = 0x02;
        const SYSTEM     = 0x04;
        const VOLUME_ID  = 0x08;
        const DIRECTORY  = 0x10;
        const ARCHIVE    = 0x20;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    VolumeLabel,
}

/// Coarse extension classification (spec §3, §4.13), used by
/// `Navigator::goto_next`'s extension filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Mp3,
    Wav,
    Sys,
    Dir,
    Other,
}

impl TypeTag {
    pub fn classify(kind: EntryKind, extension: &[u8]) -> Self {
        if kind == EntryKind::Directory {
            return TypeTag::Dir;
        }
        match extension {
            b"MP3" => TypeTag::Mp3,
            b"WAV" => TypeTag::Wav,
            b"SYS" => TypeTag::Sys,
            _ => TypeTag::Other,
        }
    }
}

bitflags! {
    /// Extension-filter bits for `Navigator::goto_next`/`goto_prev` (spec
    /// §4.9, §8 scenario S6) and `file_seek_prev`/`file_seek_next`'s `id`
    /// parameter (`original_source/.../FILE/FILE.C`).
    #[derive(Default)]
    pub struct TypeFilter: u8 {
        const MP3 = 0x01;
        const WAV = 0x02;
        const SYS = 0x04;
        const DIR = 0x08;
        const OTHER = 0x10;
        const ALL = Self::MP3.bits() | Self::WAV.bits() | Self::SYS.bits()
            | Self::DIR.bits() | Self::OTHER.bits();
    }
}

impl TypeTag {
    pub fn matches(&self, filter: TypeFilter) -> bool {
        let bit = match self {
            TypeTag::Mp3 => TypeFilter::MP3,
            TypeTag::Wav => TypeFilter::WAV,
            TypeTag::Sys => TypeFilter::SYS,
            TypeTag::Dir => TypeFilter::DIR,
            TypeTag::Other => TypeFilter::OTHER,
        };
        filter.contains(bit)
    }
}

/// Where a located entry's data lives: either a FAT cluster chain's first
/// cluster or an ISO9660 extent's first logical block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Cluster(u32),
    Extent(u32),
}

/// Fixed-capacity, UTF-8-as-ASCII name buffer (spec's `MAX_FILENAME_LEN`).
///
/// `PartialEq`/`Eq` compare `as_bytes()`, not the raw backing array: `clear()`
/// resets `len` without zeroing `buf`, so two names with the same visible
/// bytes can disagree past `len` if the buffer was previously longer.
#[derive(Debug, Clone)]
pub struct Name {
    buf: [u8; crate::config::MAX_FILENAME_LEN],
    len: usize,
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Name {}

impl Default for Name {
    fn default() -> Self {
        Self { buf: [0; crate::config::MAX_FILENAME_LEN], len: 0 }
    }
}

impl Name {
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn push(&mut self, b: u8) -> bool {
        if self.len >= self.buf.len() {
            return false;
        }
        self.buf[self.len] = b;
        self.len += 1;
        true
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn eq_ignore_case(&self, other: &[u8]) -> bool {
        self.as_bytes().eq_ignore_ascii_case(other)
    }
}

/// The canonical, format-neutral directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub kind: EntryKind,
    pub attributes: Attributes,
    pub name: Name,
    /// Upper-cased, up to 3 ASCII chars; empty for directories.
    pub extension: [u8; 3],
    pub location: Location,
    pub size_bytes: u32,
}

impl Entry {
    pub fn type_tag(&self) -> TypeTag {
        TypeTag::classify(self.kind, &self.extension)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }
}
