//! `File Cursor::seek` mode (spec §4.8, §6's `Seek` parameter).

/// Whether a `seek` offset is measured from the start of the file or from
/// the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    Absolute,
    Relative,
}
