//! Compile-time tunables.
//!
//! Kept as plain associated constants rather than a runtime config object,
//! mirroring how the rest of this crate treats capacity limits.

/// Maximum number of {start_cluster, run_length} fragments cached per open
/// directory before the cache is marked `partial` and falls back to the FAT.
pub const MAX_DIR_FRAGMENT_NUMBER: usize = 16;

/// Maximum number of fragments cached per open file.
pub const MAX_FILE_FRAGMENT_NUMBER: usize = 32;

/// Maximum path length, including the drive letter and separators.
pub const MAX_PATH: usize = 260;

/// Maximum reconstructed long-filename length, in UCS-2 code units.
pub const MAX_FILENAME_LEN: usize = 255;

/// Maximum number of simultaneously open file handles.
pub const MAX_OPEN_FILES: usize = 4;

/// Maximum depth `enumerate_disk`'s explicit directory stack will track.
pub const MAX_WALK_DEPTH: usize = MAX_PATH / 2;

/// Seconds into the current file's play time below which `file_seek_prev`
/// restarts the current file instead of truly seeking backwards.
pub const F_SEEK_TIME: u8 = 4;
