//! ISO9660/Joliet directory and file engine (spec §4.6).
//!
//! The teacher (`rrbutani-fatfs`) is FAT-only; this has no teacher
//! counterpart and is built fresh from spec §4.6 and
//! `original_source/.../FILE/ISO9660.C`, in `fat::dir`'s offset-parsing
//! style and `fat::file`'s cached-sector reading style, since ISO extents
//! are contiguous rather than cluster chains.

pub mod dir;
pub mod file;
