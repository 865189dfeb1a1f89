//! Error taxonomy (spec §7), following the teacher's `ReadError<T>`/
//! `WriteError<T>` generic-wrapping pattern in `storage.rs`: `Display` is
//! always available, `std::error::Error` is gated behind the `no_std`
//! feature via the crate's `using_std!` macro.

use core::fmt::{self, Debug, Display};

/// Top-level error type, generic over the backing `SectorDevice`'s own
/// error type so device failures round-trip without being swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error<D> {
    /// The sector device failed to service a read or write.
    Io(D),
    /// A signature mismatch, unrecognized volume descriptor type, or
    /// otherwise impossible geometry.
    InvalidFormat,
    /// A path segment was absent from its parent directory.
    NotFound,
    /// The operation required a directory but the entry is a file.
    NotADirectory,
    /// The operation required a file but the entry is a directory.
    NotAFile,
    /// The path exceeds `config::MAX_PATH`.
    PathTooLong,
    /// The directory cursor is exhausted; used as a control signal by
    /// iterators, not necessarily a hard failure.
    EndOfDirectory,
    /// The file cursor has reached `size_bytes`.
    EndOfFile,
    /// The fragment cache filled before the full chain was walked; the
    /// cursor still works (it falls back to the FAT) but lookups past the
    /// cached prefix cost an extra chain walk.
    NoFragmentBudget,
    /// `Navigator::goto_child` entered a directory but no entry inside it
    /// matched the caller's extension filter; the parent directory is left
    /// active (spec §4.9).
    NoMatchingFiles,
    /// `Filesystem::open` was called with `config::MAX_OPEN_FILES` handles
    /// already outstanding. Not one of spec §7's nine named kinds, but
    /// `config::MAX_OPEN_FILES` (spec §6) needs a defined failure mode when
    /// exceeded.
    TooManyOpenFiles,
}

impl<D: Debug> Display for Error<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "sector device error: {:?}", e),
            Error::InvalidFormat => write!(f, "invalid on-disk format"),
            Error::NotFound => write!(f, "path segment not found"),
            Error::NotADirectory => write!(f, "entry is not a directory"),
            Error::NotAFile => write!(f, "entry is not a file"),
            Error::PathTooLong => write!(f, "path exceeds the maximum length"),
            Error::EndOfDirectory => write!(f, "directory cursor exhausted"),
            Error::EndOfFile => write!(f, "file cursor at end of file"),
            Error::NoFragmentBudget => write!(f, "fragment cache exhausted, falling back to FAT"),
            Error::NoMatchingFiles => write!(f, "no entry in this directory matches the filter"),
            Error::TooManyOpenFiles => write!(f, "too many open files"),
        }
    }
}

crate::using_std! {
    impl<D: Debug> std::error::Error for Error<D> {}
}

impl<E> From<crate::storage::ReadError<E>> for Error<E> {
    fn from(e: crate::storage::ReadError<E>) -> Self {
        match e {
            crate::storage::ReadError::Other(inner) => Error::Io(inner),
            crate::storage::ReadError::OutOfRange { .. } => Error::InvalidFormat,
        }
    }
}

impl<E> From<crate::storage::WriteError<E>> for Error<E> {
    fn from(e: crate::storage::WriteError<E>) -> Self {
        match e {
            crate::storage::WriteError::Other(inner) => Error::Io(inner),
            crate::storage::WriteError::OutOfRange { .. } => Error::InvalidFormat,
        }
    }
}

pub type Result<T, D> = core::result::Result<T, Error<D>>;
