//! The error taxonomy shared by every component of the engine.
//!
//! Every fallible operation returns a [`FsResult`]; the negative-errno
//! convention spec'd for the bridge boundary is applied only in
//! [`EdfsError::errno`], never threaded through the engine itself.

use std::io;

use thiserror::Error;

/// A result carrying an [`EdfsError`] on failure.
pub type FsResult<T> = Result<T, EdfsError>;

/// Every way an EdFS operation can fail, independent of how the bridge
/// reports it to the kernel.
#[derive(Error, Debug)]
pub enum EdfsError {
    /// A path component, inumber, or directory entry does not exist.
    #[error("no such file or directory")]
    NotFound,
    /// A path component that was expected to be a directory is not one.
    #[error("not a directory")]
    NotADirectory,
    /// An operation that requires a file was given a directory.
    #[error("is a directory")]
    IsADirectory,
    /// `rmdir` on a directory that still has entries.
    #[error("directory not empty")]
    NotEmpty,
    /// `mkdir`/`create` on a name that already exists in the parent.
    #[error("file exists")]
    AlreadyExists,
    /// No free inode, no free block, or a directory's data blocks are full.
    #[error("no space left on device")]
    NoSpace,
    /// A file grew past the single-indirect addressing scheme's capacity.
    #[error("file too large")]
    TooBig,
    /// An empty path, an overlong filename, or a negative size.
    #[error("invalid argument")]
    InvalidArgument,
    /// A short positioned read/write, a translation into a hole, or a
    /// corrupt on-disk pointer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The backing image fails the superblock sanity checks at open time.
    #[error("not an EdFS image: {0}")]
    InvalidImage(&'static str),
    /// A scratch-buffer allocation failed.
    #[error("out of memory")]
    OutOfMemory,
    /// An operation the engine intentionally does not implement.
    #[error("function not implemented")]
    NotImplemented,
}

impl EdfsError {
    /// Maps this error to the POSIX errno the bridge should report, as a
    /// negative value per the convention in spec.md §6.
    pub fn errno(&self) -> i32 {
        match self {
            EdfsError::NotFound => -libc::ENOENT,
            EdfsError::NotADirectory => -libc::ENOTDIR,
            EdfsError::IsADirectory => -libc::EISDIR,
            EdfsError::NotEmpty => -libc::ENOTEMPTY,
            EdfsError::AlreadyExists => -libc::EEXIST,
            EdfsError::NoSpace => -libc::ENOSPC,
            EdfsError::TooBig => -libc::EFBIG,
            EdfsError::InvalidArgument => -libc::EINVAL,
            EdfsError::Io(_) => -libc::EIO,
            EdfsError::InvalidImage(_) => -libc::EIO,
            EdfsError::OutOfMemory => -libc::ENOMEM,
            EdfsError::NotImplemented => -libc::ENOSYS,
        }
    }
}
