//! Opens the backing image file and performs positioned I/O against it.
//!
//! A short read or write is always classified [`EdfsError::Io`] — the engine
//! makes no attempt to retry or recover from one (spec.md §7).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{EdfsError, FsResult};
use crate::superblock::{Superblock, SUPERBLOCK_SIZE, SUPER_BLOCK_OFFSET};

/// A handle on the backing image file plus the superblock read at open time.
pub struct Image {
    file: File,
    sb: Superblock,
}

impl Image {
    /// Opens `path` read/write, reads and validates the superblock, and
    /// checks that the file is at least as large as the superblock claims.
    pub fn open(path: &Path) -> FsResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let image = Self::from_file(file)?;
        log::debug!(
            "opened image {}: block_size={} fs_size={} root_inumber={}",
            path.display(),
            image.sb.block_size,
            image.sb.fs_size,
            image.sb.root_inumber
        );
        Ok(image)
    }

    /// Reads and validates the superblock of an already-open file handle.
    /// Factored out of [`open`](Self::open) so test fixtures can build an
    /// image directly on an anonymous temporary file with no path.
    pub(crate) fn from_file(mut file: File) -> FsResult<Self> {
        let mut raw = [0u8; SUPERBLOCK_SIZE];
        file.seek(SeekFrom::Start(SUPER_BLOCK_OFFSET))?;
        file.read_exact(&mut raw)?;
        let sb = Superblock::decode(&raw)?;

        let len = file.metadata()?.len();
        if len < sb.fs_size {
            return Err(EdfsError::InvalidImage("image shorter than declared size"));
        }
        if sb.inode_size as usize != crate::inode::INODE_SIZE {
            return Err(EdfsError::InvalidImage("unexpected inode size"));
        }

        Ok(Image { file, sb })
    }

    /// The superblock read at open time.
    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    /// Reads exactly `buf.len()` bytes starting at absolute offset `off`.
    pub fn read_at(&mut self, off: u64, buf: &mut [u8]) -> FsResult<()> {
        self.file.seek(SeekFrom::Start(off))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    /// Writes all of `buf` starting at absolute offset `off`.
    pub fn write_at(&mut self, off: u64, buf: &[u8]) -> FsResult<()> {
        self.file.seek(SeekFrom::Start(off))?;
        self.file.write_all(buf)?;
        Ok(())
    }
}
