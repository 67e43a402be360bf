//! The on-disk superblock and the fixed geometry constants derived from it.
//!
//! Every multi-byte field on disk is little-endian, fixed by this
//! implementation per the open question in spec.md §9; see DESIGN.md.

use crate::error::{EdfsError, FsResult};

/// Byte offset of the superblock within the image.
pub const SUPER_BLOCK_OFFSET: u64 = 1024;
/// On-disk size of the superblock, in bytes.
pub const SUPERBLOCK_SIZE: usize = 64;
/// Magic value identifying an EdFS image ("EdFS" read little-endian).
pub const EDFS_MAGIC: u32 = u32::from_le_bytes(*b"EdFS");

/// Number of direct block pointers in a disk inode.
pub const N_DIRECT: usize = 6;
/// Maximum length of a filename, including the terminating NUL.
pub const FILENAME_MAX: usize = 60;
/// Sentinel block-pointer value meaning "unallocated".
pub const INVALID_BLOCK: u16 = 0xFFFF;
/// Inumber reserved to mean "no such inode".
pub const NULL_INUMBER: u16 = 0;

/// The filesystem's geometry, read once at mount time and treated as
/// immutable thereafter (spec.md §4.1).
#[derive(Debug, Clone, Copy)]
pub struct Superblock {
    pub block_size: u32,
    pub fs_size: u64,
    pub bitmap_start: u64,
    pub bitmap_size: u32,
    pub inode_table_start: u64,
    pub inode_count: u32,
    pub inode_size: u32,
    pub data_start: u64,
    pub root_inumber: u16,
}

impl Superblock {
    /// Decodes a superblock from its on-disk little-endian representation.
    ///
    /// Fails with [`EdfsError::InvalidImage`] if the magic does not match.
    pub fn decode(buf: &[u8; SUPERBLOCK_SIZE]) -> FsResult<Self> {
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if magic != EDFS_MAGIC {
            return Err(EdfsError::InvalidImage("bad magic"));
        }
        Ok(Superblock {
            block_size: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            fs_size: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            bitmap_start: u64::from_le_bytes(buf[16..24].try_into().unwrap()),
            bitmap_size: u32::from_le_bytes(buf[24..28].try_into().unwrap()),
            inode_table_start: u64::from_le_bytes(buf[28..36].try_into().unwrap()),
            inode_count: u32::from_le_bytes(buf[36..40].try_into().unwrap()),
            inode_size: u32::from_le_bytes(buf[40..44].try_into().unwrap()),
            data_start: u64::from_le_bytes(buf[44..52].try_into().unwrap()),
            root_inumber: u16::from_le_bytes(buf[52..54].try_into().unwrap()),
        })
    }

    /// Encodes this superblock to its on-disk little-endian representation.
    pub fn encode(&self) -> [u8; SUPERBLOCK_SIZE] {
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        buf[0..4].copy_from_slice(&EDFS_MAGIC.to_le_bytes());
        buf[4..8].copy_from_slice(&self.block_size.to_le_bytes());
        buf[8..16].copy_from_slice(&self.fs_size.to_le_bytes());
        buf[16..24].copy_from_slice(&self.bitmap_start.to_le_bytes());
        buf[24..28].copy_from_slice(&self.bitmap_size.to_le_bytes());
        buf[28..36].copy_from_slice(&self.inode_table_start.to_le_bytes());
        buf[36..40].copy_from_slice(&self.inode_count.to_le_bytes());
        buf[40..44].copy_from_slice(&self.inode_size.to_le_bytes());
        buf[44..52].copy_from_slice(&self.data_start.to_le_bytes());
        buf[52..54].copy_from_slice(&self.root_inumber.to_le_bytes());
        buf
    }

    /// Number of directory entries that fit in one data block.
    pub fn entries_per_block(&self) -> usize {
        self.block_size as usize / crate::dir::DIRENT_SIZE
    }

    /// Number of block pointers that fit in one indirect block.
    pub fn ptrs_per_indirect(&self) -> usize {
        self.block_size as usize / 2
    }

    /// Maximum file size addressable without indirection.
    pub fn max_direct_bytes(&self) -> u64 {
        N_DIRECT as u64 * self.block_size as u64
    }

    /// Maximum file size addressable with single indirection.
    pub fn max_indirect_bytes(&self) -> u64 {
        N_DIRECT as u64 * self.ptrs_per_indirect() as u64 * self.block_size as u64
    }

    /// Absolute byte offset of data block `b`.
    pub fn block_offset(&self, b: u16) -> u64 {
        self.data_start + b as u64 * self.block_size as u64
    }

    /// Absolute byte offset of the inode slot for `inumber`.
    pub fn inode_offset(&self, inumber: u16) -> u64 {
        self.inode_table_start + inumber as u64 * self.inode_size as u64
    }
}
