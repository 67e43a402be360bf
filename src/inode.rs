//! The disk inode format and the inode table: a fixed array of fixed-size
//! slots indexed by inumber (spec.md §4.2).
//!
//! Inumber 0 is reserved ("no such inode") and is never a valid index into
//! the table.

use std::io;

use crate::error::{EdfsError, FsResult};
use crate::image::Image;
use crate::superblock::{INVALID_BLOCK, N_DIRECT};

/// On-disk size of one inode slot, in bytes: 1 type/flag byte, 3 padding
/// bytes, a 4-byte size field, and `N_DIRECT` 2-byte block pointers.
pub const INODE_SIZE: usize = 1 + 3 + 4 + N_DIRECT * 2;

const TYPE_FREE: u8 = 0;
const TYPE_FILE: u8 = 1;
const TYPE_DIR: u8 = 2;
const INDIRECT_BIT: u8 = 0x80;

/// The discriminated "free | file | directory" union of spec.md §3,
/// represented as an explicit tagged variant rather than bit arithmetic at
/// call sites (spec.md §9, re-architecture guidance).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    Free,
    File,
    Directory,
}

/// An in-memory copy of a disk inode. Short-lived: created by the resolver
/// or an operation and never shared across calls (spec.md §3).
#[derive(Debug, Clone, Copy)]
pub struct DiskInode {
    pub kind: InodeKind,
    /// Set only for files whose block-pointer array holds indirect-block
    /// numbers rather than data-block numbers. Always clear for directories.
    pub indirect: bool,
    pub size: u64,
    pub blocks: [u16; N_DIRECT],
}

impl DiskInode {
    /// A freshly allocated inode of the given kind: size zero, every
    /// pointer `INVALID` (spec.md §4.2, `new_inode`).
    pub fn new(kind: InodeKind) -> Self {
        DiskInode {
            kind,
            indirect: false,
            size: 0,
            blocks: [INVALID_BLOCK; N_DIRECT],
        }
    }

    /// The all-zero "free" inode (spec.md §3: "a free inode has type=free
    /// and all-zero contents").
    pub fn free() -> Self {
        DiskInode {
            kind: InodeKind::Free,
            indirect: false,
            size: 0,
            blocks: [0; N_DIRECT],
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == InodeKind::Directory
    }

    fn decode(buf: &[u8; INODE_SIZE]) -> FsResult<Self> {
        let type_byte = buf[0];
        let indirect = type_byte & INDIRECT_BIT != 0;
        let kind = match type_byte & !INDIRECT_BIT {
            TYPE_FREE => InodeKind::Free,
            TYPE_FILE => InodeKind::File,
            TYPE_DIR => InodeKind::Directory,
            _ => {
                return Err(EdfsError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "corrupt inode type byte",
                )))
            }
        };
        let size = u32::from_le_bytes(buf[4..8].try_into().unwrap()) as u64;
        let mut blocks = [0u16; N_DIRECT];
        for (i, b) in blocks.iter_mut().enumerate() {
            let off = 8 + i * 2;
            *b = u16::from_le_bytes(buf[off..off + 2].try_into().unwrap());
        }
        Ok(DiskInode {
            kind,
            indirect: indirect && kind == InodeKind::File,
            size,
            blocks,
        })
    }

    fn encode(&self) -> [u8; INODE_SIZE] {
        if self.kind == InodeKind::Free {
            return [0u8; INODE_SIZE];
        }
        let mut buf = [0u8; INODE_SIZE];
        let type_byte = match self.kind {
            InodeKind::Free => TYPE_FREE,
            InodeKind::File => TYPE_FILE,
            InodeKind::Directory => TYPE_DIR,
        };
        buf[0] = type_byte | if self.indirect { INDIRECT_BIT } else { 0 };
        buf[4..8].copy_from_slice(&(self.size as u32).to_le_bytes());
        for (i, b) in self.blocks.iter().enumerate() {
            let off = 8 + i * 2;
            buf[off..off + 2].copy_from_slice(&b.to_le_bytes());
        }
        buf
    }
}

fn check_bounds(image: &Image, inumber: u16) -> FsResult<()> {
    let sb = image.superblock();
    if inumber == 0 || inumber as u32 >= sb.inode_count {
        return Err(EdfsError::NotFound);
    }
    Ok(())
}

/// Reads the disk inode at `inumber` (spec.md §4.2).
pub fn read_inode(image: &mut Image, inumber: u16) -> FsResult<DiskInode> {
    check_bounds(image, inumber)?;
    let off = image.superblock().inode_offset(inumber);
    let mut buf = [0u8; INODE_SIZE];
    image.read_at(off, &mut buf)?;
    DiskInode::decode(&buf)
}

/// Overwrites the disk inode slot at `inumber`.
pub fn write_inode(image: &mut Image, inumber: u16, inode: &DiskInode) -> FsResult<()> {
    check_bounds(image, inumber)?;
    let off = image.superblock().inode_offset(inumber);
    image.write_at(off, &inode.encode())
}

/// Marks the slot at `inumber` free by zeroing it.
pub fn clear_inode(image: &mut Image, inumber: u16) -> FsResult<()> {
    write_inode(image, inumber, &DiskInode::free())
}

/// Linear scan from inumber 1 upward for the first free slot; 0 if none
/// (spec.md §4.2).
pub fn find_free_inode(image: &mut Image) -> FsResult<u16> {
    let count = image.superblock().inode_count;
    for inumber in 1..count as u16 {
        if read_inode(image, inumber)?.kind == InodeKind::Free {
            return Ok(inumber);
        }
    }
    Ok(0)
}

/// Finds a free slot and returns an in-memory inode of the requested kind.
/// The slot is not yet allocated on disk until the caller calls
/// [`write_inode`].
pub fn new_inode(image: &mut Image, kind: InodeKind) -> FsResult<(u16, DiskInode)> {
    let inumber = find_free_inode(image)?;
    if inumber == 0 {
        return Err(EdfsError::NoSpace);
    }
    Ok((inumber, DiskInode::new(kind)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inode_round_trips_through_encode_decode() {
        let mut inode = DiskInode::new(InodeKind::File);
        inode.size = 4096;
        inode.blocks[0] = 7;
        inode.indirect = true;
        let decoded = DiskInode::decode(&inode.encode()).unwrap();
        assert_eq!(decoded.kind, InodeKind::File);
        assert!(decoded.indirect);
        assert_eq!(decoded.size, 4096);
        assert_eq!(decoded.blocks[0], 7);
    }

    #[test]
    fn free_inode_encodes_to_all_zero() {
        assert_eq!(DiskInode::free().encode(), [0u8; INODE_SIZE]);
    }

    #[test]
    fn directory_ignores_indirect_bit_on_decode() {
        let mut raw = [0u8; INODE_SIZE];
        raw[0] = TYPE_DIR | INDIRECT_BIT;
        let decoded = DiskInode::decode(&raw).unwrap();
        assert_eq!(decoded.kind, InodeKind::Directory);
        assert!(!decoded.indirect);
    }
}
