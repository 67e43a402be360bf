//! Translates a logical block index of an inode to a physical block number,
//! and ensures a logical block exists — allocating and, on first overflow
//! of the direct pointers, promoting the inode to single indirection
//! (spec.md §4.4).

use std::io;

use crate::bitmap;
use crate::error::{EdfsError, FsResult};
use crate::image::Image;
use crate::inode::{self, DiskInode};
use crate::superblock::{Superblock, INVALID_BLOCK, N_DIRECT};

fn hole_error() -> EdfsError {
    EdfsError::Io(io::Error::new(io::ErrorKind::Other, "read into a hole"))
}

fn read_indirect(image: &mut Image, sb: &Superblock, block: u16) -> FsResult<Vec<u16>> {
    let mut raw = vec![0u8; sb.block_size as usize];
    image.read_at(sb.block_offset(block), &mut raw)?;
    let per = sb.ptrs_per_indirect();
    let mut ptrs = Vec::with_capacity(per);
    for i in 0..per {
        ptrs.push(u16::from_le_bytes([raw[i * 2], raw[i * 2 + 1]]));
    }
    Ok(ptrs)
}

fn write_indirect(image: &mut Image, sb: &Superblock, block: u16, ptrs: &[u16]) -> FsResult<()> {
    let mut raw = vec![0u8; sb.block_size as usize];
    for (i, p) in ptrs.iter().enumerate() {
        raw[i * 2..i * 2 + 2].copy_from_slice(&p.to_le_bytes());
    }
    image.write_at(sb.block_offset(block), &raw)
}

fn zero_block(image: &mut Image, sb: &Superblock, block: u16) -> FsResult<()> {
    let zeros = vec![0u8; sb.block_size as usize];
    image.write_at(sb.block_offset(block), &zeros)
}

/// The physical block backing logical block `idx`, or `None` for a hole
/// (an unallocated block within range). Never allocates.
pub fn lookup_raw(image: &mut Image, inode: &DiskInode, idx: usize) -> FsResult<Option<u16>> {
    let sb = *image.superblock();
    if !inode.indirect {
        if idx >= N_DIRECT {
            return Ok(None);
        }
        let p = inode.blocks[idx];
        return Ok((p != INVALID_BLOCK).then_some(p));
    }
    let per = sb.ptrs_per_indirect();
    let slot = idx / per;
    let within = idx % per;
    if slot >= N_DIRECT {
        return Ok(None);
    }
    let indirect_block = inode.blocks[slot];
    if indirect_block == INVALID_BLOCK {
        return Ok(None);
    }
    let ptrs = read_indirect(image, &sb, indirect_block)?;
    let p = ptrs[within];
    Ok((p != INVALID_BLOCK).then_some(p))
}

/// `(physical_block, offset_within_block)` for `byte_offset`, which must
/// satisfy `0 <= byte_offset < inode.size`. A hole fails [`EdfsError::Io`]
/// per the open question in spec.md §9 (holes are not zero-filled).
pub fn translate(image: &mut Image, inode: &DiskInode, byte_offset: u64) -> FsResult<(u16, usize)> {
    let sb = *image.superblock();
    let bs = sb.block_size as u64;
    let idx = (byte_offset / bs) as usize;
    let rem = (byte_offset % bs) as usize;
    match lookup_raw(image, inode, idx)? {
        Some(p) => Ok((p, rem)),
        None => Err(hole_error()),
    }
}

/// Guarantees logical block `idx` of inode `inumber` exists, allocating and
/// writing back the inode (and, on promotion, an indirect block) as
/// needed. Returns the physical block number.
pub fn ensure(
    image: &mut Image,
    inumber: u16,
    inode: &mut DiskInode,
    idx: usize,
) -> FsResult<u16> {
    let sb = *image.superblock();

    if !inode.indirect {
        if idx < N_DIRECT {
            if inode.blocks[idx] == INVALID_BLOCK {
                let b = bitmap::alloc_block(image)?;
                inode.blocks[idx] = b;
                inode::write_inode(image, inumber, inode)?;
            }
            return Ok(inode.blocks[idx]);
        }

        // Promotion: the inode's direct pointers move, in their logical
        // positions, into the first N_DIRECT slots of a new indirect block.
        let ind_block = bitmap::alloc_block(image)?;
        zero_block(image, &sb, ind_block)?;
        let per = sb.ptrs_per_indirect();
        let mut ptrs = vec![INVALID_BLOCK; per];
        ptrs[..N_DIRECT].copy_from_slice(&inode.blocks);
        write_indirect(image, &sb, ind_block, &ptrs)?;

        inode.blocks = [INVALID_BLOCK; N_DIRECT];
        inode.blocks[0] = ind_block;
        inode.indirect = true;
        inode::write_inode(image, inumber, inode)?;
    }

    let per = sb.ptrs_per_indirect();
    let slot = idx / per;
    let within = idx % per;
    if slot >= N_DIRECT {
        return Err(EdfsError::TooBig);
    }
    if inode.blocks[slot] == INVALID_BLOCK {
        let b = bitmap::alloc_block(image)?;
        zero_block(image, &sb, b)?;
        inode.blocks[slot] = b;
        inode::write_inode(image, inumber, inode)?;
    }
    let ind_block = inode.blocks[slot];
    let mut ptrs = read_indirect(image, &sb, ind_block)?;
    if ptrs[within] == INVALID_BLOCK {
        let b = bitmap::alloc_block(image)?;
        ptrs[within] = b;
        write_indirect(image, &sb, ind_block, &ptrs)?;
    }
    Ok(ptrs[within])
}
