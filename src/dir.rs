//! The directory store: fixed-size name/inumber entries spread across a
//! directory inode's direct data blocks (spec.md §4.5).
//!
//! Iteration is exposed as a closure-taking higher-order routine whose step
//! function returns [`ControlFlow`], encapsulating "found, stop early" as a
//! sum type rather than a sentinel return value (spec.md §9, re-architecture
//! guidance).

use std::ops::ControlFlow;

use crate::bitmap;
use crate::error::{EdfsError, FsResult};
use crate::image::Image;
use crate::inode::{self, DiskInode, InodeKind};
use crate::superblock::{FILENAME_MAX, INVALID_BLOCK};

/// On-disk size of one directory entry: a 2-byte inumber plus a bounded
/// null-terminated filename.
pub const DIRENT_SIZE: usize = 2 + FILENAME_MAX;

/// A decoded, non-empty directory entry.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub inumber: u16,
    pub name: String,
}

fn decode_entry(buf: &[u8]) -> Option<DirEntry> {
    let inumber = u16::from_le_bytes([buf[0], buf[1]]);
    if inumber == 0 && buf[2] == 0 {
        return None;
    }
    let name_bytes = &buf[2..2 + FILENAME_MAX];
    let nul = name_bytes.iter().position(|&b| b == 0).unwrap_or(FILENAME_MAX);
    let name = String::from_utf8_lossy(&name_bytes[..nul]).into_owned();
    Some(DirEntry { inumber, name })
}

fn encode_entry(inumber: u16, name: &str, buf: &mut [u8]) {
    buf[0..2].copy_from_slice(&inumber.to_le_bytes());
    buf[2..2 + FILENAME_MAX].fill(0);
    let bytes = name.as_bytes();
    buf[2..2 + bytes.len()].copy_from_slice(bytes);
}

fn require_dir(inode: &DiskInode) -> FsResult<()> {
    if inode.kind != InodeKind::Directory {
        return Err(EdfsError::NotADirectory);
    }
    Ok(())
}

/// Iterates every non-empty entry, in pointer-array order then entry-index
/// order, stopping early when `step` returns [`ControlFlow::Break`].
pub fn scan<R>(
    image: &mut Image,
    dir: &DiskInode,
    mut step: impl FnMut(&DirEntry) -> FsResult<ControlFlow<R>>,
) -> FsResult<Option<R>> {
    require_dir(dir)?;
    let sb = *image.superblock();
    let epb = sb.entries_per_block();
    let mut buf = vec![0u8; sb.block_size as usize];
    for &blk in dir.blocks.iter() {
        if blk == INVALID_BLOCK {
            continue;
        }
        image.read_at(sb.block_offset(blk), &mut buf)?;
        for ei in 0..epb {
            let off = ei * DIRENT_SIZE;
            if let Some(entry) = decode_entry(&buf[off..off + DIRENT_SIZE]) {
                if let ControlFlow::Break(r) = step(&entry)? {
                    return Ok(Some(r));
                }
            }
        }
    }
    Ok(None)
}

/// The inumber of the entry named `name`, if any.
pub fn find_by_name(image: &mut Image, dir: &DiskInode, name: &str) -> FsResult<Option<u16>> {
    scan(image, dir, |e| {
        if e.name == name {
            Ok(ControlFlow::Break(e.inumber))
        } else {
            Ok(ControlFlow::Continue(()))
        }
    })
}

/// True if the directory has no entries at all.
pub fn is_empty(image: &mut Image, dir: &DiskInode) -> FsResult<bool> {
    let found = scan(image, dir, |_| Ok::<_, EdfsError>(ControlFlow::Break(())))?;
    Ok(found.is_none())
}

/// Inserts `(name, inumber)` into an existing empty slot, or grows the
/// directory by one block if every existing block is full (spec.md §4.5).
/// Uniqueness is the caller's responsibility.
pub fn add_entry(
    image: &mut Image,
    dir_inumber: u16,
    dir: &mut DiskInode,
    name: &str,
    inumber: u16,
) -> FsResult<()> {
    require_dir(dir)?;
    if name.is_empty() || name.as_bytes().len() >= FILENAME_MAX {
        return Err(EdfsError::InvalidArgument);
    }
    let sb = *image.superblock();
    let epb = sb.entries_per_block();
    let mut buf = vec![0u8; sb.block_size as usize];

    for &blk in dir.blocks.iter() {
        if blk == INVALID_BLOCK {
            continue;
        }
        image.read_at(sb.block_offset(blk), &mut buf)?;
        for ei in 0..epb {
            let off = ei * DIRENT_SIZE;
            if decode_entry(&buf[off..off + DIRENT_SIZE]).is_none() {
                encode_entry(inumber, name, &mut buf[off..off + DIRENT_SIZE]);
                image.write_at(sb.block_offset(blk), &buf)?;
                return Ok(());
            }
        }
    }

    for slot in dir.blocks.iter_mut() {
        if *slot == INVALID_BLOCK {
            let b = bitmap::alloc_block(image)?;
            let mut fresh = vec![0u8; sb.block_size as usize];
            encode_entry(inumber, name, &mut fresh[0..DIRENT_SIZE]);
            image.write_at(sb.block_offset(b), &fresh)?;
            *slot = b;
            inode::write_inode(image, dir_inumber, dir)?;
            return Ok(());
        }
    }

    Err(EdfsError::NoSpace)
}

/// Zeroes the entry whose inumber is `target`, leaving the block's other
/// entries and the directory's block-pointer array untouched — blocks that
/// become entirely empty are never compacted or freed (spec.md §4.5, §9).
pub fn remove_entry(image: &mut Image, dir: &DiskInode, target: u16) -> FsResult<bool> {
    require_dir(dir)?;
    let sb = *image.superblock();
    let epb = sb.entries_per_block();
    let mut buf = vec![0u8; sb.block_size as usize];
    for &blk in dir.blocks.iter() {
        if blk == INVALID_BLOCK {
            continue;
        }
        image.read_at(sb.block_offset(blk), &mut buf)?;
        for ei in 0..epb {
            let off = ei * DIRENT_SIZE;
            if let Some(entry) = decode_entry(&buf[off..off + DIRENT_SIZE]) {
                if entry.inumber == target {
                    buf[off..off + DIRENT_SIZE].fill(0);
                    image.write_at(sb.block_offset(blk), &buf)?;
                    return Ok(true);
                }
            }
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::InodeKind;
    use crate::tests_support::make_test_image;

    fn root(image: &mut Image) -> (u16, DiskInode) {
        let inumber = image.superblock().root_inumber;
        (inumber, inode::read_inode(image, inumber).unwrap())
    }

    #[test]
    fn add_find_and_remove_round_trip() {
        let mut image = make_test_image(512, 64, 32, 20);
        let (dir_inumber, mut dir) = root(&mut image);

        add_entry(&mut image, dir_inumber, &mut dir, "a.txt", 2).unwrap();
        add_entry(&mut image, dir_inumber, &mut dir, "b.txt", 3).unwrap();

        assert_eq!(find_by_name(&mut image, &dir, "a.txt").unwrap(), Some(2));
        assert_eq!(find_by_name(&mut image, &dir, "missing").unwrap(), None);

        assert!(remove_entry(&mut image, &dir, 2).unwrap());
        assert_eq!(find_by_name(&mut image, &dir, "a.txt").unwrap(), None);
        assert!(!is_empty(&mut image, &dir).unwrap());
    }

    #[test]
    fn overlong_name_is_invalid() {
        let mut image = make_test_image(512, 64, 32, 20);
        let (dir_inumber, mut dir) = root(&mut image);
        let long = "x".repeat(FILENAME_MAX);
        assert!(matches!(
            add_entry(&mut image, dir_inumber, &mut dir, &long, 2),
            Err(EdfsError::InvalidArgument)
        ));
    }

    #[test]
    fn directory_overflow_returns_enospc() {
        // 512-byte blocks / 62-byte entries = 8 entries/block; 6 direct
        // blocks => 48 slots before the directory is full.
        let mut image = make_test_image(512, 64, 64, 20);
        let (dir_inumber, mut dir) = root(&mut image);
        let epb = image.superblock().entries_per_block();
        let capacity = epb * crate::superblock::N_DIRECT;
        for i in 0..capacity {
            let name = format!("f{i}");
            add_entry(&mut image, dir_inumber, &mut dir, &name, (i + 2) as u16).unwrap();
        }
        assert!(matches!(
            add_entry(&mut image, dir_inumber, &mut dir, "overflow", 9999),
            Err(EdfsError::NoSpace)
        ));
    }
}
