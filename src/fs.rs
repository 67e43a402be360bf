//! The operation dispatcher: implements every filesystem operation by
//! composing the bitmap allocator, block map, and directory store
//! (spec.md §4.7).
//!
//! Each operation is implemented twice over the same core logic: once
//! addressed by path (the surface spec.md §4.7 describes, and what the
//! integration tests in `tests/` exercise directly) and once addressed by
//! inumber (what the FUSE adapter in `fuse_adapter.rs` calls, since the
//! kernel hands it inode numbers rather than paths after the first
//! `lookup`). Both forms resolve to an inumber and inode and then share the
//! `*_core` methods below, so the bitmap/block-map/directory-store
//! composition is written once per operation.

use std::path::Path;

use crate::bitmap;
use crate::blockmap;
use crate::dir;
use crate::error::{EdfsError, FsResult};
use crate::image::Image;
use crate::inode::{self, DiskInode, InodeKind};
use crate::resolver;
use crate::superblock::INVALID_BLOCK;

/// The subset of `struct stat` this engine tracks, independent of how a
/// bridge (FUSE or otherwise) reports it (spec.md §4.7, `getattr`).
#[derive(Debug, Clone, Copy)]
pub struct Attr {
    pub inumber: u16,
    pub kind: InodeKind,
    pub size: u64,
    pub mode: u32,
    pub nlink: u32,
}

/// One directory entry as returned by `readdir`, including the synthesized
/// `.` and `..`.
#[derive(Debug, Clone)]
pub struct Dirent {
    pub name: String,
    pub inumber: u16,
    pub kind: InodeKind,
}

/// The filesystem engine: an open image plus the eight spec.md components
/// composed over it. Single-threaded cooperative (spec.md §5) — callers
/// must serialize access; the engine holds no internal lock.
pub struct Fs {
    image: Image,
}

impl Fs {
    pub fn open(path: &Path) -> FsResult<Self> {
        Ok(Fs {
            image: Image::open(path)?,
        })
    }

    fn root(&self) -> u16 {
        self.image.superblock().root_inumber
    }

    /// Builds an [`Attr`] from an already-loaded inode, without touching
    /// the image again. Used both internally and by the FUSE adapter after
    /// `lookup_child`/`create_in` hand back a freshly read disk inode.
    pub(crate) fn attr_of(inumber: u16, inode: &DiskInode) -> Attr {
        let (mode, nlink) = match inode.kind {
            InodeKind::Directory => (0o770, 2),
            InodeKind::File => (0o660, 1),
            InodeKind::Free => (0, 0),
        };
        Attr {
            inumber,
            kind: inode.kind,
            size: inode.size,
            mode,
            nlink,
        }
    }

    fn read_core(&mut self, inode: &DiskInode, buf: &mut [u8], offset: u64) -> FsResult<usize> {
        if inode.kind == InodeKind::Directory {
            return Err(EdfsError::IsADirectory);
        }
        if offset >= inode.size {
            return Ok(0);
        }
        let remaining = ((inode.size - offset).min(buf.len() as u64)) as usize;
        let mut done = 0usize;
        while done < remaining {
            let cur_off = offset + done as u64;
            let (phys, in_blk) = blockmap::translate(&mut self.image, inode, cur_off)?;
            let sb = *self.image.superblock();
            let chunk = (sb.block_size as usize - in_blk).min(remaining - done);
            let mut block_buf = vec![0u8; sb.block_size as usize];
            self.image.read_at(sb.block_offset(phys), &mut block_buf)?;
            buf[done..done + chunk].copy_from_slice(&block_buf[in_blk..in_blk + chunk]);
            done += chunk;
        }
        Ok(done)
    }

    fn write_core(
        &mut self,
        inumber: u16,
        inode: &mut DiskInode,
        data: &[u8],
        offset: u64,
    ) -> FsResult<usize> {
        if inode.kind == InodeKind::Directory {
            return Err(EdfsError::IsADirectory);
        }
        let mut written = 0usize;
        while written < data.len() {
            let cur_off = offset + written as u64;
            let sb = *self.image.superblock();
            let idx = (cur_off / sb.block_size as u64) as usize;
            let in_blk = (cur_off % sb.block_size as u64) as usize;
            let phys = blockmap::ensure(&mut self.image, inumber, inode, idx)?;
            let chunk = (sb.block_size as usize - in_blk).min(data.len() - written);
            let mut block_buf = vec![0u8; sb.block_size as usize];
            self.image.read_at(sb.block_offset(phys), &mut block_buf)?;
            block_buf[in_blk..in_blk + chunk].copy_from_slice(&data[written..written + chunk]);
            self.image.write_at(sb.block_offset(phys), &block_buf)?;
            written += chunk;
        }
        let new_end = offset + written as u64;
        if new_end > inode.size {
            inode.size = new_end;
            inode::write_inode(&mut self.image, inumber, inode)?;
        }
        Ok(written)
    }

    fn truncate_core(&mut self, inumber: u16, inode: &mut DiskInode, new_size: u64) -> FsResult<()> {
        if inode.kind == InodeKind::Directory {
            return Err(EdfsError::IsADirectory);
        }
        let sb = *self.image.superblock();
        let bs = sb.block_size as u64;
        let old_size = inode.size;

        if new_size > old_size {
            if new_size > 0 {
                let last_idx = ((new_size - 1) / bs) as usize;
                blockmap::ensure(&mut self.image, inumber, inode, last_idx)?;
            }
        } else if new_size < old_size {
            let new_blocks = new_size.div_ceil(bs) as usize;
            let old_blocks = old_size.div_ceil(bs) as usize;
            for idx in new_blocks..old_blocks {
                if let Some(phys) = blockmap::lookup_raw(&mut self.image, inode, idx)? {
                    bitmap::free_block(&mut self.image, phys)?;
                }
            }
        }

        inode.size = new_size;
        inode::write_inode(&mut self.image, inumber, inode)
    }

    fn readdir_core(&mut self, inode: &DiskInode, self_inumber: u16, parent_inumber: u16) -> FsResult<Vec<Dirent>> {
        if inode.kind != InodeKind::Directory {
            return Err(EdfsError::NotADirectory);
        }
        let mut out = vec![
            Dirent { name: ".".into(), inumber: self_inumber, kind: InodeKind::Directory },
            Dirent { name: "..".into(), inumber: parent_inumber, kind: InodeKind::Directory },
        ];
        let mut raw: Vec<(String, u16)> = Vec::new();
        dir::scan::<()>(&mut self.image, inode, |e| {
            raw.push((e.name.clone(), e.inumber));
            Ok(std::ops::ControlFlow::Continue(()))
        })?;
        for (name, inumber) in raw {
            let child = inode::read_inode(&mut self.image, inumber)?;
            out.push(Dirent { name, inumber, kind: child.kind });
        }
        Ok(out)
    }

    fn create_entry_core(
        &mut self,
        parent_inumber: u16,
        parent: &mut DiskInode,
        name: &str,
        kind: InodeKind,
    ) -> FsResult<(u16, DiskInode)> {
        if parent.kind != InodeKind::Directory {
            return Err(EdfsError::NotADirectory);
        }
        if dir::find_by_name(&mut self.image, parent, name)?.is_some() {
            return Err(EdfsError::AlreadyExists);
        }
        let (child_inumber, child) = inode::new_inode(&mut self.image, kind)?;
        inode::write_inode(&mut self.image, child_inumber, &child)?;
        dir::add_entry(&mut self.image, parent_inumber, parent, name, child_inumber)?;
        Ok((child_inumber, child))
    }

    fn rmdir_core(
        &mut self,
        target_inumber: u16,
        target: &DiskInode,
        parent: &DiskInode,
    ) -> FsResult<()> {
        if target.kind != InodeKind::Directory {
            return Err(EdfsError::NotADirectory);
        }
        if !dir::is_empty(&mut self.image, target)? {
            return Err(EdfsError::NotEmpty);
        }
        dir::remove_entry(&mut self.image, parent, target_inumber)?;
        for &b in target.blocks.iter() {
            if b != INVALID_BLOCK {
                bitmap::free_block(&mut self.image, b)?;
            }
        }
        inode::clear_inode(&mut self.image, target_inumber)
    }

    fn unlink_core(&mut self, target_inumber: u16, target: &DiskInode, parent: &DiskInode) -> FsResult<()> {
        if target.kind == InodeKind::Directory {
            return Err(EdfsError::IsADirectory);
        }
        self.free_data_blocks(target)?;
        dir::remove_entry(&mut self.image, parent, target_inumber)?;
        inode::clear_inode(&mut self.image, target_inumber)
    }

    fn free_data_blocks(&mut self, inode: &DiskInode) -> FsResult<()> {
        if inode.indirect {
            let sb = *self.image.superblock();
            for &ind in inode.blocks.iter() {
                if ind == INVALID_BLOCK {
                    continue;
                }
                let mut raw = vec![0u8; sb.block_size as usize];
                self.image.read_at(sb.block_offset(ind), &mut raw)?;
                let per = sb.ptrs_per_indirect();
                for i in 0..per {
                    let p = u16::from_le_bytes([raw[i * 2], raw[i * 2 + 1]]);
                    if p != INVALID_BLOCK {
                        bitmap::free_block(&mut self.image, p)?;
                    }
                }
                bitmap::free_block(&mut self.image, ind)?;
            }
        } else {
            for &b in inode.blocks.iter() {
                if b != INVALID_BLOCK {
                    bitmap::free_block(&mut self.image, b)?;
                }
            }
        }
        Ok(())
    }

    // ---- path-addressed operations (spec.md §4.7) ----

    pub fn getattr(&mut self, path: &str) -> FsResult<Attr> {
        if path == "/" {
            let root = self.root();
            let inode = inode::read_inode(&mut self.image, root)?;
            return Ok(Attr { inumber: root, kind: InodeKind::Directory, size: inode.size, mode: 0o755, nlink: 2 });
        }
        let (inumber, inode) = resolver::find_inode(&mut self.image, self.root(), path)?;
        Ok(Self::attr_of(inumber, &inode))
    }

    pub fn readdir(&mut self, path: &str) -> FsResult<Vec<Dirent>> {
        let root = self.root();
        let (inumber, inode) = resolver::find_inode(&mut self.image, root, path)?;
        let parent_inumber = if inumber == root {
            root
        } else {
            resolver::parent_inode(&mut self.image, root, path)?.0
        };
        self.readdir_core(&inode, inumber, parent_inumber)
    }

    pub fn mkdir(&mut self, path: &str) -> FsResult<()> {
        self.create(path, InodeKind::Directory)
    }

    pub fn create(&mut self, path: &str, kind: InodeKind) -> FsResult<()> {
        let root = self.root();
        let (parent_inumber, mut parent) = resolver::parent_inode(&mut self.image, root, path)?;
        let name = resolver::basename(path).ok_or(EdfsError::InvalidArgument)?;
        self.create_entry_core(parent_inumber, &mut parent, name, kind)?;
        log::debug!("created {path} (inumber in {parent_inumber})");
        Ok(())
    }

    pub fn rmdir(&mut self, path: &str) -> FsResult<()> {
        let root = self.root();
        let (target_inumber, target) = resolver::find_inode(&mut self.image, root, path)?;
        let (_, parent) = resolver::parent_inode(&mut self.image, root, path)?;
        self.rmdir_core(target_inumber, &target, &parent)
    }

    pub fn unlink(&mut self, path: &str) -> FsResult<()> {
        let root = self.root();
        let (target_inumber, target) = resolver::find_inode(&mut self.image, root, path)?;
        let (_, parent) = resolver::parent_inode(&mut self.image, root, path)?;
        self.unlink_core(target_inumber, &target, &parent)
    }

    pub fn read(&mut self, path: &str, buf: &mut [u8], offset: u64) -> FsResult<usize> {
        let root = self.root();
        let (_, inode) = resolver::find_inode(&mut self.image, root, path)?;
        self.read_core(&inode, buf, offset)
    }

    pub fn write(&mut self, path: &str, data: &[u8], offset: u64) -> FsResult<usize> {
        let root = self.root();
        let (inumber, mut inode) = resolver::find_inode(&mut self.image, root, path)?;
        self.write_core(inumber, &mut inode, data, offset)
    }

    pub fn truncate(&mut self, path: &str, new_size: u64) -> FsResult<()> {
        let root = self.root();
        let (inumber, mut inode) = resolver::find_inode(&mut self.image, root, path)?;
        self.truncate_core(inumber, &mut inode, new_size)
    }

    /// `chmod`/`chown`/`utime`: accepted and discarded (spec.md §4.7, §9 —
    /// permission/ownership/time metadata are not persisted).
    pub fn chmod(&mut self, path: &str, _mode: u32) -> FsResult<()> {
        self.exists(path)
    }

    pub fn chown(&mut self, path: &str, _uid: u32, _gid: u32) -> FsResult<()> {
        self.exists(path)
    }

    pub fn utime(&mut self, path: &str) -> FsResult<()> {
        self.exists(path)
    }

    /// `open`: resolve; `EISDIR` if directory; otherwise succeed with no
    /// kept state (spec.md §4.7).
    pub fn open_check(&mut self, path: &str) -> FsResult<()> {
        let root = self.root();
        let (_, inode) = resolver::find_inode(&mut self.image, root, path)?;
        if inode.kind == InodeKind::Directory {
            return Err(EdfsError::IsADirectory);
        }
        Ok(())
    }

    fn exists(&mut self, path: &str) -> FsResult<()> {
        let root = self.root();
        resolver::find_inode(&mut self.image, root, path).map(|_| ())
    }

    /// Aggregate free/total block counts, for `statfs`.
    pub fn space_stats(&mut self) -> FsResult<(u64, u64)> {
        bitmap::stats(&mut self.image)
    }

    // ---- inumber-addressed operations, used by the FUSE adapter ----

    pub(crate) fn image_mut(&mut self) -> &mut Image {
        &mut self.image
    }

    pub(crate) fn root_inumber(&self) -> u16 {
        self.root()
    }

    pub(crate) fn attr_by_inumber(&mut self, inumber: u16) -> FsResult<Attr> {
        if inumber == self.root() {
            let inode = inode::read_inode(&mut self.image, inumber)?;
            return Ok(Attr { inumber, kind: InodeKind::Directory, size: inode.size, mode: 0o755, nlink: 2 });
        }
        let inode = inode::read_inode(&mut self.image, inumber)?;
        Ok(Self::attr_of(inumber, &inode))
    }

    pub(crate) fn lookup_child(&mut self, parent_inumber: u16, name: &str) -> FsResult<(u16, DiskInode)> {
        let parent = inode::read_inode(&mut self.image, parent_inumber)?;
        if parent.kind != InodeKind::Directory {
            return Err(EdfsError::NotADirectory);
        }
        let child_inumber = dir::find_by_name(&mut self.image, &parent, name)?.ok_or(EdfsError::NotFound)?;
        let child = inode::read_inode(&mut self.image, child_inumber)?;
        Ok((child_inumber, child))
    }

    pub(crate) fn readdir_by_inumber(&mut self, inumber: u16, parent_inumber: u16) -> FsResult<Vec<Dirent>> {
        let inode = inode::read_inode(&mut self.image, inumber)?;
        self.readdir_core(&inode, inumber, parent_inumber)
    }

    pub(crate) fn create_in(&mut self, parent_inumber: u16, name: &str, kind: InodeKind) -> FsResult<(u16, DiskInode)> {
        let mut parent = inode::read_inode(&mut self.image, parent_inumber)?;
        self.create_entry_core(parent_inumber, &mut parent, name, kind)
    }

    pub(crate) fn rmdir_in(&mut self, parent_inumber: u16, target_inumber: u16) -> FsResult<()> {
        let target = inode::read_inode(&mut self.image, target_inumber)?;
        let parent = inode::read_inode(&mut self.image, parent_inumber)?;
        self.rmdir_core(target_inumber, &target, &parent)
    }

    pub(crate) fn unlink_in(&mut self, parent_inumber: u16, target_inumber: u16) -> FsResult<()> {
        let target = inode::read_inode(&mut self.image, target_inumber)?;
        let parent = inode::read_inode(&mut self.image, parent_inumber)?;
        self.unlink_core(target_inumber, &target, &parent)
    }

    pub(crate) fn read_by_inumber(&mut self, inumber: u16, buf: &mut [u8], offset: u64) -> FsResult<usize> {
        let inode = inode::read_inode(&mut self.image, inumber)?;
        self.read_core(&inode, buf, offset)
    }

    pub(crate) fn write_by_inumber(&mut self, inumber: u16, data: &[u8], offset: u64) -> FsResult<usize> {
        let mut inode = inode::read_inode(&mut self.image, inumber)?;
        self.write_core(inumber, &mut inode, data, offset)
    }

    pub(crate) fn truncate_by_inumber(&mut self, inumber: u16, new_size: u64) -> FsResult<()> {
        let mut inode = inode::read_inode(&mut self.image, inumber)?;
        self.truncate_core(inumber, &mut inode, new_size)
    }
}
