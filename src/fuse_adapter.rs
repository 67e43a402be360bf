//! Maps `fuser::Filesystem` callbacks onto the path-based operations of
//! [`Fs`] (spec.md §4.7). This is the only module in the crate that knows
//! about FUSE; `Fs` itself has no notion of inode-number caching or kernel
//! reply types.
//!
//! FUSE addresses every call after the first `lookup` by a 64-bit inode
//! number, not a path, so this adapter uses the on-disk inumber directly as
//! the FUSE `ino` (both are already stable, process-lifetime-spanning
//! integers — spec.md §3's "inumber" is exactly what FUSE calls an inode
//! number). The one thing EdFS does not track on disk is a child's parent
//! (directories synthesize `..` at readdir time rather than storing it), so
//! this adapter keeps a small in-memory `ino -> parent ino` cache, built up
//! as `lookup`/`readdir`/`mkdir`/`create` visit the tree. The cache is
//! never persisted; it is exactly the kind of ephemeral, session-local
//! bookkeeping spec.md §5 allows ("no log, lock, or side-channel file").

use std::collections::HashMap;
use std::ffi::OsStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request, TimeOrNow,
};
use libc::c_int;

use crate::error::EdfsError;
use crate::fs::{Attr, Fs};
use crate::inode::InodeKind;

const TTL: Duration = Duration::from_secs(1);
/// EdFS keeps no timestamps (spec.md §1 Non-goals); every reported time is
/// the epoch.
const EPOCH: SystemTime = UNIX_EPOCH;

fn errno(e: &EdfsError) -> c_int {
    -e.errno()
}

fn file_type(kind: InodeKind) -> FileType {
    match kind {
        InodeKind::Directory => FileType::Directory,
        _ => FileType::RegularFile,
    }
}

fn file_attr(attr: &Attr) -> FileAttr {
    FileAttr {
        ino: attr.inumber as u64,
        size: attr.size,
        blocks: attr.size.div_ceil(512),
        atime: EPOCH,
        mtime: EPOCH,
        ctime: EPOCH,
        crtime: EPOCH,
        kind: file_type(attr.kind),
        perm: attr.mode as u16,
        nlink: attr.nlink,
        uid: 0,
        gid: 0,
        rdev: 0,
        blksize: 512,
        flags: 0,
    }
}

/// Wraps [`Fs`] with the ino-cache the FUSE bridge needs; implements
/// `fuser::Filesystem` by composing `Fs`'s inumber-addressed operations.
pub struct FuseFs {
    fs: Fs,
    /// child ino -> parent ino, seeded with root -> root.
    parents: HashMap<u64, u64>,
}

impl FuseFs {
    pub fn new(fs: Fs) -> Self {
        let root = fs.root_inumber() as u64;
        let mut parents = HashMap::new();
        parents.insert(root, root);
        FuseFs { fs, parents }
    }

    fn parent_of(&self, ino: u64) -> u64 {
        self.parents.get(&ino).copied().unwrap_or(self.fs.root_inumber() as u64)
    }
}

impl Filesystem for FuseFs {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.fs.lookup_child(parent as u16, name) {
            Ok((inumber, inode)) => {
                self.parents.insert(inumber as u64, parent);
                reply.entry(&TTL, &file_attr(&Fs::attr_of(inumber, &inode)), 0);
            }
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        match self.fs.attr_by_inumber(ino as u16) {
            Ok(attr) => reply.attr(&TTL, &file_attr(&attr)),
            Err(e) => reply.error(errno(&e)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        // chmod/chown/utime are accepted and discarded (spec.md §4.7); only
        // a requested size change (truncate) touches the disk.
        if let Some(new_size) = size {
            if let Err(e) = self.fs.truncate_by_inumber(ino as u16, new_size) {
                reply.error(errno(&e));
                return;
            }
        }
        match self.fs.attr_by_inumber(ino as u16) {
            Ok(attr) => reply.attr(&TTL, &file_attr(&attr)),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.fs.create_in(parent as u16, name, InodeKind::Directory) {
            Ok((inumber, inode)) => {
                self.parents.insert(inumber as u64, parent);
                reply.entry(&TTL, &file_attr(&Fs::attr_of(inumber, &inode)), 0);
            }
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.fs.create_in(parent as u16, name, InodeKind::File) {
            Ok((inumber, inode)) => {
                self.parents.insert(inumber as u64, parent);
                reply.created(&TTL, &file_attr(&Fs::attr_of(inumber, &inode)), 0, 0, 0);
            }
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.fs.lookup_child(parent as u16, name) {
            Ok((inumber, _)) => match self.fs.unlink_in(parent as u16, inumber) {
                Ok(()) => {
                    self.parents.remove(&(inumber as u64));
                    reply.ok();
                }
                Err(e) => reply.error(errno(&e)),
            },
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.fs.lookup_child(parent as u16, name) {
            Ok((inumber, _)) => match self.fs.rmdir_in(parent as u16, inumber) {
                Ok(()) => {
                    self.parents.remove(&(inumber as u64));
                    reply.ok();
                }
                Err(e) => reply.error(errno(&e)),
            },
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.fs.attr_by_inumber(ino as u16) {
            Ok(attr) if attr.kind == InodeKind::Directory => reply.error(libc::EISDIR),
            Ok(_) => reply.opened(0, 0),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let mut buf = vec![0u8; size as usize];
        match self.fs.read_by_inumber(ino as u16, &mut buf, offset as u64) {
            Ok(n) => reply.data(&buf[..n]),
            Err(e) => reply.error(errno(&e)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        match self.fs.write_by_inumber(ino as u16, data, offset as u64) {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn flush(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        reply.ok()
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        reply.ok()
    }

    fn fsync(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _datasync: bool, reply: ReplyEmpty) {
        // No explicit fsync is issued; durability relies on host caching
        // and orderly unmount (spec.md §5).
        reply.ok()
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.fs.attr_by_inumber(ino as u16) {
            Ok(attr) if attr.kind == InodeKind::Directory => reply.opened(0, 0),
            Ok(_) => reply.error(libc::ENOTDIR),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn readdir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let parent = self.parent_of(ino);
        match self.fs.readdir_by_inumber(ino as u16, parent as u16) {
            Ok(entries) => {
                for (i, entry) in entries.into_iter().enumerate().skip(offset as usize) {
                    if entry.name != "." && entry.name != ".." {
                        self.parents.insert(entry.inumber as u64, ino);
                    }
                    let full = reply.add(entry.inumber as u64, (i + 1) as i64, file_type(entry.kind), &entry.name);
                    if full {
                        break;
                    }
                }
                reply.ok();
            }
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn releasedir(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _flags: i32, reply: ReplyEmpty) {
        reply.ok()
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        match self.fs.space_stats() {
            Ok((total, free)) => reply.statfs(total, free, free, 0, 0, 512, 255, 512),
            Err(e) => reply.error(errno(&e)),
        }
    }
}
