//! Walks a slash-separated path from the root inode to a target inode, and
//! derives a path's parent inode and basename (spec.md §4.6).

use crate::dir;
use crate::error::{EdfsError, FsResult};
use crate::image::Image;
use crate::inode::{self, DiskInode, InodeKind};
use crate::superblock::FILENAME_MAX;

/// Resolves `path` to its inumber and inode. `path` must be non-empty and
/// start with `/`. Trailing slashes are tolerated; the empty path after the
/// root (`"/"`) returns the root inode itself.
pub fn find_inode(image: &mut Image, root_inumber: u16, path: &str) -> FsResult<(u16, DiskInode)> {
    if path.is_empty() || !path.starts_with('/') {
        return Err(EdfsError::InvalidArgument);
    }
    let mut cur_inumber = root_inumber;
    let mut cur = inode::read_inode(image, root_inumber)?;

    let trimmed = path.trim_start_matches('/').trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok((cur_inumber, cur));
    }

    for comp in trimmed.split('/') {
        if comp.is_empty() {
            continue;
        }
        if comp.as_bytes().len() >= FILENAME_MAX {
            return Err(EdfsError::InvalidArgument);
        }
        if cur.kind != InodeKind::Directory {
            return Err(EdfsError::NotADirectory);
        }
        match dir::find_by_name(image, &cur, comp)? {
            Some(child) => {
                cur_inumber = child;
                cur = inode::read_inode(image, child)?;
            }
            None => return Err(EdfsError::NotFound),
        }
    }
    Ok((cur_inumber, cur))
}

/// The parent directory of `path`: the root if `path` has a single
/// component, otherwise the result of resolving everything before the last
/// `/`. Fails [`EdfsError::InvalidArgument`] for a path with no `/` at all.
pub fn parent_inode(image: &mut Image, root_inumber: u16, path: &str) -> FsResult<(u16, DiskInode)> {
    let trimmed = path.trim_end_matches('/');
    let pos = trimmed.rfind('/').ok_or(EdfsError::InvalidArgument)?;
    let parent = &trimmed[..pos];
    if parent.is_empty() {
        Ok((root_inumber, inode::read_inode(image, root_inumber)?))
    } else {
        find_inode(image, root_inumber, parent)
    }
}

/// The component after the last `/`, trailing slashes removed; `None` for a
/// path with no final component (e.g. `"/"`).
pub fn basename(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    let pos = trimmed.rfind('/')?;
    let name = &trimmed[pos + 1..];
    (!name.is_empty()).then_some(name)
}
