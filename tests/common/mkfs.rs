//! Seeds a fresh EdFS image on a temp file for the integration tests below.
//!
//! This is not the "image creator" utility spec.md §1 keeps out of the
//! engine's scope as a product: it is a test fixture only, never compiled
//! into `edfuse`, and it writes through the same public `Superblock`/`Image`
//! API `edfuse` itself uses rather than poking bytes the library doesn't
//! otherwise produce.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};

use edfs::image::Image;
use edfs::inode::{self, DiskInode, InodeKind, INODE_SIZE};
use edfs::superblock::{Superblock, SUPERBLOCK_SIZE, SUPER_BLOCK_OFFSET};
use tempfile::NamedTempFile;

/// Builds a fresh image with an empty root directory at inumber 1 and
/// returns the backing temp file (kept alive for the caller's lifetime)
/// alongside its path.
pub fn build_image(block_size: u32, data_blocks: u32, inode_count: u32) -> NamedTempFile {
    let bitmap_size = data_blocks.div_ceil(8);
    let bitmap_start = SUPER_BLOCK_OFFSET + SUPERBLOCK_SIZE as u64;
    let inode_table_start = bitmap_start + bitmap_size as u64;
    let data_start = inode_table_start + inode_count as u64 * INODE_SIZE as u64;
    let fs_size = data_start + data_blocks as u64 * block_size as u64;

    let sb = Superblock {
        block_size,
        fs_size,
        bitmap_start,
        bitmap_size,
        inode_table_start,
        inode_count,
        inode_size: INODE_SIZE as u32,
        data_start,
        root_inumber: 1,
    };

    let tmp = NamedTempFile::new().expect("create named temp file");
    {
        let mut file = OpenOptions::new()
            .write(true)
            .open(tmp.path())
            .expect("open temp file for seeding");
        file.set_len(fs_size).expect("size image file");
        file.seek(SeekFrom::Start(SUPER_BLOCK_OFFSET)).unwrap();
        file.write_all(&sb.encode()).unwrap();
    }

    let mut image = Image::open(tmp.path()).expect("open freshly written image");
    inode::write_inode(&mut image, sb.root_inumber, &DiskInode::new(InodeKind::Directory))
        .expect("seed root directory inode");
    drop(image);

    tmp
}
