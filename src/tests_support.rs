//! Image-building helper shared by unit tests across modules. Not compiled
//! into `edfuse`; exists purely to seed an in-memory-backed image for a
//! single test, not as a general-purpose image creator (spec.md §1 keeps
//! that out of the engine's scope as a product).

use std::io::{Seek, SeekFrom, Write};

use crate::image::Image;
use crate::inode::{self, DiskInode, InodeKind, INODE_SIZE};
use crate::superblock::{Superblock, SUPER_BLOCK_OFFSET, SUPERBLOCK_SIZE};

/// Builds a fresh image on an anonymous temp file with an empty root
/// directory at inumber 1, and returns it already opened.
pub(crate) fn make_test_image(
    block_size: u32,
    data_blocks: u32,
    inode_count: u32,
    inode_size: u32,
) -> Image {
    assert_eq!(inode_size as usize, INODE_SIZE);
    let bitmap_size = data_blocks.div_ceil(8);
    let bitmap_start = SUPER_BLOCK_OFFSET + SUPERBLOCK_SIZE as u64;
    let inode_table_start = bitmap_start + bitmap_size as u64;
    let data_start = inode_table_start + inode_count as u64 * inode_size as u64;
    let fs_size = data_start + data_blocks as u64 * block_size as u64;

    let sb = Superblock {
        block_size,
        fs_size,
        bitmap_start,
        bitmap_size,
        inode_table_start,
        inode_count,
        inode_size,
        data_start,
        root_inumber: 1,
    };

    let mut file = tempfile::tempfile().expect("create anonymous temp file");
    file.set_len(fs_size).expect("size temp file");
    file.seek(SeekFrom::Start(SUPER_BLOCK_OFFSET)).unwrap();
    file.write_all(&sb.encode()).unwrap();

    let mut image = Image::from_file(file).expect("open freshly built image");
    inode::write_inode(&mut image, sb.root_inumber, &DiskInode::new(InodeKind::Directory))
        .expect("seed root directory");
    image
}
