//! End-to-end scenarios from spec.md §8, driven through `Fs`'s path-addressed
//! operations against a real temp-file-backed image.

mod common;

use edfs::inode::InodeKind;
use edfs::{EdfsError, Fs};

fn open(tmp: &tempfile::NamedTempFile) -> Fs {
    Fs::open(tmp.path()).expect("open seeded image")
}

#[test]
fn small_file_round_trip() {
    // Scenario 1: create, write, read back exactly, short read clamps to size.
    let tmp = common::mkfs::build_image(512, 64, 32);
    let mut fs = open(&tmp);

    fs.create("/a.txt", InodeKind::File).unwrap();
    fs.write("/a.txt", b"abc\n", 0).unwrap();
    assert_eq!(fs.getattr("/a.txt").unwrap().size, 4);

    let mut buf = [0u8; 4];
    assert_eq!(fs.read("/a.txt", &mut buf, 0).unwrap(), 4);
    assert_eq!(&buf, b"abc\n");

    let mut buf10 = [0u8; 10];
    assert_eq!(fs.read("/a.txt", &mut buf10, 0).unwrap(), 4);
    assert_eq!(&buf10[..4], b"abc\n");
}

#[test]
fn truncate_up_and_down() {
    // Scenario 2: grow past the direct region via truncate, read the tail,
    // then shrink back and confirm blocks beyond the new size are freed.
    let tmp = common::mkfs::build_image(512, 64, 32);
    let mut fs = open(&tmp);

    fs.create("/t", InodeKind::File).unwrap();
    fs.truncate("/t", 1000).unwrap();
    assert_eq!(fs.getattr("/t").unwrap().size, 1000);

    let mut tail = [0u8; 5];
    assert_eq!(fs.read("/t", &mut tail, 995).unwrap(), 5);

    let (total, free_before) = fs.space_stats().unwrap();
    fs.truncate("/t", 10).unwrap();
    assert_eq!(fs.getattr("/t").unwrap().size, 10);
    let (_, free_after) = fs.space_stats().unwrap();
    assert!(free_after > free_before, "shrinking must free data blocks");
    let _ = total;
}

#[test]
fn indirect_promotion_preserves_direct_pointers_and_sets_new_slot() {
    // Scenario 3: BS=512, N_DIRECT=6. A single write of 6*512 bytes stays
    // direct; one more byte promotes to indirect, preserving the six
    // existing pointers at their logical positions and adding slot 6.
    let tmp = common::mkfs::build_image(512, 4096, 32);
    let mut fs = open(&tmp);

    fs.create("/f", InodeKind::File).unwrap();
    let body = vec![1u8; 6 * 512];
    fs.write("/f", &body, 0).unwrap();
    fs.write("/f", &[9u8], 6 * 512).unwrap();

    assert_eq!(fs.getattr("/f").unwrap().size, 6 * 512 + 1);

    let mut whole = vec![0u8; 6 * 512 + 1];
    assert_eq!(fs.read("/f", &mut whole, 0).unwrap(), whole.len());
    assert!(whole[..6 * 512].iter().all(|&b| b == 1));
    assert_eq!(whole[6 * 512], 9);
}

#[test]
fn directory_overflow_returns_enospc_once_every_slot_is_full() {
    // Scenario 4: fill every directory entry slot across all N_DIRECT
    // blocks; the next create must fail with ENOSPC.
    let tmp = common::mkfs::build_image(512, 64, 64);
    let mut fs = open(&tmp);

    // 512-byte blocks / 62-byte entries = 8 entries/block; 6 direct blocks
    // => 48 entry slots before the directory itself is full.
    let capacity = 8 * 6;
    for i in 0..capacity {
        fs.create(&format!("/f{i}"), InodeKind::File).unwrap();
    }
    assert!(matches!(
        fs.create("/overflow", InodeKind::File),
        Err(EdfsError::NoSpace)
    ));
}

#[test]
fn rmdir_non_empty_then_empty() {
    // Scenario 5.
    let tmp = common::mkfs::build_image(512, 64, 32);
    let mut fs = open(&tmp);

    fs.mkdir("/d").unwrap();
    fs.create("/d/x", InodeKind::File).unwrap();
    assert!(matches!(fs.rmdir("/d"), Err(EdfsError::NotEmpty)));

    fs.unlink("/d/x").unwrap();
    fs.rmdir("/d").unwrap();
    assert!(matches!(fs.getattr("/d"), Err(EdfsError::NotFound)));
}

#[test]
fn unlink_frees_blocks_bit_for_bit() {
    // Scenario 6: a file spanning promoted indirect blocks frees every
    // block it owned, leaving the bitmap identical to its pre-create state.
    let tmp = common::mkfs::build_image(512, 512, 32);
    let mut fs = open(&tmp);

    let before = fs.space_stats().unwrap();
    fs.create("/big", InodeKind::File).unwrap();
    let data = vec![7u8; 20 * 1024];
    fs.write("/big", &data, 0).unwrap();
    fs.unlink("/big").unwrap();
    let after = fs.space_stats().unwrap();
    assert_eq!(before, after);
}

#[test]
fn create_then_unlink_is_idempotent_on_inode_reuse() {
    let tmp = common::mkfs::build_image(512, 64, 32);
    let mut fs = open(&tmp);

    fs.create("/a", InodeKind::File).unwrap();
    let a = fs.getattr("/a").unwrap();
    fs.unlink("/a").unwrap();
    assert!(matches!(fs.getattr("/a"), Err(EdfsError::NotFound)));

    fs.create("/b", InodeKind::File).unwrap();
    let b = fs.getattr("/b").unwrap();
    assert_eq!(a.inumber, b.inumber, "freed inode slot must be reused");
}

#[test]
fn readdir_lists_every_live_entry_once_including_dot_and_dotdot() {
    let tmp = common::mkfs::build_image(512, 64, 32);
    let mut fs = open(&tmp);

    fs.mkdir("/d").unwrap();
    fs.create("/d/one", InodeKind::File).unwrap();
    fs.create("/d/two", InodeKind::File).unwrap();
    fs.unlink("/d/two").unwrap();

    let entries = fs.readdir("/d").unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert!(names.contains(&"."));
    assert!(names.contains(&".."));
    assert!(names.contains(&"one"));
    assert!(!names.contains(&"two"), "removed entries must not reappear");
    assert_eq!(
        names.iter().filter(|&&n| n == "one").count(),
        1,
        "each live entry appears exactly once"
    );
}

#[test]
fn read_into_a_hole_is_an_io_error_not_zero_fill() {
    // Open question resolution (spec.md §9): truncate growing a file only
    // ensures the *last* block, so the gap behind it is a hole and reading
    // it is EIO, not zero-filled bytes.
    let tmp = common::mkfs::build_image(512, 64, 32);
    let mut fs = open(&tmp);

    fs.create("/h", InodeKind::File).unwrap();
    fs.truncate("/h", 4096).unwrap();

    let mut buf = [0u8; 16];
    assert!(matches!(fs.read("/h", &mut buf, 512), Err(EdfsError::Io(_))));
}

#[test]
fn operations_on_files_and_directories_reject_the_wrong_kind() {
    let tmp = common::mkfs::build_image(512, 64, 32);
    let mut fs = open(&tmp);

    fs.mkdir("/d").unwrap();
    fs.create("/f", InodeKind::File).unwrap();

    assert!(matches!(fs.unlink("/d"), Err(EdfsError::IsADirectory)));
    assert!(matches!(fs.rmdir("/f"), Err(EdfsError::NotADirectory)));
    assert!(matches!(
        fs.read("/d", &mut [0u8; 1], 0),
        Err(EdfsError::IsADirectory)
    ));
    assert!(matches!(
        fs.write("/d", b"x", 0),
        Err(EdfsError::IsADirectory)
    ));
}

#[test]
fn create_rejects_duplicate_names() {
    let tmp = common::mkfs::build_image(512, 64, 32);
    let mut fs = open(&tmp);

    fs.create("/dup", InodeKind::File).unwrap();
    assert!(matches!(
        fs.create("/dup", InodeKind::File),
        Err(EdfsError::AlreadyExists)
    ));
    assert!(matches!(
        fs.mkdir("/dup"),
        Err(EdfsError::AlreadyExists)
    ));
}

#[test]
fn write_then_read_recovers_arbitrary_payloads_across_direct_and_indirect_ranges() {
    // Law (spec.md §8): write(path, B, 0) followed by read(path, |B|, 0)
    // returns exactly B, for sizes that stay direct and sizes that force
    // promotion to single indirection.
    use rand::RngCore;

    let tmp = common::mkfs::build_image(512, 4096, 32);
    let mut fs = open(&tmp);
    let mut rng = rand::thread_rng();

    for (i, &len) in [100usize, 3072, 3073, 50_000].iter().enumerate() {
        let path = format!("/payload{i}");
        fs.create(&path, InodeKind::File).unwrap();
        let mut body = vec![0u8; len];
        rng.fill_bytes(&mut body);

        fs.write(&path, &body, 0).unwrap();
        assert_eq!(fs.getattr(&path).unwrap().size, len as u64);

        let mut round_tripped = vec![0u8; len];
        assert_eq!(fs.read(&path, &mut round_tripped, 0).unwrap(), len);
        assert_eq!(round_tripped, body);
    }
}
