use simplefs::disk::{BlockDevice, FileDisk, MemDisk, BLOCK_SIZE};
use simplefs::fs::{FileSystem, FsError};

/// Formats and mounts a fresh in-memory volume.
fn fresh_fs(blocks: u32) -> FileSystem<MemDisk> {
    let mut fs = FileSystem::new(MemDisk::new(blocks));
    fs.format().unwrap();
    fs.mount().unwrap();
    fs
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn format_then_mount_reads_back_the_computed_layout() {
    // 201 blocks forces the inode-table rounding up: ceil(201 / 10) = 21.
    let fs = fresh_fs(201);
    let report = fs.debug().unwrap();
    assert_eq!(report.super_block.nblocks, 201);
    assert_eq!(report.super_block.ninodeblocks, 21);
    assert_eq!(report.super_block.ninodes, 21 * 128);
    assert_eq!(report.super_block.first_data_block(), 22);
    assert!(report.inodes.is_empty());
    // Block 0 plus 21 table blocks are permanently used.
    assert_eq!(report.free_blocks, 201 - 22);
}

#[test]
fn format_persists_across_a_disk_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");

    {
        let mut fs = FileSystem::new(FileDisk::open(&path, 64).unwrap());
        fs.format().unwrap();
        fs.mount().unwrap();
        let inumber = fs.create().unwrap();
        assert_eq!(fs.write(inumber, b"persistent", 0).unwrap(), 10);
    }

    let mut fs = FileSystem::new(FileDisk::open(&path, 64).unwrap());
    fs.mount().unwrap();
    let mut buf = [0u8; 32];
    assert_eq!(fs.read(1, &mut buf, 0).unwrap(), 10);
    assert_eq!(&buf[..10], b"persistent");
}

#[test]
fn operations_fail_cleanly_before_mount() {
    let mut fs = FileSystem::new(MemDisk::new(64));
    assert!(matches!(fs.create(), Err(FsError::NotMounted)));
    assert!(matches!(fs.delete(1), Err(FsError::NotMounted)));
    assert!(matches!(fs.get_size(1), Err(FsError::NotMounted)));
    assert!(matches!(fs.debug(), Err(FsError::NotMounted)));
    assert!(matches!(fs.defrag(), Err(FsError::NotMounted)));
    let mut buf = [0u8; 8];
    assert!(matches!(fs.read(1, &mut buf, 0), Err(FsError::NotMounted)));
    assert!(matches!(fs.write(1, &buf, 0), Err(FsError::NotMounted)));
}

#[test]
fn mount_rejects_an_unformatted_disk() {
    let mut fs = FileSystem::new(MemDisk::new(64));
    assert!(matches!(fs.mount(), Err(FsError::InvalidMagic)));
    assert!(!fs.is_mounted());
}

#[test]
fn format_refuses_to_destroy_a_mounted_volume() {
    let mut fs = fresh_fs(64);
    assert!(matches!(fs.format(), Err(FsError::AlreadyMounted)));
}

#[test]
fn create_hands_out_the_lowest_free_slot_and_skips_zero() {
    let mut fs = fresh_fs(64);
    assert_eq!(fs.create().unwrap(), 1);
    assert_eq!(fs.create().unwrap(), 2);
    assert_eq!(fs.create().unwrap(), 3);
    fs.delete(2).unwrap();
    assert_eq!(fs.create().unwrap(), 2);
}

#[test]
fn inode_number_validation() {
    let mut fs = fresh_fs(64);
    let ninodes = fs.debug().unwrap().super_block.ninodes;

    assert!(matches!(fs.delete(0), Err(FsError::OutOfRange(0))));
    assert!(matches!(fs.get_size(ninodes), Err(FsError::OutOfRange(_))));
    // In range but never created.
    assert!(matches!(fs.get_size(5), Err(FsError::InvalidInode(5))));
    assert!(matches!(fs.delete(5), Err(FsError::InvalidInode(5))));
}

#[test]
fn round_trip_single_byte() {
    let mut fs = fresh_fs(64);
    let inumber = fs.create().unwrap();
    assert_eq!(fs.write(inumber, b"x", 0).unwrap(), 1);
    assert_eq!(fs.get_size(inumber).unwrap(), 1);

    let mut buf = [0u8; 4];
    assert_eq!(fs.read(inumber, &mut buf, 0).unwrap(), 1);
    assert_eq!(buf[0], b'x');
}

#[test]
fn round_trip_spanning_three_direct_blocks() {
    let mut fs = fresh_fs(64);
    let inumber = fs.create().unwrap();
    let data = pattern(10_000);
    assert_eq!(fs.write(inumber, &data, 0).unwrap(), 10_000);
    assert_eq!(fs.get_size(inumber).unwrap(), 10_000);

    let mut buf = vec![0u8; 10_000];
    assert_eq!(fs.read(inumber, &mut buf, 0).unwrap(), 10_000);
    assert_eq!(buf, data);

    // Three direct blocks, no indirect block yet.
    let report = fs.debug().unwrap();
    assert_eq!(report.inodes[0].direct.len(), 3);
    assert!(report.inodes[0].indirect.is_none());
}

#[test]
fn round_trip_spanning_the_indirect_block() {
    let mut fs = fresh_fs(64);
    let inumber = fs.create().unwrap();
    let len = 6 * BLOCK_SIZE + 123;
    let data = pattern(len);
    assert_eq!(fs.write(inumber, &data, 0).unwrap(), len);

    let mut buf = vec![0u8; len];
    assert_eq!(fs.read(inumber, &mut buf, 0).unwrap(), len);
    assert_eq!(buf, data);

    let report = fs.debug().unwrap();
    assert_eq!(report.inodes[0].direct.len(), 5);
    assert!(report.inodes[0].indirect.is_some());
    assert_eq!(report.inodes[0].indirect_pointers.len(), 2);
}

#[test]
fn reads_at_unaligned_offsets() {
    let mut fs = fresh_fs(64);
    let inumber = fs.create().unwrap();
    let data = pattern(3 * BLOCK_SIZE);
    fs.write(inumber, &data, 0).unwrap();

    let mut buf = vec![0u8; 1000];
    assert_eq!(fs.read(inumber, &mut buf, 4000).unwrap(), 1000);
    assert_eq!(buf, &data[4000..5000]);
}

#[test]
fn partial_read_at_end_of_file() {
    let mut fs = fresh_fs(64);
    let inumber = fs.create().unwrap();
    fs.write(inumber, &pattern(100), 0).unwrap();

    let mut buf = [0u8; 500];
    assert_eq!(fs.read(inumber, &mut buf, 0).unwrap(), 100);
}

#[test]
fn read_past_end_of_file_returns_zero_bytes() {
    let mut fs = fresh_fs(64);
    let inumber = fs.create().unwrap();
    fs.write(inumber, &pattern(100), 0).unwrap();

    let mut buf = [0u8; 16];
    assert_eq!(fs.read(inumber, &mut buf, 100).unwrap(), 0);
    assert_eq!(fs.read(inumber, &mut buf, 5000).unwrap(), 0);
}

#[test]
fn overwrite_within_the_file_does_not_change_its_size() {
    let mut fs = fresh_fs(64);
    let inumber = fs.create().unwrap();
    fs.write(inumber, &pattern(200), 0).unwrap();
    assert_eq!(fs.get_size(inumber).unwrap(), 200);

    assert_eq!(fs.write(inumber, b"mid", 50).unwrap(), 3);
    assert_eq!(fs.get_size(inumber).unwrap(), 200);

    // Extending past the end grows by exactly the newly covered range.
    assert_eq!(fs.write(inumber, &pattern(50), 180).unwrap(), 50);
    assert_eq!(fs.get_size(inumber).unwrap(), 230);
}

#[test]
fn partial_overwrite_preserves_the_rest_of_the_block() {
    let mut fs = fresh_fs(64);
    let inumber = fs.create().unwrap();
    let data = pattern(BLOCK_SIZE);
    fs.write(inumber, &data, 0).unwrap();
    fs.write(inumber, b"#####", 10).unwrap();

    let mut buf = vec![0u8; BLOCK_SIZE];
    fs.read(inumber, &mut buf, 0).unwrap();
    assert_eq!(&buf[..10], &data[..10]);
    assert_eq!(&buf[10..15], b"#####");
    assert_eq!(&buf[15..], &data[15..]);
}

#[test]
fn a_hole_terminates_the_read() {
    let mut fs = fresh_fs(64);
    let inumber = fs.create().unwrap();
    // Writing past block 0 leaves direct[0] unallocated.
    fs.write(inumber, b"beyond the hole", 5000).unwrap();
    assert_eq!(fs.get_size(inumber).unwrap(), 5015);

    let mut buf = [0u8; 64];
    // The hole at logical block 0 stops the read immediately.
    assert_eq!(fs.read(inumber, &mut buf, 0).unwrap(), 0);
    // Reading within the allocated block works.
    assert_eq!(fs.read(inumber, &mut buf, 5000).unwrap(), 15);
    assert_eq!(&buf[..15], b"beyond the hole");
}

#[test]
fn delete_reclaims_and_scrubs_blocks() {
    let mut fs = fresh_fs(64);
    let inumber = fs.create().unwrap();
    fs.write(inumber, &pattern(3 * BLOCK_SIZE), 0).unwrap();

    let report = fs.debug().unwrap();
    let owned = report.inodes[0].direct.clone();
    assert_eq!(owned.len(), 3);
    let free_before = report.free_blocks;

    fs.delete(inumber).unwrap();

    // Freed blocks are zeroed on disk before returning to the pool.
    let mut block = [0u8; BLOCK_SIZE];
    for &block_id in &owned {
        fs.disk().read_block(block_id, &mut block).unwrap();
        assert!(block.iter().all(|&b| b == 0), "block {} not scrubbed", block_id);
    }
    assert_eq!(fs.debug().unwrap().free_blocks, free_before + 3);

    // The same blocks are allocatable again, lowest first.
    let inumber = fs.create().unwrap();
    fs.write(inumber, &pattern(3 * BLOCK_SIZE), 0).unwrap();
    assert_eq!(fs.debug().unwrap().inodes[0].direct, owned);
}

#[test]
fn live_inodes_never_share_blocks() {
    let mut fs = fresh_fs(64);
    let a = fs.create().unwrap();
    let b = fs.create().unwrap();
    // Interleave writes so allocations alternate between the two files.
    for chunk in 0..4 {
        fs.write(a, &pattern(BLOCK_SIZE), chunk * BLOCK_SIZE as u32)
            .unwrap();
        fs.write(b, &pattern(BLOCK_SIZE), chunk * BLOCK_SIZE as u32)
            .unwrap();
    }

    let report = fs.debug().unwrap();
    let mut all_blocks: Vec<u32> = report
        .inodes
        .iter()
        .flat_map(|ino| {
            ino.direct
                .iter()
                .chain(ino.indirect.iter())
                .chain(ino.indirect_pointers.iter())
                .copied()
                .collect::<Vec<_>>()
        })
        .collect();
    let total = all_blocks.len();
    all_blocks.sort_unstable();
    all_blocks.dedup();
    assert_eq!(all_blocks.len(), total, "two inodes share a data block");
}

#[test]
fn remount_rebuilds_identical_bitmaps() {
    let mut fs = fresh_fs(64);
    let a = fs.create().unwrap();
    let b = fs.create().unwrap();
    let c = fs.create().unwrap();
    fs.write(a, &pattern(10_000), 0).unwrap();
    fs.write(b, &pattern(6 * BLOCK_SIZE + 9), 0).unwrap();
    fs.write(c, &pattern(77), 0).unwrap();
    fs.delete(b).unwrap();

    let inode_bitmap = fs.inode_bitmap().unwrap().clone();
    let data_bitmap = fs.data_bitmap().unwrap().clone();

    // Remounting discards the incremental bitmaps and rebuilds from disk.
    fs.mount().unwrap();
    assert_eq!(fs.inode_bitmap().unwrap(), &inode_bitmap);
    assert_eq!(fs.data_bitmap().unwrap(), &data_bitmap);
}

#[test]
fn out_of_space_write_is_short_and_size_reflects_it() {
    // 16 blocks: superblock + 2 table blocks leaves 13 data blocks. A big
    // write consumes 5 direct + 1 indirect + 7 pointed blocks and then
    // runs dry at 12 blocks of payload.
    let mut fs = fresh_fs(16);
    let inumber = fs.create().unwrap();
    let requested = 20 * BLOCK_SIZE;
    let written = fs.write(inumber, &pattern(requested), 0).unwrap();
    assert_eq!(written, 12 * BLOCK_SIZE);
    assert!(written < requested);

    assert_eq!(fs.get_size(inumber).unwrap(), written as u32);
    assert_eq!(fs.debug().unwrap().free_blocks, 0);

    // What was committed reads back intact.
    let mut buf = vec![0u8; requested];
    assert_eq!(fs.read(inumber, &mut buf, 0).unwrap(), written);
    assert_eq!(&buf[..written], &pattern(requested)[..written]);
}

#[test]
fn no_free_inode_is_reported() {
    // Tiny volume, still 128 slots per table block; fill them all.
    let mut fs = fresh_fs(10);
    let ninodes = fs.debug().unwrap().super_block.ninodes;
    for _ in 1..ninodes {
        fs.create().unwrap();
    }
    assert!(matches!(fs.create(), Err(FsError::NoFreeInode)));
}

#[test]
fn empty_write_and_empty_read_are_no_ops() {
    let mut fs = fresh_fs(64);
    let inumber = fs.create().unwrap();
    assert_eq!(fs.write(inumber, &[], 0).unwrap(), 0);
    assert_eq!(fs.get_size(inumber).unwrap(), 0);
    let mut buf = [0u8; 0];
    assert_eq!(fs.read(inumber, &mut buf, 0).unwrap(), 0);
}
