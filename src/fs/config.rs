use crate::disk::BLOCK_SIZE;

/// Superblock signature. Anything else on block 0 means the volume was never
/// formatted (or is some other filesystem) and every operation except format
/// must refuse to touch it.
pub const FS_MAGIC: u32 = 0xF0F0_3410;

pub const SUPER_BLOCK_ID: u32 = 0;
pub const INODE_TABLE_START_BLOCK_ID: u32 = 1;

/// On-disk inode record size in bytes.
pub const INODE_SIZE: usize = 32;

/// 128 inode records packed per 4 KB table block.
pub const INODES_PER_BLOCK: u32 = (BLOCK_SIZE / INODE_SIZE) as u32;

/// Direct block pointers held in the inode itself.
pub const POINTERS_PER_INODE: usize = 5;

/// Block pointers held in one indirect block (4-byte entries).
pub const POINTERS_PER_BLOCK: usize = BLOCK_SIZE / 4;

/// One inode-table block is provisioned per this many volume blocks,
/// rounded up.
pub const INODE_TABLE_RATIO: u32 = 10;
