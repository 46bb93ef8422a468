use serde::{Deserialize, Serialize};

use crate::disk::Block;
use crate::fs::config::{FS_MAGIC, INODES_PER_BLOCK, INODE_TABLE_RATIO, INODE_TABLE_START_BLOCK_ID};
use crate::fs::error::Result;

/// Serialized size of the superblock record on block 0.
pub const SUPER_BLOCK_SIZE: usize = 16;

/// Volume-wide layout metadata, written once by format and read at mount.
///
/// All fields are little-endian u32 on disk; the rest of block 0 is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperBlock {
    pub magic: u32,
    /// Total blocks on the device, including the metadata region.
    pub nblocks: u32,
    /// Blocks holding packed inode records, starting at block 1.
    pub ninodeblocks: u32,
    /// Inode slots in the table. Slot 0 is reserved and never allocated.
    pub ninodes: u32,
}

impl SuperBlock {
    /// Computes the layout for a device of `nblocks` blocks: one inode-table
    /// block per ten volume blocks, rounded up.
    pub fn for_device(nblocks: u32) -> Self {
        let ninodeblocks = nblocks.div_ceil(INODE_TABLE_RATIO);
        Self {
            magic: FS_MAGIC,
            nblocks,
            ninodeblocks,
            ninodes: ninodeblocks * INODES_PER_BLOCK,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == FS_MAGIC
    }

    /// First block of the data region, just past the inode table.
    pub fn first_data_block(&self) -> u32 {
        INODE_TABLE_START_BLOCK_ID + self.ninodeblocks
    }

    pub fn encode(&self, block: &mut Block) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        block[..bytes.len()].copy_from_slice(&bytes);
        Ok(())
    }

    pub fn decode(block: &Block) -> Result<Self> {
        let sb = bincode::deserialize(&block[..SUPER_BLOCK_SIZE])
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        Ok(sb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::BLOCK_SIZE;

    #[test]
    fn layout_rounds_the_inode_table_up() {
        let sb = SuperBlock::for_device(200);
        assert_eq!(sb.ninodeblocks, 20);
        assert_eq!(sb.ninodes, 20 * INODES_PER_BLOCK);

        let sb = SuperBlock::for_device(201);
        assert_eq!(sb.ninodeblocks, 21);
        assert_eq!(sb.first_data_block(), 22);
    }

    #[test]
    fn record_is_sixteen_bytes() {
        let sb = SuperBlock::for_device(4096);
        assert_eq!(bincode::serialize(&sb).unwrap().len(), SUPER_BLOCK_SIZE);
    }

    #[test]
    fn encode_decode_round_trip() {
        let sb = SuperBlock::for_device(4096);
        let mut block: Block = [0; BLOCK_SIZE];
        sb.encode(&mut block).unwrap();

        // Fields are packed little-endian starting at byte 0.
        assert_eq!(&block[..4], &FS_MAGIC.to_le_bytes());
        assert_eq!(&block[4..8], &4096u32.to_le_bytes());

        let back = SuperBlock::decode(&block).unwrap();
        assert_eq!(back, sb);
        assert!(back.is_valid());
    }

    #[test]
    fn zeroed_block_decodes_as_invalid() {
        let block: Block = [0; BLOCK_SIZE];
        let sb = SuperBlock::decode(&block).unwrap();
        assert!(!sb.is_valid());
    }
}
