use serde::{Deserialize, Serialize};

use crate::disk::Block;
use crate::fs::config::{
    INODES_PER_BLOCK, INODE_SIZE, INODE_TABLE_START_BLOCK_ID, POINTERS_PER_BLOCK,
    POINTERS_PER_INODE,
};
use crate::fs::error::Result;

/// On-disk inode record: 32 bytes, eight little-endian u32 fields, packed
/// 128 per inode-table block.
///
/// A pointer value of 0 means "unallocated" — block 0 is the superblock and
/// can never be a data block address. `valid` is a u32 flag to keep the
/// record layout fixed-width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inode {
    pub valid: u32,
    /// Logical file size in bytes, maintained by write.
    pub size: u32,
    pub direct: [u32; POINTERS_PER_INODE],
    pub indirect: u32,
}

impl Inode {
    pub const EMPTY: Inode = Inode {
        valid: 0,
        size: 0,
        direct: [0; POINTERS_PER_INODE],
        indirect: 0,
    };

    pub fn is_valid(&self) -> bool {
        self.valid != 0
    }
}

/// Inode-table block holding inode `inumber`.
pub fn table_block(inumber: u32) -> u32 {
    INODE_TABLE_START_BLOCK_ID + inumber / INODES_PER_BLOCK
}

/// Record slot of inode `inumber` inside its table block.
pub fn table_slot(inumber: u32) -> usize {
    (inumber % INODES_PER_BLOCK) as usize
}

/// Decodes the record at `slot` of an inode-table block.
pub fn decode_at(block: &Block, slot: usize) -> Result<Inode> {
    let start = slot * INODE_SIZE;
    let inode = bincode::deserialize(&block[start..start + INODE_SIZE])
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    Ok(inode)
}

/// Re-encodes one record into its slot, leaving the 127 neighbours intact.
/// The device only supports whole-block writes, so callers read the table
/// block, patch the slot, and write the block back.
pub fn encode_at(inode: &Inode, block: &mut Block, slot: usize) -> Result<()> {
    let bytes = bincode::serialize(inode)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    let start = slot * INODE_SIZE;
    block[start..start + bytes.len()].copy_from_slice(&bytes);
    Ok(())
}

/// Reinterprets a data block as an indirect pointer array (0 = unused).
pub fn decode_pointers(block: &Block) -> [u32; POINTERS_PER_BLOCK] {
    let mut pointers = [0u32; POINTERS_PER_BLOCK];
    for (ptr, word) in pointers.iter_mut().zip(block.chunks_exact(4)) {
        *ptr = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
    }
    pointers
}

pub fn encode_pointers(pointers: &[u32; POINTERS_PER_BLOCK], block: &mut Block) {
    for (ptr, word) in pointers.iter().zip(block.chunks_exact_mut(4)) {
        word.copy_from_slice(&ptr.to_le_bytes());
    }
}
