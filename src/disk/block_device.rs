use std::io::Result;

use crate::disk::types::Block;

/// Fixed-size block storage. Block numbering is 0-based; the capacity is
/// fixed when the device is created.
pub trait BlockDevice: Send + Sync {
    fn read_block(&self, block_id: u32, buf: &mut Block) -> Result<()>;
    fn write_block(&self, block_id: u32, buf: &Block) -> Result<()>;
    fn block_count(&self) -> u32;
}
