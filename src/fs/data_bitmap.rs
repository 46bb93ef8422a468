/// In-memory bitmap over every block of the volume, one bit per block.
///
/// A bit is set iff the block is the superblock, an inode-table block, a
/// referenced indirect block, or a data block pointed to by some valid
/// inode. Rebuilt by a full scan at mount; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBitmap {
    bits: Vec<u8>,
    total: u32,
    free: u32,
}

impl DataBitmap {
    pub fn new(total: u32) -> Self {
        let byte_len = total.div_ceil(8) as usize;
        Self {
            bits: vec![0; byte_len],
            total,
            free: total,
        }
    }

    /// First-fit allocation: claims the lowest free block number. The
    /// metadata region never comes back because mount marks it used.
    pub fn alloc(&mut self) -> Option<u32> {
        for (byte_index, byte) in self.bits.iter_mut().enumerate() {
            if *byte == 0xFF {
                continue;
            }
            for bit in 0..8 {
                let index = (byte_index * 8 + bit) as u32;
                if index >= self.total {
                    return None;
                }
                if *byte & (1 << bit) == 0 {
                    *byte |= 1 << bit;
                    self.free -= 1;
                    return Some(index);
                }
            }
        }
        None
    }

    /// Marks a block used during mount-time reconstruction (and when the
    /// defragmenter claims the cursor block).
    pub fn set(&mut self, index: u32) {
        if index >= self.total || self.is_used(index) {
            return;
        }
        self.bits[(index / 8) as usize] |= 1 << (index % 8);
        self.free -= 1;
    }

    pub fn free_block(&mut self, index: u32) {
        if index >= self.total {
            return;
        }
        let byte_index = (index / 8) as usize;
        let bit = 1 << (index % 8);
        if self.bits[byte_index] & bit != 0 {
            self.bits[byte_index] &= !bit;
            self.free += 1;
        }
    }

    pub fn is_used(&self, index: u32) -> bool {
        self.bits[(index / 8) as usize] & (1 << (index % 8)) != 0
    }

    pub fn free_count(&self) -> u32 {
        self.free
    }
}
