/// In-memory bitmap over inode slots, one bit per slot.
///
/// Derived state: rebuilt from the on-disk valid flags at mount, never
/// persisted, and kept in lockstep with every create/delete afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InodeBitmap {
    bits: Vec<u8>,
    total: u32,
    free: u32,
}

impl InodeBitmap {
    /// All slots free. Slot 0 stays permanently reserved (see `alloc`).
    pub fn new(total: u32) -> Self {
        let byte_len = total.div_ceil(8) as usize;
        Self {
            bits: vec![0; byte_len],
            total,
            free: total,
        }
    }

    /// Claims the lowest free slot, never handing out slot 0.
    pub fn alloc(&mut self) -> Option<u32> {
        for (byte_index, byte) in self.bits.iter_mut().enumerate() {
            if *byte == 0xFF {
                continue;
            }
            for bit in 0..8 {
                let index = (byte_index * 8 + bit) as u32;
                if index == 0 {
                    continue;
                }
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

    /// Marks a slot used during mount-time reconstruction.
    pub fn set(&mut self, index: u32) {
        if index >= self.total || self.is_used(index) {
            return;
        }
        self.bits[(index / 8) as usize] |= 1 << (index % 8);
        self.free -= 1;
    }

    pub fn free_slot(&mut self, index: u32) {
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
