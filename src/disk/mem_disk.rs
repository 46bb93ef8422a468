use std::{
    io::{Error, ErrorKind, Result},
    sync::Mutex,
};

use crate::disk::{
    block_device::BlockDevice,
    types::{Block, BLOCK_SIZE},
};

/// In-memory disk backed by one flat byte vector.
///
/// Behaves exactly like [`crate::disk::FileDisk`] without touching the
/// filesystem; the test suites run their volumes on it.
#[derive(Debug)]
pub struct MemDisk {
    blocks: Mutex<Vec<u8>>,
    count: u32,
}

impl MemDisk {
    pub fn new(count: u32) -> Self {
        Self {
            blocks: Mutex::new(vec![0; count as usize * BLOCK_SIZE]),
            count,
        }
    }

    fn check(&self, block_id: u32) -> Result<usize> {
        if block_id >= self.count {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("block {} out of range (disk has {})", block_id, self.count),
            ));
        }
        Ok(block_id as usize * BLOCK_SIZE)
    }
}

impl BlockDevice for MemDisk {
    fn read_block(&self, block_id: u32, buf: &mut Block) -> Result<()> {
        let start = self.check(block_id)?;
        let blocks = self.blocks.lock().expect("disk lock poisoned");
        buf.copy_from_slice(&blocks[start..start + BLOCK_SIZE]);
        Ok(())
    }

    fn write_block(&self, block_id: u32, buf: &Block) -> Result<()> {
        let start = self.check(block_id)?;
        let mut blocks = self.blocks.lock().expect("disk lock poisoned");
        blocks[start..start + BLOCK_SIZE].copy_from_slice(buf);
        Ok(())
    }

    fn block_count(&self) -> u32 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_access_is_rejected() {
        let disk = MemDisk::new(2);
        let mut buf: Block = [0; BLOCK_SIZE];
        assert!(disk.read_block(2, &mut buf).is_err());
        assert!(disk.write_block(2, &buf).is_err());
        assert!(disk.read_block(1, &mut buf).is_ok());
    }
}
