use std::{
    fs::{File, OpenOptions},
    io::{Read, Result, Seek, SeekFrom, Write},
    path::Path,
    sync::Mutex,
};

use crate::disk::{
    block_device::BlockDevice,
    types::{Block, BLOCK_SIZE},
};

/// File-backed disk image with a fixed block count.
///
/// The image is created (and zero-extended to its full size) on first open,
/// so every block is readable immediately.
#[derive(Debug)]
pub struct FileDisk {
    file: Mutex<File>,
    blocks: u32,
}

impl FileDisk {
    pub fn open(path: impl AsRef<Path>, blocks: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let size = blocks as u64 * BLOCK_SIZE as u64;
        if file.metadata()?.len() < size {
            file.set_len(size)?;
        }

        Ok(Self {
            file: Mutex::new(file),
            blocks,
        })
    }
}

impl BlockDevice for FileDisk {
    fn read_block(&self, block_id: u32, buf: &mut Block) -> Result<()> {
        let mut file = self.file.lock().expect("disk lock poisoned");
        file.seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&self, block_id: u32, buf: &Block) -> Result<()> {
        let mut file = self.file.lock().expect("disk lock poisoned");
        file.seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn block_count(&self) -> u32 {
        self.blocks
    }
}
