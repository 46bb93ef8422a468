use std::cmp::min;
use std::fmt;

use log::{debug, info};

use crate::disk::{Block, BlockDevice, BLOCK_SIZE, ZERO_BLOCK};
use crate::fs::config::{
    INODES_PER_BLOCK, INODE_TABLE_START_BLOCK_ID, POINTERS_PER_BLOCK, POINTERS_PER_INODE,
    SUPER_BLOCK_ID,
};
use crate::fs::data_bitmap::DataBitmap;
use crate::fs::inode::Inode;
use crate::fs::inode_bitmap::InodeBitmap;
use crate::fs::super_block::SuperBlock;

pub mod config;
pub mod data_bitmap;
pub mod defrag;
pub mod error;
pub mod inode;
pub mod inode_bitmap;
pub mod super_block;

pub use error::{FsError, Result};

/// Resident state of a mounted volume: a copy of the superblock plus both
/// allocation bitmaps. Built by `mount`, discarded when the session ends,
/// never written to disk.
#[derive(Debug)]
struct Mounted {
    super_block: SuperBlock,
    inode_bitmap: InodeBitmap,
    data_bitmap: DataBitmap,
}

/// A single-volume filesystem session over one block device.
///
/// Constructed unmounted; every operation except `format` and `mount` fails
/// with `NotMounted` until `mount` succeeds. The session is the sole owner
/// of the bitmaps, so there is no global state and no locking: one caller
/// at a time, one synchronous device access at a time.
#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    disk: D,
    mounted: Option<Mounted>,
}

impl<D: BlockDevice> FileSystem<D> {
    pub fn new(disk: D) -> Self {
        Self {
            disk,
            mounted: None,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    /// The underlying device. Read-only; useful for inspection and tests.
    pub fn disk(&self) -> &D {
        &self.disk
    }

    /// The resident inode bitmap, if mounted. Derived state: comparing it
    /// before and after a remount checks reconstruction correctness.
    pub fn inode_bitmap(&self) -> Option<&InodeBitmap> {
        self.mounted.as_ref().map(|state| &state.inode_bitmap)
    }

    /// The resident data-block bitmap, if mounted.
    pub fn data_bitmap(&self) -> Option<&DataBitmap> {
        self.mounted.as_ref().map(|state| &state.data_bitmap)
    }

    /// Zero-fills the whole device and writes a fresh superblock. Refuses
    /// to destroy a mounted volume. Leaves the session unmounted.
    pub fn format(&mut self) -> Result<()> {
        if self.mounted.is_some() {
            return Err(FsError::AlreadyMounted);
        }

        let nblocks = self.disk.block_count();
        for block_id in 0..nblocks {
            self.disk.write_block(block_id, &ZERO_BLOCK)?;
        }

        let sb = SuperBlock::for_device(nblocks);
        let mut block: Block = ZERO_BLOCK;
        sb.encode(&mut block)?;
        self.disk.write_block(SUPER_BLOCK_ID, &block)?;

        info!(
            "formatted volume: {} blocks, {} inode table blocks, {} inodes",
            sb.nblocks, sb.ninodeblocks, sb.ninodes
        );
        Ok(())
    }

    /// Validates the superblock and rebuilds both bitmaps from a full scan
    /// of the inode table. Remounting an already-mounted volume simply
    /// rebuilds from disk, which is how tests simulate a restart.
    pub fn mount(&mut self) -> Result<()> {
        let mut block: Block = ZERO_BLOCK;
        self.disk.read_block(SUPER_BLOCK_ID, &mut block)?;
        let sb = SuperBlock::decode(&block)?;
        if !sb.is_valid() {
            return Err(FsError::InvalidMagic);
        }

        let mut inode_bitmap = InodeBitmap::new(sb.ninodes);
        let mut data_bitmap = DataBitmap::new(sb.nblocks);

        // Pass 1: mirror every on-disk valid flag.
        for table_index in 0..sb.ninodeblocks {
            self.disk
                .read_block(INODE_TABLE_START_BLOCK_ID + table_index, &mut block)?;
            for slot in 0..INODES_PER_BLOCK as usize {
                let inumber = table_index * INODES_PER_BLOCK + slot as u32;
                if inode::decode_at(&block, slot)?.is_valid() {
                    inode_bitmap.set(inumber);
                }
            }
        }

        // Pass 2: claim every block a live inode references.
        for inumber in 0..sb.ninodes {
            if !inode_bitmap.is_used(inumber) {
                continue;
            }
            let ino = Self::load_inode(&self.disk, inumber)?;
            for &ptr in &ino.direct {
                if ptr != 0 {
                    data_bitmap.set(ptr);
                }
            }
            if ino.indirect != 0 {
                data_bitmap.set(ino.indirect);
                self.disk.read_block(ino.indirect, &mut block)?;
                for ptr in inode::decode_pointers(&block) {
                    if ptr != 0 {
                        data_bitmap.set(ptr);
                    }
                }
            }
        }

        // The metadata region is permanently occupied.
        for block_id in 0..=sb.ninodeblocks {
            data_bitmap.set(block_id);
        }

        info!(
            "mounted volume: {} blocks ({} free), {} inodes ({} free)",
            sb.nblocks,
            data_bitmap.free_count(),
            sb.ninodes,
            inode_bitmap.free_count()
        );
        self.mounted = Some(Mounted {
            super_block: sb,
            inode_bitmap,
            data_bitmap,
        });
        Ok(())
    }

    /// Read-only snapshot of the superblock and every live inode, including
    /// the pointer list inside each referenced indirect block.
    pub fn debug(&self) -> Result<VolumeReport> {
        let state = self.state()?;

        // Re-validate the signature straight from disk, like mount does.
        let mut block: Block = ZERO_BLOCK;
        self.disk.read_block(SUPER_BLOCK_ID, &mut block)?;
        let sb = SuperBlock::decode(&block)?;
        if !sb.is_valid() {
            return Err(FsError::InvalidMagic);
        }

        let mut inodes = Vec::new();
        for inumber in 1..sb.ninodes {
            if !state.inode_bitmap.is_used(inumber) {
                continue;
            }
            let ino = Self::load_inode(&self.disk, inumber)?;
            let direct: Vec<u32> = ino.direct.iter().copied().filter(|&p| p != 0).collect();
            let mut indirect_pointers = Vec::new();
            if ino.indirect != 0 {
                self.disk.read_block(ino.indirect, &mut block)?;
                indirect_pointers = inode::decode_pointers(&block)
                    .into_iter()
                    .filter(|&p| p != 0)
                    .collect();
            }
            inodes.push(InodeReport {
                inumber,
                size: ino.size,
                direct,
                indirect: (ino.indirect != 0).then_some(ino.indirect),
                indirect_pointers,
            });
        }

        Ok(VolumeReport {
            super_block: sb,
            free_inodes: state.inode_bitmap.free_count(),
            free_blocks: state.data_bitmap.free_count(),
            inodes,
        })
    }

    /// Allocates the lowest free inode slot (slot 0 is reserved), zeroes its
    /// record, and returns the inode number.
    pub fn create(&mut self) -> Result<u32> {
        let state = self.mounted.as_mut().ok_or(FsError::NotMounted)?;
        let inumber = state.inode_bitmap.alloc().ok_or(FsError::NoFreeInode)?;

        let mut ino = Inode::EMPTY;
        ino.valid = 1;
        Self::store_inode(&self.disk, inumber, &ino)?;

        debug!("created inode {}", inumber);
        Ok(inumber)
    }

    /// Frees every block the inode references — zeroing each one on disk
    /// first, so freed blocks never leak prior contents — then clears the
    /// record and the bitmap bit.
    pub fn delete(&mut self, inumber: u32) -> Result<()> {
        let state = self.mounted.as_mut().ok_or(FsError::NotMounted)?;
        Self::check_range(&state.super_block, inumber)?;

        let mut ino = Self::load_inode(&self.disk, inumber)?;
        if !ino.is_valid() {
            return Err(FsError::InvalidInode(inumber));
        }

        let mut freed = 0u32;
        for slot in 0..POINTERS_PER_INODE {
            let ptr = ino.direct[slot];
            if ptr == 0 {
                continue;
            }
            self.disk.write_block(ptr, &ZERO_BLOCK)?;
            state.data_bitmap.free_block(ptr);
            ino.direct[slot] = 0;
            freed += 1;
        }

        if ino.indirect != 0 {
            let mut block: Block = ZERO_BLOCK;
            self.disk.read_block(ino.indirect, &mut block)?;
            for ptr in inode::decode_pointers(&block) {
                if ptr == 0 {
                    continue;
                }
                self.disk.write_block(ptr, &ZERO_BLOCK)?;
                state.data_bitmap.free_block(ptr);
                freed += 1;
            }
            self.disk.write_block(ino.indirect, &ZERO_BLOCK)?;
            state.data_bitmap.free_block(ino.indirect);
            ino.indirect = 0;
            freed += 1;
        }

        ino.valid = 0;
        ino.size = 0;
        Self::store_inode(&self.disk, inumber, &ino)?;
        state.inode_bitmap.free_slot(inumber);

        debug!("deleted inode {}, freed {} blocks", inumber, freed);
        Ok(())
    }

    /// Logical file size in bytes: the `size` field maintained by write.
    /// The per-block allocation count is reported by `debug` instead.
    pub fn get_size(&self, inumber: u32) -> Result<u32> {
        let state = self.state()?;
        Self::check_range(&state.super_block, inumber)?;
        let ino = Self::load_inode(&self.disk, inumber)?;
        if !ino.is_valid() {
            return Err(FsError::InvalidInode(inumber));
        }
        Ok(ino.size)
    }

    /// Copies up to `buf.len()` bytes starting at `offset` into `buf` and
    /// returns the count actually copied. A short count means end-of-file
    /// or a hole (a zero pointer terminates the read); it is not an error.
    pub fn read(&self, inumber: u32, buf: &mut [u8], offset: u32) -> Result<usize> {
        let state = self.state()?;
        Self::check_range(&state.super_block, inumber)?;
        let ino = Self::load_inode(&self.disk, inumber)?;
        if !ino.is_valid() {
            return Err(FsError::InvalidInode(inumber));
        }

        if offset >= ino.size || buf.is_empty() {
            return Ok(0);
        }
        let mut size_left = (ino.size - offset) as usize;
        let mut logical = offset as usize / BLOCK_SIZE;
        let mut begin_byte = offset as usize % BLOCK_SIZE;

        let indirect_pointers = if ino.indirect != 0 {
            let mut block: Block = ZERO_BLOCK;
            self.disk.read_block(ino.indirect, &mut block)?;
            Some(inode::decode_pointers(&block))
        } else {
            None
        };

        let mut copied = 0;
        while copied < buf.len() && size_left > 0 {
            let ptr = if logical < POINTERS_PER_INODE {
                ino.direct[logical]
            } else {
                match &indirect_pointers {
                    Some(pointers) if logical - POINTERS_PER_INODE < POINTERS_PER_BLOCK => {
                        pointers[logical - POINTERS_PER_INODE]
                    }
                    _ => 0,
                }
            };
            if ptr == 0 {
                break;
            }

            let mut block: Block = ZERO_BLOCK;
            self.disk.read_block(ptr, &mut block)?;
            let take = min(min(buf.len() - copied, BLOCK_SIZE - begin_byte), size_left);
            buf[copied..copied + take].copy_from_slice(&block[begin_byte..begin_byte + take]);

            copied += take;
            size_left -= take;
            begin_byte = 0;
            logical += 1;
        }
        Ok(copied)
    }

    /// Writes `data` at `offset`, allocating direct blocks, the indirect
    /// block, and indirect-pointed blocks on demand (first-fit, lowest free
    /// block number). When the volume fills up mid-write the bytes already
    /// written stay durable and the short count is returned: partial
    /// success, not an error. The size grows to `offset + written` when the
    /// write extends past the old end of file, and is untouched otherwise.
    pub fn write(&mut self, inumber: u32, data: &[u8], offset: u32) -> Result<usize> {
        let state = self.mounted.as_mut().ok_or(FsError::NotMounted)?;
        Self::check_range(&state.super_block, inumber)?;

        let mut ino = Self::load_inode(&self.disk, inumber)?;
        if !ino.is_valid() {
            return Err(FsError::InvalidInode(inumber));
        }
        if data.is_empty() {
            return Ok(0);
        }

        let mut logical = offset as usize / BLOCK_SIZE;
        let mut begin_byte = offset as usize % BLOCK_SIZE;
        let mut written = 0;
        let mut inode_dirty = false;
        let mut indirect_pointers = [0u32; POINTERS_PER_BLOCK];
        let mut indirect_loaded = false;
        let mut indirect_dirty = false;

        'blocks: while written < data.len()
            && logical < POINTERS_PER_INODE + POINTERS_PER_BLOCK
        {
            // Resolve the block backing `logical`, allocating if absent.
            // `fresh` blocks start from a zero buffer so the untouched tail
            // of a partially written block stays zero.
            let (ptr, fresh) = if logical < POINTERS_PER_INODE {
                match ino.direct[logical] {
                    0 => match state.data_bitmap.alloc() {
                        Some(block_id) => {
                            ino.direct[logical] = block_id;
                            inode_dirty = true;
                            (block_id, true)
                        }
                        None => break 'blocks,
                    },
                    block_id => (block_id, false),
                }
            } else {
                if ino.indirect == 0 {
                    let Some(block_id) = state.data_bitmap.alloc() else {
                        break 'blocks;
                    };
                    self.disk.write_block(block_id, &ZERO_BLOCK)?;
                    ino.indirect = block_id;
                    inode_dirty = true;
                    // A brand-new indirect block holds no pointers yet.
                    indirect_loaded = true;
                } else if !indirect_loaded {
                    let mut block: Block = ZERO_BLOCK;
                    self.disk.read_block(ino.indirect, &mut block)?;
                    indirect_pointers = inode::decode_pointers(&block);
                    indirect_loaded = true;
                }
                let index = logical - POINTERS_PER_INODE;
                match indirect_pointers[index] {
                    0 => match state.data_bitmap.alloc() {
                        Some(block_id) => {
                            indirect_pointers[index] = block_id;
                            indirect_dirty = true;
                            (block_id, true)
                        }
                        None => break 'blocks,
                    },
                    block_id => (block_id, false),
                }
            };

            let take = min(data.len() - written, BLOCK_SIZE - begin_byte);
            let mut block: Block = ZERO_BLOCK;
            if !fresh && take < BLOCK_SIZE {
                // Partial overwrite of an existing block: preserve the
                // bytes outside the written range.
                self.disk.read_block(ptr, &mut block)?;
            }
            block[begin_byte..begin_byte + take].copy_from_slice(&data[written..written + take]);
            self.disk.write_block(ptr, &block)?;

            written += take;
            begin_byte = 0;
            logical += 1;
        }

        if indirect_dirty {
            let mut block: Block = ZERO_BLOCK;
            inode::encode_pointers(&indirect_pointers, &mut block);
            self.disk.write_block(ino.indirect, &block)?;
        }

        // Grow by exactly the newly covered byte range, once.
        let end = offset + written as u32;
        if written > 0 && end > ino.size {
            ino.size = end;
            inode_dirty = true;
        }
        if inode_dirty {
            Self::store_inode(&self.disk, inumber, &ino)?;
        }

        if written < data.len() {
            debug!(
                "short write on inode {}: {} of {} bytes (volume full)",
                inumber,
                written,
                data.len()
            );
        }
        Ok(written)
    }

    fn state(&self) -> Result<&Mounted> {
        self.mounted.as_ref().ok_or(FsError::NotMounted)
    }

    fn check_range(sb: &SuperBlock, inumber: u32) -> Result<()> {
        if inumber == 0 || inumber >= sb.ninodes {
            return Err(FsError::OutOfRange(inumber));
        }
        Ok(())
    }

    /// Reads the inode record straight from its table block.
    fn load_inode(disk: &D, inumber: u32) -> Result<Inode> {
        let mut block: Block = ZERO_BLOCK;
        disk.read_block(inode::table_block(inumber), &mut block)?;
        inode::decode_at(&block, inode::table_slot(inumber))
    }

    /// Read-modify-writes the whole table block holding the record; the
    /// device cannot write anything smaller.
    fn store_inode(disk: &D, inumber: u32, ino: &Inode) -> Result<()> {
        let mut block: Block = ZERO_BLOCK;
        disk.read_block(inode::table_block(inumber), &mut block)?;
        inode::encode_at(ino, &mut block, inode::table_slot(inumber))?;
        disk.write_block(inode::table_block(inumber), &block)?;
        Ok(())
    }
}

/// Per-inode entry of a [`VolumeReport`].
#[derive(Debug, Clone)]
pub struct InodeReport {
    pub inumber: u32,
    pub size: u32,
    pub direct: Vec<u32>,
    pub indirect: Option<u32>,
    pub indirect_pointers: Vec<u32>,
}

impl InodeReport {
    /// Data blocks allocated to this inode, indirect block included.
    pub fn allocated_blocks(&self) -> usize {
        self.direct.len() + self.indirect.map_or(0, |_| 1) + self.indirect_pointers.len()
    }
}

/// Read-only dump of the volume produced by [`FileSystem::debug`].
#[derive(Debug, Clone)]
pub struct VolumeReport {
    pub super_block: SuperBlock,
    pub free_inodes: u32,
    pub free_blocks: u32,
    pub inodes: Vec<InodeReport>,
}

impl fmt::Display for VolumeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "superblock:")?;
        writeln!(f, "    magic number is valid")?;
        writeln!(f, "    {} blocks", self.super_block.nblocks)?;
        writeln!(f, "    {} inode blocks", self.super_block.ninodeblocks)?;
        writeln!(f, "    {} inodes", self.super_block.ninodes)?;
        writeln!(
            f,
            "    {} free blocks, {} free inodes",
            self.free_blocks, self.free_inodes
        )?;
        for ino in &self.inodes {
            writeln!(f, "inode {}:", ino.inumber)?;
            writeln!(f, "    size: {} bytes", ino.size)?;
            if !ino.direct.is_empty() {
                write!(f, "    direct blocks:")?;
                for block_id in &ino.direct {
                    write!(f, " {}", block_id)?;
                }
                writeln!(f)?;
            }
            if let Some(indirect) = ino.indirect {
                writeln!(f, "    indirect block: {}", indirect)?;
                write!(f, "    indirect data blocks:")?;
                for block_id in &ino.indirect_pointers {
                    write!(f, " {}", block_id)?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
