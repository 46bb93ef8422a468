//! Online defragmentation: repacks every live data block into a contiguous
//! run starting right after the inode table, in inode / direct / indirect
//! order, repairing each pointer that referenced a relocated block.
//!
//! The "who else owns this block" search is a full rescan of the inode
//! table and every indirect array, once per displaced block. Quadratic in
//! live blocks, and fine for a volume this size; a reverse index would be
//! the next step if it ever mattered.

use log::{debug, info};

use crate::disk::{Block, BlockDevice, ZERO_BLOCK};
use crate::fs::config::{POINTERS_PER_BLOCK, POINTERS_PER_INODE, SUPER_BLOCK_ID};
use crate::fs::data_bitmap::DataBitmap;
use crate::fs::inode;
use crate::fs::inode_bitmap::InodeBitmap;
use crate::fs::super_block::SuperBlock;
use crate::fs::{FileSystem, FsError, Result};

/// Location of one block pointer on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PtrSlot {
    /// `direct[slot]` of an inode record.
    Direct { inumber: u32, slot: usize },
    /// The `indirect` field of an inode record.
    Indirect { inumber: u32 },
    /// Entry `index` of an inode's indirect pointer array.
    Entry { inumber: u32, index: usize },
}

impl<D: BlockDevice> FileSystem<D> {
    /// Compacts all live data blocks toward the front of the data region.
    ///
    /// Every pointer rewrite is persisted immediately and inodes are
    /// reloaded from disk at each step, because repairing the displaced
    /// owner of a swapped block may rewrite a pointer of the very inode
    /// being walked.
    pub fn defrag(&mut self) -> Result<()> {
        let state = self.mounted.as_mut().ok_or(FsError::NotMounted)?;

        let mut block: Block = ZERO_BLOCK;
        self.disk.read_block(SUPER_BLOCK_ID, &mut block)?;
        let sb = SuperBlock::decode(&block)?;
        if !sb.is_valid() {
            return Err(FsError::InvalidMagic);
        }

        let inode_bitmap = &state.inode_bitmap;
        let data_bitmap = &mut state.data_bitmap;

        let mut pos = sb.first_data_block();
        info!("defrag: packing live blocks from block {}", pos);

        'volume: for inumber in 1..sb.ninodes {
            if !inode_bitmap.is_used(inumber) {
                continue;
            }

            for slot in 0..POINTERS_PER_INODE {
                if pos >= sb.nblocks {
                    break 'volume;
                }
                // Reload every time: an earlier owner repair may have
                // rewritten this very record on disk.
                let ino = Self::load_inode(&self.disk, inumber)?;
                let ptr = ino.direct[slot];
                if ptr == 0 {
                    continue;
                }
                if ptr != pos {
                    Self::relocate(
                        &self.disk,
                        data_bitmap,
                        inode_bitmap,
                        &sb,
                        ptr,
                        pos,
                        PtrSlot::Direct { inumber, slot },
                    )?;
                }
                pos += 1;
            }

            let ino = Self::load_inode(&self.disk, inumber)?;
            if ino.indirect == 0 {
                continue;
            }
            if pos >= sb.nblocks {
                break;
            }
            if ino.indirect != pos {
                Self::relocate(
                    &self.disk,
                    data_bitmap,
                    inode_bitmap,
                    &sb,
                    ino.indirect,
                    pos,
                    PtrSlot::Indirect { inumber },
                )?;
            }
            pos += 1;

            for index in 0..POINTERS_PER_BLOCK {
                if pos >= sb.nblocks {
                    break 'volume;
                }
                let ino = Self::load_inode(&self.disk, inumber)?;
                self.disk.read_block(ino.indirect, &mut block)?;
                let ptr = inode::decode_pointers(&block)[index];
                if ptr == 0 {
                    continue;
                }
                if ptr != pos {
                    Self::relocate(
                        &self.disk,
                        data_bitmap,
                        inode_bitmap,
                        &sb,
                        ptr,
                        pos,
                        PtrSlot::Entry { inumber, index },
                    )?;
                }
                pos += 1;
            }
        }

        info!("defrag: done, data region packed up to block {}", pos);
        Ok(())
    }

    /// Moves the block referenced by `cur` from `from` to `to`.
    ///
    /// If `to` is free this is a plain move (the vacated block is zeroed,
    /// keeping the free pool scrubbed). If `to` holds another live block,
    /// the two block contents are swapped on disk and the displaced owner's
    /// pointer is repaired to point at `from`.
    fn relocate(
        disk: &D,
        data_bitmap: &mut DataBitmap,
        inode_bitmap: &InodeBitmap,
        sb: &SuperBlock,
        from: u32,
        to: u32,
        cur: PtrSlot,
    ) -> Result<()> {
        if !data_bitmap.is_used(to) {
            let mut block: Block = ZERO_BLOCK;
            disk.read_block(from, &mut block)?;
            disk.write_block(to, &block)?;
            disk.write_block(from, &ZERO_BLOCK)?;
            data_bitmap.free_block(from);
            data_bitmap.set(to);
            Self::rewrite_slot(disk, cur, to)?;
            debug!("defrag: moved block {} -> {}", from, to);
            return Ok(());
        }

        // `to` is occupied by some other live block: swap contents, point
        // the current slot at `to`, then repair whoever owned `to`.
        let mut ours: Block = ZERO_BLOCK;
        let mut theirs: Block = ZERO_BLOCK;
        disk.read_block(from, &mut ours)?;
        disk.read_block(to, &mut theirs)?;
        disk.write_block(to, &ours)?;
        disk.write_block(from, &theirs)?;

        // The current pointer must be persisted before the owner scan so
        // the scan sees consistent indirect arrays through live fields.
        Self::rewrite_slot(disk, cur, to)?;

        let owner = Self::find_owner(disk, inode_bitmap, sb, to, cur)?.ok_or_else(|| {
            FsError::Corrupted(format!("block {} is marked used but has no owner", to))
        })?;
        Self::rewrite_slot(disk, owner, from)?;
        debug!("defrag: swapped blocks {} <-> {}", from, to);
        Ok(())
    }

    /// Rewrites the pointer at `slot` to `value`, persisting the containing
    /// inode-table block or indirect array block.
    fn rewrite_slot(disk: &D, slot: PtrSlot, value: u32) -> Result<()> {
        match slot {
            PtrSlot::Direct { inumber, slot } => {
                let mut ino = Self::load_inode(disk, inumber)?;
                ino.direct[slot] = value;
                Self::store_inode(disk, inumber, &ino)
            }
            PtrSlot::Indirect { inumber } => {
                let mut ino = Self::load_inode(disk, inumber)?;
                ino.indirect = value;
                Self::store_inode(disk, inumber, &ino)
            }
            PtrSlot::Entry { inumber, index } => {
                let ino = Self::load_inode(disk, inumber)?;
                let mut block: Block = ZERO_BLOCK;
                disk.read_block(ino.indirect, &mut block)?;
                let mut pointers = inode::decode_pointers(&block);
                pointers[index] = value;
                inode::encode_pointers(&pointers, &mut block);
                disk.write_block(ino.indirect, &block)
                    .map_err(FsError::from)
            }
        }
    }

    /// Scans every valid inode's direct pointers, indirect field, and
    /// indirect array for a pointer equal to `target`, skipping the slot
    /// the caller just rewrote. Fields are checked before arrays are
    /// dereferenced, so an indirect block sitting at `target` is found by
    /// its field and its contents are never misread as pointers.
    fn find_owner(
        disk: &D,
        inode_bitmap: &InodeBitmap,
        sb: &SuperBlock,
        target: u32,
        skip: PtrSlot,
    ) -> Result<Option<PtrSlot>> {
        for inumber in 1..sb.ninodes {
            if !inode_bitmap.is_used(inumber) {
                continue;
            }
            let ino = Self::load_inode(disk, inumber)?;

            for slot in 0..POINTERS_PER_INODE {
                let loc = PtrSlot::Direct { inumber, slot };
                if loc != skip && ino.direct[slot] == target {
                    return Ok(Some(loc));
                }
            }

            if ino.indirect == 0 {
                continue;
            }
            let loc = PtrSlot::Indirect { inumber };
            if loc != skip && ino.indirect == target {
                return Ok(Some(loc));
            }

            let mut block: Block = ZERO_BLOCK;
            disk.read_block(ino.indirect, &mut block)?;
            let pointers = inode::decode_pointers(&block);
            for (index, &ptr) in pointers.iter().enumerate() {
                let loc = PtrSlot::Entry { inumber, index };
                if loc != skip && ptr == target {
                    return Ok(Some(loc));
                }
            }
        }
        Ok(None)
    }
}
