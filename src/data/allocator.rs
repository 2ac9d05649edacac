/*
 * This file is part of ArenaFS.
 *
 * ArenaFS is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License version 2 as
 * published by the Free Software Foundation.
 *
 * ArenaFS is distributed in the hope that it will be useful, but
 * WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
 * General Public License version 2 for more details.
 */

use crate::arena::FsHandle;
use crate::data::{Bitmap, BlockNo};
use crate::error::{Code, Error};

/// Allocates the lowest-indexed free block, marks it in the bitmap and
/// zero-fills it.
pub fn alloc(hdl: &mut FsHandle<'_>) -> Result<BlockNo, Error> {
    let total = hdl.superblock().block_count as usize;

    let mut found = None;
    {
        let bitmap = hdl.bitmap_mut();

        // first, skip quickly over words that have no free bits
        let mut i = 0;
        while i < total && bitmap.is_word_set(i) {
            i += Bitmap::WORD_BITS;
        }
        // now walk to the actual first free bit
        while i < total && bitmap.is_bit_set(i) {
            i += 1;
        }

        if i < total {
            found = Some(i as BlockNo);
        }
    }

    let bno = match found {
        Some(bno) => bno,
        None => return Err(Error::new(Code::NoSpace)),
    };

    hdl.bitmap_mut().set_bit(bno as usize);
    let sb = hdl.superblock_mut();
    debug_assert!(sb.free_blocks > 0, "free count and bitmap out of sync");
    sb.free_blocks -= 1;

    hdl.block_mut(bno).fill(0);

    log::trace!("alloc::alloc() -> {}", bno);
    Ok(bno)
}

/// Releases the given block and zero-fills it. Freeing an unallocated block
/// is a programming error and trips in debug builds.
pub fn free(hdl: &mut FsHandle<'_>, bno: BlockNo) {
    log::trace!("alloc::free(bno={})", bno);
    debug_assert!(bno >= hdl.superblock().meta_blocks(), "freed a meta block");
    debug_assert!(
        hdl.bitmap_mut().is_bit_set(bno as usize),
        "double-free of block {}",
        bno
    );

    hdl.bitmap_mut().unset_bit(bno as usize);
    hdl.superblock_mut().free_blocks += 1;
    hdl.block_mut(bno).fill(0);
}

/// Where a freshly allocated block has been linked into the on-arena graph.
/// Rolling back clears the link before the block is released again.
pub enum Owner {
    /// `inode.extent_table` points at it
    InodeExtent { inode: BlockNo },
    /// Chained behind the given extent table block
    ExtentChain { table: BlockNo },
    /// Data block held by the given extent table slot
    ExtentSlot { table: BlockNo, slot: usize },
}

/// Undo log for operations that allocate more than one block. On failure,
/// everything recorded since entry is unlinked and freed in reverse order,
/// restoring the bitmap and the free counter to their entry values.
pub struct AllocJournal {
    entries: Vec<(BlockNo, Owner)>,
}

impl AllocJournal {
    pub fn new() -> Self {
        AllocJournal {
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, bno: BlockNo, owner: Owner) {
        self.entries.push((bno, owner));
    }

    pub fn rollback(self, hdl: &mut FsHandle<'_>) {
        log::trace!("alloc::rollback({} blocks)", self.entries.len());
        for (bno, owner) in self.entries.into_iter().rev() {
            match owner {
                Owner::InodeExtent { inode } => hdl.inode_mut(inode).extent_table = 0,
                Owner::ExtentChain { table } => hdl.extent_table_mut(table).set_next(0),
                Owner::ExtentSlot { table, slot } => hdl.extent_table_mut(table).set(slot, 0),
            }
            free(hdl, bno);
        }
    }
}
