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

use crate::data::{
    self, Bitmap, BlockNo, DirEntryTable, ExtentTable, FileMode, INode, SuperBlock,
    NUM_INODE_BYTES, NUM_SB_BYTES,
};
use crate::error::{Code, Error};
use crate::BLOCK_SIZE;

/// Handle granting typed views over the arena for the duration of one
/// operation.
///
/// The handle is rebuilt from the raw arena on every call; nothing derived
/// from the arena's base address survives it. All references stored on the
/// arena are block indices, so the arena contents remain valid when the
/// region is persisted and mapped again at a different address.
pub struct FsHandle<'a> {
    mem: &'a mut [u8],
}

impl<'a> FsHandle<'a> {
    /// Attaches to the given arena, initializing it first if it does not
    /// carry a valid superblock yet.
    pub fn attach(mem: &'a mut [u8]) -> Result<Self, Error> {
        // the typed views below require the base to be 8-byte aligned, which
        // every page- or malloc-backed mapping satisfies
        if mem.as_ptr() as usize % 8 != 0 || mem.len() < NUM_SB_BYTES {
            return Err(Error::new(Code::BadFs));
        }

        let mut hdl = FsHandle { mem };
        if !hdl.superblock().is_valid() {
            hdl.format()?;
        }
        else if hdl.superblock().block_count as usize * BLOCK_SIZE > hdl.mem.len() {
            // the arena was persisted from a larger region than it is
            // mapped into now
            return Err(Error::new(Code::BadFs));
        }
        Ok(hdl)
    }

    /// Lays out superblock, bitmap and root directory on a fresh arena.
    ///
    /// The region is treated as zero-filled; only the metadata region and
    /// the root inode block are written.
    fn format(&mut self) -> Result<(), Error> {
        let total_size = self.mem.len() as u64;
        let block_count = (self.mem.len() / BLOCK_SIZE) as u32;

        self.superblock_mut().init(total_size, block_count);
        let sb = self.superblock();
        let meta_blocks = sb.meta_blocks();
        let bitmap_bits = sb.bitmap_bytes() * 8;

        // at least the root inode and one dirent table block must fit
        if block_count <= meta_blocks || block_count - meta_blocks < 2 {
            self.superblock_mut().magic = 0;
            return Err(Error::new(Code::BadFs));
        }

        self.bitmap_region_mut().fill(0);
        let mut bitmap = self.bitmap_mut();
        for bno in 0..meta_blocks as usize {
            bitmap.set_bit(bno);
        }
        // the spare bits of the last bitmap byte must never be handed out
        for bit in block_count as usize..bitmap_bits {
            bitmap.set_bit(bit);
        }
        self.superblock_mut().free_blocks = block_count - meta_blocks;

        let root = data::alloc(self)?;
        self.inode_mut(root)
            .reset(FileMode::DIR_DEF, 0, "/", data::time_now());
        self.superblock_mut().root_inode = root;

        log::debug!(
            "arena::format(size={}, blocks={}, meta={}, root={})",
            total_size,
            block_count,
            meta_blocks,
            root
        );
        Ok(())
    }

    pub fn superblock(&self) -> &SuperBlock {
        // safety: attach checked alignment and size
        unsafe { &*self.mem.as_ptr().cast::<SuperBlock>() }
    }

    pub fn superblock_mut(&mut self) -> &mut SuperBlock {
        // safety: attach checked alignment and size
        unsafe { &mut *self.mem.as_mut_ptr().cast::<SuperBlock>() }
    }

    fn bitmap_region_mut(&mut self) -> &mut [u8] {
        let off = self.superblock().bitmap_off as usize;
        let len = self.superblock().bitmap_bytes();
        &mut self.mem[off..off + len]
    }

    pub fn bitmap_mut(&mut self) -> Bitmap<'_> {
        Bitmap::from_bytes(self.bitmap_region_mut())
    }

    /// Number of zero bits in the bitmap; for consistency checks
    pub fn count_free(&self) -> usize {
        let off = self.superblock().bitmap_off as usize;
        let len = self.superblock().bitmap_bytes();
        self.mem[off..off + len]
            .iter()
            .map(|b| b.count_zeros() as usize)
            .sum()
    }

    pub fn block(&self, bno: BlockNo) -> &[u8] {
        debug_assert!(bno < self.superblock().block_count, "block out of range");
        let off = bno as usize * BLOCK_SIZE;
        &self.mem[off..off + BLOCK_SIZE]
    }

    pub fn block_mut(&mut self, bno: BlockNo) -> &mut [u8] {
        debug_assert!(bno < self.superblock().block_count, "block out of range");
        let off = bno as usize * BLOCK_SIZE;
        &mut self.mem[off..off + BLOCK_SIZE]
    }

    pub fn inode(&self, bno: BlockNo) -> &INode {
        let block = self.block(bno);
        debug_assert!(block.len() >= NUM_INODE_BYTES);
        // safety: blocks are 4K-sized and -aligned within an 8-aligned arena
        unsafe { &*block.as_ptr().cast::<INode>() }
    }

    pub fn inode_mut(&mut self, bno: BlockNo) -> &mut INode {
        let block = self.block_mut(bno);
        // safety: see inode()
        unsafe { &mut *block.as_mut_ptr().cast::<INode>() }
    }

    pub fn dirent_table(&self, bno: BlockNo) -> &DirEntryTable {
        // safety: see inode()
        unsafe { &*self.block(bno).as_ptr().cast::<DirEntryTable>() }
    }

    pub fn dirent_table_mut(&mut self, bno: BlockNo) -> &mut DirEntryTable {
        // safety: see inode()
        unsafe { &mut *self.block_mut(bno).as_mut_ptr().cast::<DirEntryTable>() }
    }

    pub fn extent_table(&self, bno: BlockNo) -> &ExtentTable {
        // safety: see inode()
        unsafe { &*self.block(bno).as_ptr().cast::<ExtentTable>() }
    }

    pub fn extent_table_mut(&mut self, bno: BlockNo) -> &mut ExtentTable {
        // safety: see inode()
        unsafe { &mut *self.block_mut(bno).as_mut_ptr().cast::<ExtentTable>() }
    }

    /// Verifies that the superblock's free counter matches the bitmap and
    /// that the root inode is an allocated directory.
    pub fn check(&self) -> Result<(), Error> {
        let sb = self.superblock();
        if !sb.is_valid() {
            return Err(Error::new(Code::BadFs));
        }
        if self.count_free() != sb.free_blocks as usize {
            return Err(Error::new(Code::BadFs));
        }

        let root = sb.root_inode;
        if root < sb.meta_blocks() || root >= sb.block_count {
            return Err(Error::new(Code::BadFs));
        }
        let root_allocated = {
            let off = sb.bitmap_off as usize + root as usize / 8;
            (self.mem[off] >> (root as usize % 8)) & 1 == 1
        };
        if !root_allocated || !self.inode(root).mode.is_dir() {
            return Err(Error::new(Code::BadFs));
        }
        Ok(())
    }
}
