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

use crate::data::{BlockNo, EXT_PER_BLOCK, EXT_SLOTS};
use crate::BLOCK_SIZE;

/// A block holding the ordered list of data block indices of a file.
///
/// Slot values of 0 represent holes (block 0 holds the superblock and can
/// never be a data block). The last slot links to the next extent table
/// block once a file outgrows a single table.
#[repr(C, align(8))]
pub struct ExtentTable {
    slots: [u64; EXT_SLOTS],
}

const _: () = assert!(core::mem::size_of::<ExtentTable>() == BLOCK_SIZE);

impl ExtentTable {
    pub fn get(&self, idx: usize) -> BlockNo {
        debug_assert!(idx < EXT_PER_BLOCK);
        self.slots[idx] as BlockNo
    }

    pub fn set(&mut self, idx: usize, bno: BlockNo) {
        debug_assert!(idx < EXT_PER_BLOCK);
        self.slots[idx] = bno as u64;
    }

    pub fn next(&self) -> BlockNo {
        self.slots[EXT_SLOTS - 1] as BlockNo
    }

    pub fn set_next(&mut self, bno: BlockNo) {
        self.slots[EXT_SLOTS - 1] = bno as u64;
    }
}
