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

use crate::data::{BlockNo, FileInfo, FileMode, Time, NAME_MAX, NUM_INODE_BYTES};

/// Represents an inode as stored at the start of its block.
///
/// The rest of the block is unused. Directories use `dirent_table` and
/// `child_count`; files use `extent_table` and `size`.
#[repr(C, align(8))]
pub struct INode {
    pub mode: FileMode,
    pub uid: u32,
    pub size: u64,

    pub atime: Time,
    pub mtime: Time,

    pub extent_table: BlockNo,
    pub dirent_table: BlockNo,
    pub child_count: u32,
    _pad: u32,

    name: [u8; NAME_MAX + 1],
}

const _: () = assert!(core::mem::size_of::<INode>() == NUM_INODE_BYTES);

impl INode {
    pub fn reset(&mut self, mode: FileMode, uid: u32, name: &str, now: Time) {
        self.mode = mode;
        self.uid = uid;
        self.size = 0;
        self.atime = now;
        self.mtime = now;
        self.extent_table = 0;
        self.dirent_table = 0;
        self.child_count = 0;
        self._pad = 0;
        self.set_name(name);
    }

    /// Returns the name of the inode
    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_MAX);
        // names are only ever written from &str
        core::str::from_utf8(&self.name[..len]).unwrap_or("")
    }

    /// Sets the name of the inode to the given one
    ///
    /// Assumes that the caller has checked the name length.
    pub fn set_name(&mut self, name: &str) {
        debug_assert!(name.len() <= NAME_MAX, "inode name too long");
        self.name = [0; NAME_MAX + 1];
        self.name[..name.len()].copy_from_slice(name.as_bytes());
    }

    pub fn fill_info(&self, info: &mut FileInfo) {
        info.mode = self.mode.bits();
        info.size = if self.mode.is_dir() { 0 } else { self.size };
        info.atime = self.atime;
        info.mtime = self.mtime;
    }
}
