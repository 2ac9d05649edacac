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

mod allocator;
mod bitmap;
mod direntry;
mod extent;
mod inode;
mod superblock;

pub use allocator::{alloc, free, AllocJournal, Owner};
pub use bitmap::Bitmap;
pub use direntry::{DirEntry, DirEntryTable};
pub use extent::ExtentTable;
pub use inode::INode;
pub use superblock::{SuperBlock, NUM_SB_BYTES};

use bitflags::bitflags;

use std::time::{SystemTime, UNIX_EPOCH};

/// Block index within the arena; the only reference type stored on the arena.
pub type BlockNo = u32;
/// Timestamp in nanoseconds since the Unix epoch.
pub type Time = u64;

pub const NAME_MAX: usize = 255;
pub const NUM_INODE_BYTES: usize = 304;
pub const DIR_ENTRY_LEN: usize = 260;
pub const DIR_ENTRIES_PER_BLOCK: usize = 15;
/// 8-byte slots per extent table block; the last one links to the next table.
pub const EXT_SLOTS: usize = crate::BLOCK_SIZE / 8;
pub const EXT_PER_BLOCK: usize = EXT_SLOTS - 1;

bitflags! {
    pub struct FileMode : u32 {
        const IFMT      = 0o0170000;
        const IFREG     = 0o0100000;
        const IFDIR     = 0o0040000;

        const FILE_DEF  = Self::IFREG.bits | 0o0755;
        const DIR_DEF   = Self::IFDIR.bits | 0o0755;
    }
}

#[allow(dead_code)]
impl FileMode {
    pub fn is_dir(self) -> bool {
        (self & Self::IFMT) == Self::IFDIR
    }

    pub fn is_reg(self) -> bool {
        (self & Self::IFMT) == Self::IFREG
    }
}

/// The attributes reported for a single file or directory
#[derive(Clone, Copy, Debug, Default)]
pub struct FileInfo {
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub atime: Time,
    pub mtime: Time,
}

/// The filesystem-wide statistics reported by statfs
#[derive(Clone, Copy, Debug, Default)]
pub struct FsStats {
    pub block_size: u32,
    pub total_blocks: u32,
    pub free_blocks: u32,
    pub avail_blocks: u32,
    pub name_max: u32,
}

/// Returns the current wall-clock time in nanoseconds since the epoch
pub fn time_now() -> Time {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as Time)
        .unwrap_or(0)
}
