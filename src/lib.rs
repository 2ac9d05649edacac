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

//! An in-memory filesystem over a caller-provided arena.
//!
//! All filesystem state lives inside a single contiguous byte region. Every
//! reference stored in the region is a block index, never an address, so the
//! region can be written out on unmount and mapped again somewhere else: the
//! filesystem comes back verbatim.
//!
//! The host adapter passes the arena to every operation; the first operation
//! on a zeroed region lays out the filesystem. The adapter serializes calls
//! (one operation at a time per arena) and owns everything outside the
//! region: the mapping itself, argument parsing and the translation of
//! [`Error`] values into numeric status codes via [`Code::errno`].

mod arena;
mod data;
mod error;
mod ops;

#[cfg(test)]
mod tests;

use arena::FsHandle;

pub use data::{FileInfo, FsStats, Time, NAME_MAX};
pub use error::{Code, Error};

/// Identifies an initialized arena ("arenafs1")
pub const MAGIC: u64 = 0x3173_6166_616e_6572;
pub const BLOCK_SIZE: usize = 4096;

/// Returns the attributes of the file or directory at `path`.
///
/// `uid`/`gid` are echoed back in the result; ownership is not enforced.
pub fn getattr(arena: &mut [u8], path: &str, uid: u32, gid: u32) -> Result<FileInfo, Error> {
    let hdl = FsHandle::attach(arena)?;
    log::debug!("fs::getattr(path={})", path);

    let bno = ops::dirs::resolve(&hdl, path)?;
    let ino = hdl.inode(bno);

    let mut info = FileInfo::default();
    ino.fill_info(&mut info);
    info.uid = uid;
    info.gid = gid;
    info.nlink = if ino.mode.is_dir() {
        let subdirs = ops::links::entries(&hdl, bno)
            .iter()
            .filter(|entry| hdl.inode(entry.1).mode.is_dir())
            .count();
        2 + subdirs as u32
    }
    else {
        1
    };
    Ok(info)
}

/// Returns the child names of the directory at `path` and updates its
/// access time. `.` and `..` are not included.
pub fn readdir(arena: &mut [u8], path: &str) -> Result<Vec<String>, Error> {
    let mut hdl = FsHandle::attach(arena)?;
    log::debug!("fs::readdir(path={})", path);
    ops::dirs::readdir(&mut hdl, path)
}

/// Creates an empty file at `path`, owned by `uid`.
pub fn mknod(arena: &mut [u8], path: &str, uid: u32) -> Result<(), Error> {
    let mut hdl = FsHandle::attach(arena)?;
    log::debug!("fs::mknod(path={}, uid={})", path, uid);
    ops::dirs::mknod(&mut hdl, path, uid)
}

/// Removes the file at `path` and releases all of its blocks.
pub fn unlink(arena: &mut [u8], path: &str) -> Result<(), Error> {
    let mut hdl = FsHandle::attach(arena)?;
    log::debug!("fs::unlink(path={})", path);
    ops::dirs::unlink(&mut hdl, path)
}

/// Removes the empty directory at `path`.
pub fn rmdir(arena: &mut [u8], path: &str) -> Result<(), Error> {
    let mut hdl = FsHandle::attach(arena)?;
    log::debug!("fs::rmdir(path={})", path);
    ops::dirs::rmdir(&mut hdl, path)
}

/// Creates an empty directory at `path`, owned by `uid`.
pub fn mkdir(arena: &mut [u8], path: &str, uid: u32) -> Result<(), Error> {
    let mut hdl = FsHandle::attach(arena)?;
    log::debug!("fs::mkdir(path={}, uid={})", path, uid);
    ops::dirs::mkdir(&mut hdl, path, uid)
}

/// Renames `from` to `to`, overwriting a compatible existing target.
pub fn rename(arena: &mut [u8], from: &str, to: &str) -> Result<(), Error> {
    let mut hdl = FsHandle::attach(arena)?;
    log::debug!("fs::rename(from={}, to={})", from, to);
    ops::dirs::rename(&mut hdl, from, to)
}

/// Truncates the file at `path` to `new_size` bytes. Growing leaves holes.
pub fn truncate(arena: &mut [u8], path: &str, new_size: u64) -> Result<(), Error> {
    let mut hdl = FsHandle::attach(arena)?;
    log::debug!("fs::truncate(path={}, new_size={})", path, new_size);

    let bno = ops::dirs::resolve(&hdl, path)?;
    if hdl.inode(bno).mode.is_dir() {
        return Err(Error::new(Code::IsDir));
    }
    ops::inodes::truncate(&mut hdl, bno, new_size);
    Ok(())
}

/// Verifies that `path` exists. No descriptor state is kept.
pub fn open(arena: &mut [u8], path: &str) -> Result<(), Error> {
    let hdl = FsHandle::attach(arena)?;
    log::debug!("fs::open(path={})", path);
    ops::dirs::resolve(&hdl, path).map(|_| ())
}

/// Reads up to `buf.len()` bytes from the file at `path`, beginning at
/// `offset`. Returns the number of bytes read, which is smaller than the
/// buffer when the file ends first. Holes read as zeros.
pub fn read(arena: &mut [u8], path: &str, offset: u64, buf: &mut [u8]) -> Result<usize, Error> {
    let mut hdl = FsHandle::attach(arena)?;
    log::debug!("fs::read(path={}, offset={}, len={})", path, offset, buf.len());

    let bno = ops::dirs::resolve(&hdl, path)?;
    if hdl.inode(bno).mode.is_dir() {
        return Err(Error::new(Code::IsDir));
    }
    ops::inodes::read_at(&mut hdl, bno, offset, buf)
}

/// Writes `buf` to the file at `path`, beginning at `offset`, growing the
/// file as needed. Returns the number of bytes written.
pub fn write(arena: &mut [u8], path: &str, offset: u64, buf: &[u8]) -> Result<usize, Error> {
    let mut hdl = FsHandle::attach(arena)?;
    log::debug!("fs::write(path={}, offset={}, len={})", path, offset, buf.len());

    let bno = ops::dirs::resolve(&hdl, path)?;
    if hdl.inode(bno).mode.is_dir() {
        return Err(Error::new(Code::IsDir));
    }
    ops::inodes::write_at(&mut hdl, bno, offset, buf)
}

/// Sets the access and modification time of `path` to the given values,
/// which may lie in the past or the future.
pub fn utimens(arena: &mut [u8], path: &str, atime: Time, mtime: Time) -> Result<(), Error> {
    let mut hdl = FsHandle::attach(arena)?;
    log::debug!("fs::utimens(path={}, atime={}, mtime={})", path, atime, mtime);

    let bno = ops::dirs::resolve(&hdl, path)?;
    let ino = hdl.inode_mut(bno);
    ino.atime = atime;
    ino.mtime = mtime;
    Ok(())
}

/// Reports the filesystem geometry and the current free block count.
pub fn statfs(arena: &mut [u8]) -> Result<FsStats, Error> {
    let hdl = FsHandle::attach(arena)?;
    log::debug!("fs::statfs()");

    let sb = hdl.superblock();
    Ok(FsStats {
        block_size: sb.block_size,
        total_blocks: sb.block_count,
        free_blocks: sb.free_blocks,
        avail_blocks: sb.free_blocks,
        name_max: NAME_MAX as u32,
    })
}

/// Verifies the arena's consistency: the free counter must match the
/// bitmap and the root inode must be an allocated directory.
pub fn check(arena: &mut [u8]) -> Result<(), Error> {
    FsHandle::attach(arena)?.check()
}
