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
use crate::data::{self, AllocJournal, BlockNo, FileMode, Owner, EXT_PER_BLOCK};
use crate::error::Error;
use crate::BLOCK_SIZE;

/// Creates a new inode with given mode in a freshly allocated block and
/// returns its block index.
pub fn create(
    hdl: &mut FsHandle<'_>,
    mode: FileMode,
    uid: u32,
    name: &str,
) -> Result<BlockNo, Error> {
    let bno = data::alloc(hdl)?;
    hdl.inode_mut(bno).reset(mode, uid, name, data::time_now());

    log::trace!("inodes::create(mode={:o}, name={}) -> {}", mode.bits(), name, bno);
    Ok(bno)
}

/// Destroys the given inode: every block it references (data blocks, extent
/// tables, dirent tables) is released, then the inode block itself.
///
/// For directories the caller must have emptied the directory first.
pub fn free(hdl: &mut FsHandle<'_>, bno: BlockNo) {
    log::trace!("inodes::free(bno={})", bno);

    if hdl.inode(bno).mode.is_dir() {
        debug_assert!(hdl.inode(bno).child_count == 0, "freeing non-empty directory");
        let mut table = hdl.inode(bno).dirent_table;
        while table != 0 {
            let next = hdl.dirent_table(table).next();
            data::free(hdl, table);
            table = next;
        }
    }
    else {
        let mut table = hdl.inode(bno).extent_table;
        while table != 0 {
            for slot in 0..EXT_PER_BLOCK {
                let dblock = hdl.extent_table(table).get(slot);
                if dblock != 0 {
                    data::free(hdl, dblock);
                }
            }
            let next = hdl.extent_table(table).next();
            data::free(hdl, table);
            table = next;
        }
    }

    data::free(hdl, bno);
}

/// Returns the data block holding logical block `n` of the file, or 0 if
/// that part of the file is a hole.
fn file_block(hdl: &FsHandle<'_>, ino: BlockNo, n: usize) -> BlockNo {
    let mut table = hdl.inode(ino).extent_table;
    let mut n = n;
    while table != 0 && n >= EXT_PER_BLOCK {
        table = hdl.extent_table(table).next();
        n -= EXT_PER_BLOCK;
    }
    if table == 0 {
        0
    }
    else {
        hdl.extent_table(table).get(n)
    }
}

/// Returns the data block for logical block `n`, extending the extent table
/// chain and allocating the data block as necessary. Every allocation is
/// recorded in the journal so the caller can undo a partial write.
fn ensure_file_block(
    hdl: &mut FsHandle<'_>,
    ino: BlockNo,
    n: usize,
    journal: &mut AllocJournal,
) -> Result<BlockNo, Error> {
    let mut table = hdl.inode(ino).extent_table;
    if table == 0 {
        let new = data::alloc(hdl)?;
        hdl.inode_mut(ino).extent_table = new;
        journal.record(new, Owner::InodeExtent { inode: ino });
        table = new;
    }

    let mut rem = n;
    while rem >= EXT_PER_BLOCK {
        let next = hdl.extent_table(table).next();
        let next = if next == 0 {
            let new = data::alloc(hdl)?;
            hdl.extent_table_mut(table).set_next(new);
            journal.record(new, Owner::ExtentChain { table });
            new
        }
        else {
            next
        };
        table = next;
        rem -= EXT_PER_BLOCK;
    }

    let bno = hdl.extent_table(table).get(rem);
    if bno != 0 {
        return Ok(bno);
    }
    let new = data::alloc(hdl)?;
    hdl.extent_table_mut(table).set(rem, new);
    journal.record(new, Owner::ExtentSlot { table, slot: rem });
    Ok(new)
}

/// Copies up to `buf.len()` bytes beginning at `off` into `buf`.
///
/// Reads past the end of the file return fewer bytes; holes read as zeros.
pub fn read_at(
    hdl: &mut FsHandle<'_>,
    ino: BlockNo,
    off: u64,
    buf: &mut [u8],
) -> Result<usize, Error> {
    let size = hdl.inode(ino).size;
    let len = if off >= size {
        0
    }
    else {
        buf.len().min((size - off) as usize)
    };

    let mut pos = 0;
    while pos < len {
        let cur = off as usize + pos;
        let boff = cur % BLOCK_SIZE;
        let chunk = (BLOCK_SIZE - boff).min(len - pos);

        let bno = file_block(hdl, ino, cur / BLOCK_SIZE);
        if bno == 0 {
            buf[pos..pos + chunk].fill(0);
        }
        else {
            buf[pos..pos + chunk].copy_from_slice(&hdl.block(bno)[boff..boff + chunk]);
        }
        pos += chunk;
    }

    hdl.inode_mut(ino).atime = data::time_now();
    Ok(len)
}

/// Copies `buf` into the file beginning at `off`, growing it as needed.
///
/// Writing past the current size leaves the skipped range as holes. If the
/// arena runs out of blocks midway, everything allocated by this call is
/// rolled back and the file keeps its previous size.
pub fn write_at(
    hdl: &mut FsHandle<'_>,
    ino: BlockNo,
    off: u64,
    buf: &[u8],
) -> Result<usize, Error> {
    let mut journal = AllocJournal::new();

    let mut pos = 0;
    while pos < buf.len() {
        let cur = off as usize + pos;
        let boff = cur % BLOCK_SIZE;
        let chunk = (BLOCK_SIZE - boff).min(buf.len() - pos);

        let bno = match ensure_file_block(hdl, ino, cur / BLOCK_SIZE, &mut journal) {
            Ok(bno) => bno,
            Err(e) => {
                journal.rollback(hdl);
                return Err(e);
            },
        };
        hdl.block_mut(bno)[boff..boff + chunk].copy_from_slice(&buf[pos..pos + chunk]);
        pos += chunk;
    }

    let now = data::time_now();
    let end = off + buf.len() as u64;
    let inode = hdl.inode_mut(ino);
    if end > inode.size {
        inode.size = end;
    }
    inode.atime = now;
    inode.mtime = now;
    Ok(buf.len())
}

/// Truncates the file to `new_size`.
///
/// Shrinking releases every data block whose entire range lies beyond the
/// new size (and extent tables that no longer index anything) and zeroes the
/// tail of the last retained block. Growing only raises the logical size;
/// the added range consists of holes.
pub fn truncate(hdl: &mut FsHandle<'_>, ino: BlockNo, new_size: u64) {
    log::trace!("inodes::truncate(inode={}, new_size={})", ino, new_size);

    let old_size = hdl.inode(ino).size;
    if new_size < old_size {
        // number of data blocks still covered by the new size
        let keep = ((new_size + BLOCK_SIZE as u64 - 1) / BLOCK_SIZE as u64) as usize;
        let keep_tables = (keep + EXT_PER_BLOCK - 1) / EXT_PER_BLOCK;

        let mut chain = Vec::new();
        let mut table = hdl.inode(ino).extent_table;
        while table != 0 {
            chain.push(table);
            table = hdl.extent_table(table).next();
        }

        for (k, &table) in chain.iter().enumerate().rev() {
            let first_freed = keep.saturating_sub(k * EXT_PER_BLOCK).min(EXT_PER_BLOCK);
            for slot in first_freed..EXT_PER_BLOCK {
                let dblock = hdl.extent_table(table).get(slot);
                if dblock != 0 {
                    hdl.extent_table_mut(table).set(slot, 0);
                    data::free(hdl, dblock);
                }
            }
            if k >= keep_tables {
                if k == 0 {
                    hdl.inode_mut(ino).extent_table = 0;
                }
                else {
                    hdl.extent_table_mut(chain[k - 1]).set_next(0);
                }
                data::free(hdl, table);
            }
        }

        // the tail of the last retained block must read as zeros if the
        // file grows over it again later
        let tail = (new_size % BLOCK_SIZE as u64) as usize;
        if tail != 0 {
            let last = file_block(hdl, ino, keep - 1);
            if last != 0 {
                hdl.block_mut(last)[tail..].fill(0);
            }
        }
    }

    let inode = hdl.inode_mut(ino);
    inode.size = new_size;
    inode.mtime = data::time_now();
}
