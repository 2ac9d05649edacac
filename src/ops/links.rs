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
use crate::data::{self, BlockNo, DIR_ENTRIES_PER_BLOCK};
use crate::error::{Code, Error};

/// Returns the table block holding the entries with dense indices
/// `n * DIR_ENTRIES_PER_BLOCK ..`.
fn table_at(hdl: &FsHandle<'_>, dir: BlockNo, n: usize) -> BlockNo {
    let mut bno = hdl.inode(dir).dirent_table;
    for _ in 0..n {
        bno = hdl.dirent_table(bno).next();
    }
    debug_assert!(bno != 0, "dirent chain shorter than entry count implies");
    bno
}

/// Looks up the entry with given name in `dir` and returns the block index
/// of the child's inode.
pub fn lookup(hdl: &FsHandle<'_>, dir: BlockNo, name: &str) -> Result<BlockNo, Error> {
    debug_assert!(hdl.inode(dir).mode.is_dir());

    let mut remaining = hdl.inode(dir).child_count as usize;
    let mut bno = hdl.inode(dir).dirent_table;
    while bno != 0 && remaining > 0 {
        let table = hdl.dirent_table(bno);
        let in_block = remaining.min(DIR_ENTRIES_PER_BLOCK);
        for i in 0..in_block {
            let entry = table.entry(i);
            if entry.name() == name {
                return Ok(entry.nodeno);
            }
        }
        remaining -= in_block;
        bno = table.next();
    }

    Err(Error::new(Code::NoSuchFile))
}

/// Returns all `(name, child)` pairs of `dir` in stored order.
pub fn entries(hdl: &FsHandle<'_>, dir: BlockNo) -> Vec<(String, BlockNo)> {
    let mut out = Vec::with_capacity(hdl.inode(dir).child_count as usize);

    let mut remaining = hdl.inode(dir).child_count as usize;
    let mut bno = hdl.inode(dir).dirent_table;
    while bno != 0 && remaining > 0 {
        let table = hdl.dirent_table(bno);
        let in_block = remaining.min(DIR_ENTRIES_PER_BLOCK);
        for i in 0..in_block {
            let entry = table.entry(i);
            out.push((entry.name().to_string(), entry.nodeno));
        }
        remaining -= in_block;
        bno = table.next();
    }

    out
}

/// Creates an entry in directory `dir` with given name pointing to `child`.
///
/// The first table block is allocated on the first insertion; a further
/// block is chained whenever the last one is full.
pub fn insert(
    hdl: &mut FsHandle<'_>,
    dir: BlockNo,
    name: &str,
    child: BlockNo,
) -> Result<(), Error> {
    log::trace!("links::insert(dir={}, name={}, child={})", dir, name, child);

    if lookup(hdl, dir, name).is_ok() {
        return Err(Error::new(Code::Exists));
    }

    let count = hdl.inode(dir).child_count as usize;
    let slot = count % DIR_ENTRIES_PER_BLOCK;

    let table = if count == 0 {
        let bno = data::alloc(hdl)?;
        hdl.inode_mut(dir).dirent_table = bno;
        bno
    }
    else {
        let mut bno = hdl.inode(dir).dirent_table;
        loop {
            let next = hdl.dirent_table(bno).next();
            if next == 0 {
                break;
            }
            bno = next;
        }
        if slot == 0 {
            // the last table block is full; chain a fresh one
            let new = data::alloc(hdl)?;
            hdl.dirent_table_mut(bno).set_next(new);
            bno = new;
        }
        bno
    };

    let entry = hdl.dirent_table_mut(table).entry_mut(slot);
    entry.set_name(name);
    entry.nodeno = child;
    hdl.inode_mut(dir).child_count += 1;
    Ok(())
}

/// Removes the entry with given name from `dir` and returns the child's
/// inode block.
///
/// The array stays dense: the last entry is swapped into the vacated slot,
/// and a table block that runs empty is unchained and released.
pub fn remove(hdl: &mut FsHandle<'_>, dir: BlockNo, name: &str) -> Result<BlockNo, Error> {
    log::trace!("links::remove(dir={}, name={})", dir, name);

    let count = hdl.inode(dir).child_count as usize;

    let mut found = None;
    let mut bno = hdl.inode(dir).dirent_table;
    let mut base = 0;
    while bno != 0 && base < count && found.is_none() {
        let table = hdl.dirent_table(bno);
        let in_block = (count - base).min(DIR_ENTRIES_PER_BLOCK);
        for i in 0..in_block {
            if table.entry(i).name() == name {
                found = Some((base + i, bno));
                break;
            }
        }
        base += in_block;
        bno = table.next();
    }

    let (idx, idx_table) = match found {
        Some(f) => f,
        None => return Err(Error::new(Code::NoSuchFile)),
    };
    let child = hdl
        .dirent_table(idx_table)
        .entry(idx % DIR_ENTRIES_PER_BLOCK)
        .nodeno;

    let last = count - 1;
    let last_table = table_at(hdl, dir, last / DIR_ENTRIES_PER_BLOCK);
    if idx != last {
        let (last_name, last_node) = {
            let entry = hdl.dirent_table(last_table).entry(last % DIR_ENTRIES_PER_BLOCK);
            (entry.name().to_string(), entry.nodeno)
        };
        let entry = hdl
            .dirent_table_mut(idx_table)
            .entry_mut(idx % DIR_ENTRIES_PER_BLOCK);
        entry.set_name(&last_name);
        entry.nodeno = last_node;
    }
    hdl.dirent_table_mut(last_table)
        .entry_mut(last % DIR_ENTRIES_PER_BLOCK)
        .clear();
    hdl.inode_mut(dir).child_count = last as u32;

    if last % DIR_ENTRIES_PER_BLOCK == 0 {
        // the final table block just ran empty
        if last == 0 {
            hdl.inode_mut(dir).dirent_table = 0;
        }
        else {
            let prev = table_at(hdl, dir, last / DIR_ENTRIES_PER_BLOCK - 1);
            hdl.dirent_table_mut(prev).set_next(0);
        }
        data::free(hdl, last_table);
    }

    Ok(child)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FileMode;
    use crate::ops::inodes;
    use crate::tests::TestArena;

    fn setup(arena: &mut TestArena) -> (FsHandle<'_>, BlockNo) {
        let hdl = FsHandle::attach(arena.bytes()).unwrap();
        let root = hdl.superblock().root_inode;
        (hdl, root)
    }

    #[test]
    fn insert_lookup_remove() {
        let mut arena = TestArena::new(1024 * 1024);
        let (mut hdl, root) = setup(&mut arena);

        let a = inodes::create(&mut hdl, FileMode::FILE_DEF, 0, "a").unwrap();
        insert(&mut hdl, root, "a", a).unwrap();

        assert_eq!(lookup(&hdl, root, "a").unwrap(), a);
        assert_eq!(
            lookup(&hdl, root, "b").unwrap_err().code(),
            Code::NoSuchFile
        );
        assert_eq!(
            insert(&mut hdl, root, "a", a).unwrap_err().code(),
            Code::Exists
        );

        assert_eq!(remove(&mut hdl, root, "a").unwrap(), a);
        assert_eq!(hdl.inode(root).child_count, 0);
        assert_eq!(hdl.inode(root).dirent_table, 0);
    }

    #[test]
    fn chains_beyond_one_block() {
        let mut arena = TestArena::new(1024 * 1024);
        let (mut hdl, root) = setup(&mut arena);

        let free_before = hdl.superblock().free_blocks;
        let mut children = Vec::new();
        for i in 0..DIR_ENTRIES_PER_BLOCK + 3 {
            let name = format!("f{}", i);
            let ino = inodes::create(&mut hdl, FileMode::FILE_DEF, 0, &name).unwrap();
            insert(&mut hdl, root, &name, ino).unwrap();
            children.push((name, ino));
        }

        // 18 inodes plus two chained table blocks
        assert_eq!(
            hdl.superblock().free_blocks,
            free_before - (DIR_ENTRIES_PER_BLOCK as u32 + 3) - 2
        );
        for (name, ino) in &children {
            assert_eq!(lookup(&hdl, root, name).unwrap(), *ino);
        }
        let listed = entries(&hdl, root);
        assert_eq!(listed.len(), DIR_ENTRIES_PER_BLOCK + 3);
        assert_eq!(listed[0].0, "f0");

        // shrinking below one block frees the chained table again
        for (name, ino) in &children {
            remove(&mut hdl, root, name).unwrap();
            inodes::free(&mut hdl, *ino);
        }
        assert_eq!(hdl.superblock().free_blocks, free_before);
        hdl.check().unwrap();
    }

    #[test]
    fn remove_compacts_with_last() {
        let mut arena = TestArena::new(1024 * 1024);
        let (mut hdl, root) = setup(&mut arena);

        for name in ["a", "b", "c"] {
            let ino = inodes::create(&mut hdl, FileMode::FILE_DEF, 0, name).unwrap();
            insert(&mut hdl, root, name, ino).unwrap();
        }

        remove(&mut hdl, root, "a").unwrap();
        let listed: Vec<_> = entries(&hdl, root).into_iter().map(|(n, _)| n).collect();
        assert_eq!(listed, ["c", "b"]);
    }
}
