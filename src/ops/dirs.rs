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
use crate::data::{self, BlockNo, FileMode, NAME_MAX};
use crate::error::{Code, Error};
use crate::ops::{inodes, links};

/// Returns the directory and filename part of the given path.
///
/// - split_path("/foo/bar.baz") == ("/foo", "bar.baz")
/// - split_path("/foo/bar/") == ("/foo", "bar");
/// - split_path("foo") == ("", "foo");
fn split_path(mut path: &str) -> (&str, &str) {
    // skip trailing slashes
    while path.ends_with('/') {
        path = &path[..path.len() - 1];
    }

    match path.rfind('/') {
        Some(s) => (&path[..s], &path[s + 1..]),
        // the path is either empty or only contained slashes
        None => ("", path),
    }
}

/// Walks the given absolute path from the root and returns the visited
/// inode blocks, root first, target last.
///
/// Empty components and `.` are skipped; `..` ascends along the chain held
/// on this call frame (the arena stores no parent references; the root's
/// parent is the root).
fn resolve_chain(hdl: &FsHandle<'_>, path: &str) -> Result<Vec<BlockNo>, Error> {
    let mut chain = vec![hdl.superblock().root_inode];

    for comp in path.split('/') {
        match comp {
            "" | "." => {},
            ".." => {
                if chain.len() > 1 {
                    chain.pop();
                }
            },
            name => {
                if name.len() > NAME_MAX {
                    return Err(Error::new(Code::NameTooLong));
                }
                let cur = chain[chain.len() - 1];
                if !hdl.inode(cur).mode.is_dir() {
                    return Err(Error::new(Code::IsNoDir));
                }
                chain.push(links::lookup(hdl, cur, name)?);
            },
        }
    }

    Ok(chain)
}

/// Resolves the given path to the block index of its inode.
pub fn resolve(hdl: &FsHandle<'_>, path: &str) -> Result<BlockNo, Error> {
    let chain = resolve_chain(hdl, path)?;
    Ok(chain[chain.len() - 1])
}

/// Resolves all but the final component and returns the parent directory's
/// inode block together with the final name.
///
/// Fails with `NoSuchFile` only if a non-final component is missing.
pub fn resolve_parent<'p>(
    hdl: &FsHandle<'_>,
    path: &'p str,
) -> Result<(BlockNo, &'p str), Error> {
    let (dir, name) = split_path(path);
    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::new(Code::InvArgs));
    }
    if name.len() > NAME_MAX {
        return Err(Error::new(Code::NameTooLong));
    }

    let parent = resolve(hdl, dir)?;
    if !hdl.inode(parent).mode.is_dir() {
        return Err(Error::new(Code::IsNoDir));
    }
    Ok((parent, name))
}

/// Creates an empty file at the given path.
pub fn mknod(hdl: &mut FsHandle<'_>, path: &str, uid: u32) -> Result<(), Error> {
    log::trace!("dirs::mknod(path={})", path);

    let (parent, name) = resolve_parent(hdl, path)?;
    if links::lookup(hdl, parent, name).is_ok() {
        return Err(Error::new(Code::Exists));
    }

    let ino = inodes::create(hdl, FileMode::FILE_DEF, uid, name)?;
    if let Err(e) = links::insert(hdl, parent, name, ino) {
        inodes::free(hdl, ino);
        return Err(e);
    }
    Ok(())
}

/// Creates an empty directory at the given path.
pub fn mkdir(hdl: &mut FsHandle<'_>, path: &str, uid: u32) -> Result<(), Error> {
    log::trace!("dirs::mkdir(path={})", path);

    let (parent, name) = resolve_parent(hdl, path)?;
    if links::lookup(hdl, parent, name).is_ok() {
        return Err(Error::new(Code::Exists));
    }

    let ino = inodes::create(hdl, FileMode::DIR_DEF, uid, name)?;
    if let Err(e) = links::insert(hdl, parent, name, ino) {
        inodes::free(hdl, ino);
        return Err(e);
    }
    Ok(())
}

/// Removes the file at the given path, releasing all of its blocks.
pub fn unlink(hdl: &mut FsHandle<'_>, path: &str) -> Result<(), Error> {
    log::trace!("dirs::unlink(path={})", path);

    let (parent, name) = resolve_parent(hdl, path)?;
    let target = links::lookup(hdl, parent, name)?;
    if hdl.inode(target).mode.is_dir() {
        return Err(Error::new(Code::IsDir));
    }

    links::remove(hdl, parent, name)?;
    inodes::free(hdl, target);
    Ok(())
}

/// Removes the directory at the given path if it is empty.
pub fn rmdir(hdl: &mut FsHandle<'_>, path: &str) -> Result<(), Error> {
    log::trace!("dirs::rmdir(path={})", path);

    let target = resolve(hdl, path)?;
    if target == hdl.superblock().root_inode {
        return Err(Error::new(Code::Busy));
    }
    if !hdl.inode(target).mode.is_dir() {
        return Err(Error::new(Code::IsNoDir));
    }
    if hdl.inode(target).child_count > 0 {
        return Err(Error::new(Code::DirNotEmpty));
    }

    let (parent, name) = resolve_parent(hdl, path)?;
    links::remove(hdl, parent, name)?;
    inodes::free(hdl, target);
    Ok(())
}

/// Returns the child names of the directory at the given path, in stored
/// order, excluding the synthesized `.` and `..`.
pub fn readdir(hdl: &mut FsHandle<'_>, path: &str) -> Result<Vec<String>, Error> {
    log::trace!("dirs::readdir(path={})", path);

    let dir = resolve(hdl, path)?;
    if !hdl.inode(dir).mode.is_dir() {
        return Err(Error::new(Code::IsNoDir));
    }

    let names = links::entries(hdl, dir)
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    hdl.inode_mut(dir).atime = data::time_now();
    Ok(names)
}

/// Renames `from` to `to`, overwriting an existing compatible target.
///
/// The source inode block moves unchanged between the directories, so the
/// inode keeps its identity across the rename.
pub fn rename(hdl: &mut FsHandle<'_>, from: &str, to: &str) -> Result<(), Error> {
    log::trace!("dirs::rename(old_path={}, new_path={})", from, to);

    let (from_parent, from_name) = resolve_parent(hdl, from)?;
    let src = links::lookup(hdl, from_parent, from_name)?;

    let (to_dir, to_name) = split_path(to);
    if to_name.is_empty() || to_name == "." || to_name == ".." {
        return Err(Error::new(Code::InvArgs));
    }
    if to_name.len() > NAME_MAX {
        return Err(Error::new(Code::NameTooLong));
    }
    let to_chain = resolve_chain(hdl, to_dir)?;
    let to_parent = to_chain[to_chain.len() - 1];
    if !hdl.inode(to_parent).mode.is_dir() {
        return Err(Error::new(Code::IsNoDir));
    }

    // renaming an entry to itself is a no-op
    if from_parent == to_parent && from_name == to_name {
        return Ok(());
    }

    // a directory must not move into its own subtree: walking up from the
    // target's parent must not encounter the source
    if to_chain.contains(&src) {
        return Err(Error::new(Code::InvArgs));
    }

    if let Ok(existing) = links::lookup(hdl, to_parent, to_name) {
        let src_is_dir = hdl.inode(src).mode.is_dir();
        let existing_is_dir = hdl.inode(existing).mode.is_dir();
        if !src_is_dir && existing_is_dir {
            return Err(Error::new(Code::IsDir));
        }
        if src_is_dir && !existing_is_dir {
            return Err(Error::new(Code::IsNoDir));
        }
        if existing_is_dir && hdl.inode(existing).child_count > 0 {
            return Err(Error::new(Code::DirNotEmpty));
        }

        links::remove(hdl, to_parent, to_name)?;
        inodes::free(hdl, existing);
    }

    links::remove(hdl, from_parent, from_name)?;
    hdl.inode_mut(src).set_name(to_name);
    if let Err(e) = links::insert(hdl, to_parent, to_name, src) {
        // put the source entry back where it was
        hdl.inode_mut(src).set_name(from_name);
        links::insert(hdl, from_parent, from_name, src).ok();
        return Err(e);
    }
    Ok(())
}
