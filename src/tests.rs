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

use crate::data::EXT_PER_BLOCK;
use crate::error::Code;
use crate::BLOCK_SIZE;

/// 8-byte aligned arena backing, since the on-arena records are overlaid
/// with align(8) structs.
pub struct TestArena {
    mem: Vec<u64>,
}

impl TestArena {
    pub fn new(size: usize) -> Self {
        assert!(size % 8 == 0);
        TestArena {
            mem: vec![0; size / 8],
        }
    }

    pub fn bytes(&mut self) -> &mut [u8] {
        let len = self.mem.len() * 8;
        // safety: u64s reinterpreted as bytes, same allocation, same length
        unsafe { std::slice::from_raw_parts_mut(self.mem.as_mut_ptr().cast::<u8>(), len) }
    }

    /// The unmount step: the arena bytes, copied verbatim.
    pub fn snapshot(&self) -> TestArena {
        TestArena {
            mem: self.mem.clone(),
        }
    }
}

const MIB: usize = 1024 * 1024;

#[test]
fn fresh_arena_has_empty_root() {
    let mut arena = TestArena::new(MIB);
    let mem = arena.bytes();

    assert_eq!(crate::readdir(mem, "/").unwrap(), Vec::<String>::new());
    let info = crate::getattr(mem, "/", 42, 43).unwrap();
    assert_eq!(info.mode & 0o170000, 0o040000);
    assert_eq!(info.nlink, 2);
    assert_eq!(info.size, 0);
    assert_eq!(info.uid, 42);
    assert_eq!(info.gid, 43);
    crate::check(mem).unwrap();
}

#[test]
fn arena_too_small_for_a_root() {
    // two blocks cannot hold metadata, root and a dirent table
    let mut arena = TestArena::new(2 * BLOCK_SIZE);
    assert_eq!(
        crate::statfs(arena.bytes()).unwrap_err().code(),
        Code::BadFs
    );
}

#[test]
fn create_write_read_roundtrip() {
    let mut arena = TestArena::new(MIB);
    let mem = arena.bytes();

    let total = crate::statfs(mem).unwrap().total_blocks;
    assert_eq!(total as usize, MIB / BLOCK_SIZE);
    let free0 = crate::statfs(mem).unwrap().free_blocks;

    crate::mkdir(mem, "/d", 0).unwrap();
    crate::mknod(mem, "/d/f", 0).unwrap();
    assert_eq!(crate::write(mem, "/d/f", 0, b"hello").unwrap(), 5);

    let mut buf = [0u8; 10];
    assert_eq!(crate::read(mem, "/d/f", 0, &mut buf).unwrap(), 5);
    assert_eq!(&buf[..5], b"hello");

    let info = crate::getattr(mem, "/d/f", 0, 0).unwrap();
    assert_eq!(info.size, 5);
    assert_eq!(info.mode & 0o170000, 0o100000);
    assert_eq!(info.nlink, 1);

    // /d inode, /d dirent table, root dirent table, /f inode,
    // /f extent table, /f data block
    assert_eq!(crate::statfs(mem).unwrap().free_blocks, free0 - 6);

    assert_eq!(crate::readdir(mem, "/").unwrap(), ["d"]);
    assert_eq!(crate::readdir(mem, "/d").unwrap(), ["f"]);
    crate::check(mem).unwrap();
}

#[test]
fn truncate_grow_makes_holes() {
    let mut arena = TestArena::new(MIB);
    let mem = arena.bytes();

    crate::mkdir(mem, "/d", 0).unwrap();
    crate::mknod(mem, "/d/f", 0).unwrap();
    crate::write(mem, "/d/f", 0, b"hello").unwrap();

    let free_before = crate::statfs(mem).unwrap().free_blocks;
    crate::truncate(mem, "/d/f", 1_000_000).unwrap();

    let mut buf = [0xffu8; 4];
    assert_eq!(crate::read(mem, "/d/f", 500_000, &mut buf).unwrap(), 4);
    assert_eq!(buf, [0u8; 4]);

    assert_eq!(crate::getattr(mem, "/d/f", 0, 0).unwrap().size, 1_000_000);
    // holes cost no blocks
    assert_eq!(crate::statfs(mem).unwrap().free_blocks, free_before);
    crate::check(mem).unwrap();
}

#[test]
fn rename_moves_and_removal_restores_free_count() {
    let mut arena = TestArena::new(MIB);
    let mem = arena.bytes();

    let free0 = crate::statfs(mem).unwrap().free_blocks;

    crate::mkdir(mem, "/d", 0).unwrap();
    crate::mknod(mem, "/d/f", 0).unwrap();
    crate::write(mem, "/d/f", 0, b"hello").unwrap();

    crate::rename(mem, "/d", "/e").unwrap();
    assert_eq!(
        crate::open(mem, "/d").unwrap_err().code(),
        Code::NoSuchFile
    );
    let mut buf = [0u8; 5];
    crate::read(mem, "/e/f", 0, &mut buf).unwrap();
    assert_eq!(&buf, b"hello");

    assert_eq!(
        crate::rename(mem, "/e", "/e/sub").unwrap_err().code(),
        Code::InvArgs
    );

    crate::unlink(mem, "/e/f").unwrap();
    crate::rmdir(mem, "/e").unwrap();
    assert_eq!(crate::statfs(mem).unwrap().free_blocks, free0);
    crate::check(mem).unwrap();
}

#[test]
fn rename_twice_restores_shape() {
    let mut arena = TestArena::new(MIB);
    let mem = arena.bytes();

    crate::mkdir(mem, "/a", 0).unwrap();
    crate::mknod(mem, "/a/f", 0).unwrap();
    let free_before = crate::statfs(mem).unwrap().free_blocks;

    crate::rename(mem, "/a", "/b").unwrap();
    crate::rename(mem, "/b", "/a").unwrap();

    assert_eq!(crate::statfs(mem).unwrap().free_blocks, free_before);
    assert_eq!(crate::readdir(mem, "/").unwrap(), ["a"]);
    assert_eq!(crate::readdir(mem, "/a").unwrap(), ["f"]);
    crate::check(mem).unwrap();
}

#[test]
fn rename_keeps_getattr_name_consistent() {
    let mut arena = TestArena::new(MIB);
    let mem = arena.bytes();

    crate::mkdir(mem, "/sub", 0).unwrap();
    crate::mknod(mem, "/old", 0).unwrap();
    crate::write(mem, "/old", 0, b"data").unwrap();

    crate::rename(mem, "/old", "/sub/new").unwrap();
    assert_eq!(crate::getattr(mem, "/sub/new", 0, 0).unwrap().size, 4);
    assert_eq!(crate::readdir(mem, "/sub").unwrap(), ["new"]);
}

#[test]
fn extent_table_chains_past_one_block() {
    let mut arena = TestArena::new(MIB);
    let mem = arena.bytes();

    crate::mknod(mem, "/f", 0).unwrap();
    let free0 = crate::statfs(mem).unwrap().free_blocks;

    // fill the last slot of the first extent table
    let last_in_first = (EXT_PER_BLOCK * BLOCK_SIZE) as u64 - 1;
    crate::write(mem, "/f", last_in_first, b"x").unwrap();
    // one extent table plus one data block
    assert_eq!(crate::statfs(mem).unwrap().free_blocks, free0 - 2);

    // one byte further lands in a chained table
    crate::write(mem, "/f", last_in_first + 1, b"y").unwrap();
    assert_eq!(crate::statfs(mem).unwrap().free_blocks, free0 - 4);

    let mut buf = [0u8; 2];
    assert_eq!(crate::read(mem, "/f", last_in_first, &mut buf).unwrap(), 2);
    assert_eq!(&buf, b"xy");
    crate::check(mem).unwrap();

    // shrinking away the chained part frees the second table again
    crate::truncate(mem, "/f", last_in_first).unwrap();
    assert_eq!(crate::statfs(mem).unwrap().free_blocks, free0 - 2);
    crate::check(mem).unwrap();
}

#[test]
fn create_until_no_space() {
    // 16 blocks: metadata, root, then 14 usable
    let mut arena = TestArena::new(16 * BLOCK_SIZE);
    let mem = arena.bytes();

    let mut created = 0;
    loop {
        match crate::mknod(mem, &format!("/f{}", created), 0) {
            Ok(()) => created += 1,
            Err(e) => {
                assert_eq!(e.code(), Code::NoSpace);
                break;
            },
        }
    }
    // root dirent table costs one of the 14, the rest hold inodes
    assert_eq!(created, 13);
    assert_eq!(crate::statfs(mem).unwrap().free_blocks, 0);
    crate::check(mem).unwrap();

    // one unlink makes room for exactly one further create
    crate::unlink(mem, "/f1").unwrap();
    crate::mknod(mem, "/again", 0).unwrap();
    assert_eq!(
        crate::mknod(mem, "/and-one-more", 0).unwrap_err().code(),
        Code::NoSpace
    );
    crate::check(mem).unwrap();
}

#[test]
fn utimens_stores_arbitrary_times() {
    let mut arena = TestArena::new(MIB);
    let mem = arena.bytes();

    crate::mknod(mem, "/f", 0).unwrap();
    crate::utimens(mem, "/f", 12_345, 67_890_000_000_000).unwrap();

    let info = crate::getattr(mem, "/f", 0, 0).unwrap();
    assert_eq!(info.atime, 12_345);
    assert_eq!(info.mtime, 67_890_000_000_000);
}

#[test]
fn nlink_counts_subdirectories() {
    let mut arena = TestArena::new(MIB);
    let mem = arena.bytes();

    crate::mkdir(mem, "/d", 0).unwrap();
    crate::mkdir(mem, "/d/a", 0).unwrap();
    crate::mkdir(mem, "/d/b", 0).unwrap();
    crate::mknod(mem, "/d/f", 0).unwrap();

    assert_eq!(crate::getattr(mem, "/d", 0, 0).unwrap().nlink, 4);
    assert_eq!(crate::getattr(mem, "/", 0, 0).unwrap().nlink, 3);
}

#[test]
fn snapshot_and_remount_preserves_state() {
    let mut arena = TestArena::new(MIB);
    let mem = arena.bytes();

    crate::mkdir(mem, "/d", 0).unwrap();
    crate::mknod(mem, "/d/f", 0).unwrap();
    crate::write(mem, "/d/f", 0, b"hello").unwrap();
    crate::truncate(mem, "/d/f", 1_000_000).unwrap();
    crate::mkdir(mem, "/d/sub", 0).unwrap();
    let stats = crate::statfs(mem).unwrap();

    // unmount: persist the bytes; remount: attach to the copy
    let mut copy = arena.snapshot();
    let mem2 = copy.bytes();
    crate::check(mem2).unwrap();

    let stats2 = crate::statfs(mem2).unwrap();
    assert_eq!(stats2.free_blocks, stats.free_blocks);
    assert_eq!(stats2.total_blocks, stats.total_blocks);

    assert_eq!(crate::readdir(mem2, "/").unwrap(), ["d"]);
    assert_eq!(crate::readdir(mem2, "/d").unwrap(), ["f", "sub"]);
    assert_eq!(crate::getattr(mem2, "/d/f", 0, 0).unwrap().size, 1_000_000);

    let mut buf = [0u8; 5];
    assert_eq!(crate::read(mem2, "/d/f", 0, &mut buf).unwrap(), 5);
    assert_eq!(&buf, b"hello");
    let mut hole = [0xffu8; 4];
    crate::read(mem2, "/d/f", 500_000, &mut hole).unwrap();
    assert_eq!(hole, [0u8; 4]);
}

#[test]
fn read_past_eof_returns_fewer_bytes() {
    let mut arena = TestArena::new(MIB);
    let mem = arena.bytes();

    crate::mknod(mem, "/f", 0).unwrap();
    crate::write(mem, "/f", 0, b"abc").unwrap();

    let mut buf = [0u8; 8];
    assert_eq!(crate::read(mem, "/f", 2, &mut buf).unwrap(), 1);
    assert_eq!(buf[0], b'c');
    assert_eq!(crate::read(mem, "/f", 3, &mut buf).unwrap(), 0);
    assert_eq!(crate::read(mem, "/f", 100, &mut buf).unwrap(), 0);
}

#[test]
fn directory_errors() {
    let mut arena = TestArena::new(MIB);
    let mem = arena.bytes();

    crate::mkdir(mem, "/d", 0).unwrap();
    crate::mknod(mem, "/f", 0).unwrap();

    assert_eq!(crate::unlink(mem, "/d").unwrap_err().code(), Code::IsDir);
    assert_eq!(crate::rmdir(mem, "/f").unwrap_err().code(), Code::IsNoDir);
    assert_eq!(crate::mkdir(mem, "/d", 0).unwrap_err().code(), Code::Exists);
    assert_eq!(crate::mknod(mem, "/f", 0).unwrap_err().code(), Code::Exists);
    assert_eq!(
        crate::readdir(mem, "/f").unwrap_err().code(),
        Code::IsNoDir
    );
    assert_eq!(crate::read(mem, "/d", 0, &mut [0; 4]).unwrap_err().code(), Code::IsDir);
    assert_eq!(crate::write(mem, "/d", 0, b"x").unwrap_err().code(), Code::IsDir);
    assert_eq!(crate::truncate(mem, "/d", 0).unwrap_err().code(), Code::IsDir);
}
