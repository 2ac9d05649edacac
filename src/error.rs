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

//! Contains the error handling types

use core::fmt;

/// The error codes
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u32)]
pub enum Code {
    /// The arena cannot be used as a filesystem (too small or corrupt)
    BadFs,
    /// No entry with the given name / path does not resolve
    NoSuchFile,
    /// Descended into something that is not a directory
    IsNoDir,
    /// The operation is not applicable to a directory
    IsDir,
    /// An entry with the given name already exists
    Exists,
    /// The directory still has entries
    DirNotEmpty,
    /// Invalid argument (e.g. renaming a directory into its own subtree)
    InvArgs,
    /// A path component exceeds the maximum name length
    NameTooLong,
    /// No free block left in the arena
    NoSpace,
    /// The root directory cannot be removed
    Busy,
}

impl Code {
    /// Returns the numeric POSIX error code for this error
    pub fn errno(self) -> i32 {
        match self {
            Self::BadFs => 14,        // EFAULT
            Self::NoSuchFile => 2,    // ENOENT
            Self::IsNoDir => 20,      // ENOTDIR
            Self::IsDir => 21,        // EISDIR
            Self::Exists => 17,       // EEXIST
            Self::DirNotEmpty => 39,  // ENOTEMPTY
            Self::InvArgs => 22,      // EINVAL
            Self::NameTooLong => 36,  // ENAMETOOLONG
            Self::NoSpace => 28,      // ENOSPC
            Self::Busy => 16,         // EBUSY
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The error struct that is passed around
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Error {
    code: Code,
}

impl Error {
    /// Creates a new object for given error code
    pub fn new(code: Code) -> Self {
        Error { code }
    }

    /// Returns the error code
    pub fn code(&self) -> Code {
        self.code
    }
}

impl From<Code> for Error {
    fn from(code: Code) -> Self {
        Self::new(code)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.code)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (errno {})", self.code, self.code.errno())
    }
}

impl std::error::Error for Error {
}
