// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt;

/// Errors reported by the reader.
#[derive(Clone, Copy, Eq, Ord, PartialEq, PartialOrd)]
pub enum Error {
    /// A malformed superblock, table anchor, fragment index, or a
    /// requested length larger than the file being read.
    InvalidArgument,
    /// An allocation failed.
    OutOfMemory,
    /// A path component was not found in a directory.
    NotFound,
    /// A non-terminal path component is not a directory.
    NotADirectory,
    /// The compression kind is unknown, or the inode is a device,
    /// fifo, or socket.
    NotSupported,
    /// The backing store returned fewer bytes than requested.
    IoError,
    /// Symlink resolution exceeded its bounded depth.
    LoopDetected,
}

impl Error {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid argument",
            Self::OutOfMemory => "allocation failed",
            Self::NotFound => "no such file or directory",
            Self::NotADirectory => "not a directory",
            Self::NotSupported => "operation not supported",
            Self::IoError => "backing store read error",
            Self::LoopDetected => "symlink resolution loop detected",
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub type Result<T> = core::result::Result<T, Error>;
