// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The five-entry-point mount surface: `probe`, `open_dir`/`readdir`/
//! `close_dir`, `read`, `size`, and `close`.
//!
//! The core [`crate::squashfs::FileSystem`] is a plain value with no
//! global state of its own. This module supplies the one process-wide
//! mount handle the public surface needs, guarded by a single mutex, so
//! a host that only ever mounts one image at a time does not have to
//! thread a handle through every call itself. Concurrent use is not
//! supported: callers are expected to serialize their own access, the
//! same way a spinlock around single-owner hardware state assumes one
//! caller at a time rather than arbitrating between several.

use spin::Mutex;

use crate::io::BlockDevice;
use crate::result::{Error, Result};
use crate::squashfs::{DirStream, FileSystem};

use alloc::boxed::Box;

static MOUNT: Mutex<Option<FileSystem<'static>>> = Mutex::new(None);

/// Mounts the image on `device`. Replaces any previously mounted image.
/// Fails with `InvalidArgument` on a bad superblock and `NotSupported`
/// if the named compressor was not built into this crate.
pub fn probe(device: &'static dyn BlockDevice) -> Result<()> {
    let fs = FileSystem::probe(device)?;
    *MOUNT.lock() = Some(fs);
    Ok(())
}

/// Unmounts the current image. A no-op if nothing is mounted.
pub fn close() {
    *MOUNT.lock() = None;
}

/// An open directory stream, returned by [`open_dir`] and consumed by
/// [`readdir`]/[`close_dir`].
pub struct DirHandle(Box<DirStream>);

/// Opens a directory stream positioned at `path`.
pub fn open_dir(path: &str) -> Result<DirHandle> {
    let guard = MOUNT.lock();
    let fs = guard.as_ref().ok_or(Error::InvalidArgument)?;
    Ok(DirHandle(fs.open_dir(path)?))
}

/// Advances `handle` and returns its next entry, or `None` at
/// end-of-iteration.
pub fn readdir(handle: &mut DirHandle) -> Result<Option<crate::squashfs::Entry>> {
    handle.0.readdir()
}

/// Releases a directory stream and the tables it owns.
pub fn close_dir(_handle: DirHandle) {}

/// Reads up to `len` bytes of `path` into `dst`, starting at
/// `dst[offset..]`. `len == 0` means "the whole file".
pub fn read(path: &str, dst: &mut [u8], offset: u64, len: u64) -> Result<usize> {
    let guard = MOUNT.lock();
    let fs = guard.as_ref().ok_or(Error::InvalidArgument)?;
    fs.read(path, dst, offset, len)
}

/// Returns the size in bytes of the regular file (or the file a
/// symlink resolves to) at `path`.
pub fn size(path: &str) -> Result<u64> {
    let guard = MOUNT.lock();
    let fs = guard.as_ref().ok_or(Error::InvalidArgument)?;
    fs.size(path)
}
