// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A read-only reader for the SquashFS on-disk filesystem format.
//!
//! [`squashfs::FileSystem`] is the core: mount it directly over a
//! [`io::BlockDevice`] and drive `open_dir`/`read`/`size` as plain
//! methods. [`api`] wraps that core in the single process-wide mount
//! handle a firmware-stage host typically wants instead.
#![cfg_attr(not(any(test, clippy)), no_std)]

extern crate alloc;

pub mod api;
pub mod decompress;
pub mod io;
mod leview;
pub mod logger;
pub mod result;
pub mod squashfs;

pub use result::{Error, Result};
