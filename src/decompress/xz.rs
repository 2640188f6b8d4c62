// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

extern crate std;

use super::Decompressor;
use crate::result::{Error, Result};

use std::io::Cursor;

pub(crate) struct Xz;

impl Decompressor for Xz {
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let mut out = std::vec::Vec::with_capacity(dst.len());
        lzma_rs::xz_decompress(&mut Cursor::new(src), &mut out)
            .map_err(|_| Error::InvalidArgument)?;
        if out.len() > dst.len() {
            return Err(Error::InvalidArgument);
        }
        dst[..out.len()].copy_from_slice(&out);
        Ok(out.len())
    }
}
