// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

extern crate std;

use super::Decompressor;
use crate::result::{Error, Result};

use std::io::Read;

pub(crate) struct Zstd;

impl Decompressor for Zstd {
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let mut decoder = ruzstd::StreamingDecoder::new(src)
            .map_err(|_| Error::InvalidArgument)?;
        let mut out = std::vec::Vec::with_capacity(dst.len());
        decoder
            .read_to_end(&mut out)
            .map_err(|_| Error::InvalidArgument)?;
        if out.len() > dst.len() {
            return Err(Error::InvalidArgument);
        }
        dst[..out.len()].copy_from_slice(&out);
        Ok(out.len())
    }
}
