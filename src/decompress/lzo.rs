// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

extern crate std;

use super::Decompressor;
use crate::result::{Error, Result};

pub(crate) struct Lzo;

impl Decompressor for Lzo {
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let out = rust_lzo::LZOContext::decompress_to_slice(src, dst)
            .map_err(|_| Error::InvalidArgument)?;
        Ok(out.len())
    }
}
