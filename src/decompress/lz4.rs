// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::Decompressor;
use crate::result::{Error, Result};

pub(crate) struct Lz4;

impl Decompressor for Lz4 {
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        lz4_flex::block::decompress_into(src, dst)
            .map_err(|_| Error::InvalidArgument)
    }
}
