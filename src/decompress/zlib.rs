// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::Decompressor;
use crate::result::{Error, Result};

use miniz_oxide::inflate::core::inflate_flags::TINFL_FLAG_PARSE_ZLIB_HEADER;
use miniz_oxide::inflate::core::{decompress, DecompressorOxide};
use miniz_oxide::inflate::TINFLStatus;

pub(crate) struct Zlib;

impl Decompressor for Zlib {
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let mut r = DecompressorOxide::new();
        let (status, _in_consumed, out_consumed) =
            decompress(&mut r, src, dst, 0, TINFL_FLAG_PARSE_ZLIB_HEADER);
        if status != TINFLStatus::Done {
            return Err(Error::InvalidArgument);
        }
        Ok(out_consumed)
    }
}
