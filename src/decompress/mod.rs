// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decompressor as capability: one trait, one production implementation
//! per codec, selected once at `probe` time. The core never names a
//! specific codec after that point.

use crate::result::{Error, Result};

#[cfg(feature = "zlib")]
mod zlib;
#[cfg(feature = "xz")]
mod xz;
#[cfg(feature = "lz4")]
mod lz4;
#[cfg(feature = "zstd")]
mod zstd;
#[cfg(feature = "lzo")]
mod lzo;

/// A single-shot block decompressor.
pub trait Decompressor: Sync {
    /// Decompresses `src` into `dst`, returning the number of bytes
    /// written. `dst` is sized to the caller's expected output length
    /// (at most 8192 bytes for metadata chunks, at most the
    /// superblock's block size for data blocks/fragments).
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize>;
}

/// The compressor kind named in the superblock.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Compression {
    Zlib,
    Lzma,
    Lzo,
    Xz,
    Lz4,
    Zstd,
}

impl Compression {
    pub fn from_id(id: u16) -> Result<Compression> {
        match id {
            1 => Ok(Compression::Zlib),
            2 => Ok(Compression::Lzma),
            3 => Ok(Compression::Lzo),
            4 => Ok(Compression::Xz),
            5 => Ok(Compression::Lz4),
            6 => Ok(Compression::Zstd),
            _ => Err(Error::InvalidArgument),
        }
    }

    /// Returns the decompressor implementing this codec, or
    /// `Error::NotSupported` if the crate was built without the
    /// matching feature (or the codec, like legacy `Lzma`, is never
    /// implemented at all: squashfs-tools itself never shipped a
    /// usable encoder for compression id 2).
    pub fn decompressor(self) -> Result<&'static dyn Decompressor> {
        match self {
            #[cfg(feature = "zlib")]
            Compression::Zlib => Ok(&zlib::Zlib),
            #[cfg(not(feature = "zlib"))]
            Compression::Zlib => Err(Error::NotSupported),

            Compression::Lzma => Err(Error::NotSupported),

            #[cfg(feature = "lzo")]
            Compression::Lzo => Ok(&lzo::Lzo),
            #[cfg(not(feature = "lzo"))]
            Compression::Lzo => Err(Error::NotSupported),

            #[cfg(feature = "xz")]
            Compression::Xz => Ok(&xz::Xz),
            #[cfg(not(feature = "xz"))]
            Compression::Xz => Err(Error::NotSupported),

            #[cfg(feature = "lz4")]
            Compression::Lz4 => Ok(&lz4::Lz4),
            #[cfg(not(feature = "lz4"))]
            Compression::Lz4 => Err(Error::NotSupported),

            #[cfg(feature = "zstd")]
            Compression::Zstd => Ok(&zstd::Zstd),
            #[cfg(not(feature = "zstd"))]
            Compression::Zstd => Err(Error::NotSupported),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_id_rejects_unknown() {
        assert_eq!(
            Compression::from_id(0).unwrap_err(),
            Error::InvalidArgument
        );
        assert_eq!(
            Compression::from_id(7).unwrap_err(),
            Error::InvalidArgument
        );
    }

    #[test]
    fn lzma_is_never_supported() {
        assert_eq!(
            Compression::from_id(2).unwrap().decompressor().unwrap_err(),
            Error::NotSupported
        );
    }
}
