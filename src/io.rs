// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The backing-store reader.
//!
//! This is the one collaborator the core logic never looks past: a
//! sector-granular read over a partitioned block device. Everything
//! above this module deals exclusively in byte offsets and lengths;
//! `read_bytes` is where those get translated into aligned
//! `(sector, nsectors)` device reads.

use crate::leview::div_round_up;
use crate::result::{Error, Result};

use alloc::vec;
use alloc::vec::Vec;

/// A block device: something that can read whole sectors.
///
/// Implementations report their own sector size; 512 and 4096 are
/// the common cases but nothing here assumes either.
///
/// `Sync` (matching [`crate::decompress::Decompressor`]) so a `&'static
/// dyn BlockDevice` can sit behind the mount singleton in [`crate::api`].
pub trait BlockDevice: Sync {
    /// Size of one sector, in bytes. Must be a power of two.
    fn sector_size(&self) -> usize;

    /// Reads `nsectors` sectors starting at `sector` into `dst`.
    /// `dst` must be exactly `nsectors * sector_size()` bytes long.
    /// Returns `Err(Error::IoError)` on a short or failed read.
    fn read_sectors(
        &self,
        sector: u64,
        nsectors: u32,
        dst: &mut [u8],
    ) -> Result<()>;
}

/// Reads `byte_len` bytes starting at `byte_start` from `device`.
///
/// Returns the (sector-aligned) buffer that was read, plus the offset
/// within that buffer where the requested range actually begins.
pub(crate) fn read_bytes(
    device: &dyn BlockDevice,
    byte_start: u64,
    byte_len: usize,
) -> Result<(Vec<u8>, usize)> {
    let sector = device.sector_size() as u64;
    let sector_index = byte_start / sector;
    let intra = (byte_start % sector) as usize;
    let span = intra as u64 + byte_len as u64;
    let nsectors = div_round_up(span, sector);
    let nsectors: u32 =
        nsectors.try_into().map_err(|_| Error::InvalidArgument)?;
    let mut buf = vec![0u8; (nsectors as u64 * sector) as usize];
    device.read_sectors(sector_index, nsectors, &mut buf)?;
    Ok((buf, intra))
}

/// A `BlockDevice` backed by an in-memory byte slice, used in tests
/// and by hosts that have already mapped the whole image into memory.
pub struct SliceDevice<'a> {
    data: &'a [u8],
    sector_size: usize,
}

impl<'a> SliceDevice<'a> {
    pub fn new(data: &'a [u8], sector_size: usize) -> SliceDevice<'a> {
        assert!(sector_size.is_power_of_two());
        SliceDevice { data, sector_size }
    }
}

impl BlockDevice for SliceDevice<'_> {
    fn sector_size(&self) -> usize {
        self.sector_size
    }

    fn read_sectors(
        &self,
        sector: u64,
        nsectors: u32,
        dst: &mut [u8],
    ) -> Result<()> {
        let start = sector as usize * self.sector_size;
        let len = nsectors as usize * self.sector_size;
        assert_eq!(dst.len(), len);
        let end = start + len;
        if end > self.data.len() {
            return Err(Error::IoError);
        }
        dst.copy_from_slice(&self.data[start..end]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_bytes_spans_sectors() {
        let mut image = vec![0u8; 4096];
        for (i, b) in image.iter_mut().enumerate() {
            *b = i as u8;
        }
        let dev = SliceDevice::new(&image, 512);
        let (buf, intra) = read_bytes(&dev, 500, 100).unwrap();
        assert_eq!(intra, 500);
        assert_eq!(buf.len(), 1024);
        assert_eq!(&buf[intra..intra + 100], &image[500..600]);
    }

    #[test]
    fn read_bytes_short_read_is_io_error() {
        let image = vec![0u8; 512];
        let dev = SliceDevice::new(&image, 512);
        assert_eq!(read_bytes(&dev, 0, 4096).unwrap_err(), Error::IoError);
    }
}
