// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Table loaders: fully materialise the inode table and the
//! directory table from their chained metadata chunks, and record a
//! position list mapping each chunk's on-disk start offset (relative
//! to the table anchor) to its cumulative offset in the decompressed
//! output. Both tables are small (typically tens to low hundreds of
//! chunks) and must be fully resident before any lookup, because
//! inode and directory records may straddle chunks.

use crate::decompress::Decompressor;
use crate::io::{self, BlockDevice};
use crate::result::{Error, Result};

use alloc::vec;
use alloc::vec::Vec;

use super::metadata;
use super::METADATA_CHUNK_SIZE;

/// Maps a metadata chunk's on-disk start offset (relative to the
/// table's anchor) to its cumulative byte offset in the decompressed
/// table. Used to turn a SquashFS inode reference's high 32 bits, or
/// a directory inode's `start_block`, into a cursor over the
/// decompressed table this list was built for.
pub struct PositionList {
    /// `(source_offset_of_chunk_start, decoded_offset_of_chunk_start)`,
    /// ascending by `source_offset`.
    pub(crate) entries: Vec<(u32, u32)>,
}

impl PositionList {
    /// Returns the decoded-table offset at which the chunk starting
    /// at on-disk offset `source_offset` begins.
    pub fn locate(&self, source_offset: u32) -> Result<u32> {
        self.entries
            .binary_search_by_key(&source_offset, |&(src, _)| src)
            .map(|i| self.entries[i].1)
            .map_err(|_| Error::InvalidArgument)
    }
}

/// A fully decoded metadata table plus the position list used to
/// address it by on-disk chunk offset.
pub struct Table {
    pub bytes: Vec<u8>,
    pub positions: PositionList,
}

/// Loads and decodes every chunk in the half-open on-disk byte range
/// `[start, end)`, which must be the exact byte span of one metadata
/// table (as computed from two consecutive superblock anchors).
pub(crate) fn load_table(
    device: &dyn BlockDevice,
    decompressor: &dyn Decompressor,
    start: u64,
    end: u64,
) -> Result<Table> {
    if end < start {
        return Err(Error::InvalidArgument);
    }
    let table_len = (end - start) as usize;
    let (raw, raw_off) = io::read_bytes(device, start, table_len)?;
    let raw = &raw[raw_off..raw_off + table_len];

    let mut bytes = Vec::new();
    let mut entries = Vec::new();
    let mut consumed: usize = 0;
    let mut scratch = vec![0u8; METADATA_CHUNK_SIZE];

    while consumed < table_len {
        let source_offset: u32 =
            consumed.try_into().map_err(|_| Error::InvalidArgument)?;
        let decoded_offset: u32 =
            bytes.len().try_into().map_err(|_| Error::InvalidArgument)?;
        entries.push((source_offset, decoded_offset));

        let span = metadata::chunk_span(raw, consumed)?;
        let decoded_len =
            metadata::decode_chunk(raw, consumed, decompressor, &mut scratch)?;
        // A short (< 8192-byte decoded) chunk is only valid as the
        // very last chunk in the table; anywhere else it means the
        // image is malformed.
        if decoded_len < METADATA_CHUNK_SIZE && consumed + span < table_len {
            return Err(Error::InvalidArgument);
        }
        bytes.extend_from_slice(&scratch[..decoded_len]);
        consumed += span;
    }

    Ok(Table { bytes, positions: PositionList { entries } })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::SliceDevice;

    struct Identity;
    impl Decompressor for Identity {
        fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
            dst[..src.len()].copy_from_slice(src);
            Ok(src.len())
        }
    }

    fn uncompressed_chunk(payload: &[u8]) -> Vec<u8> {
        let mut v = Vec::new();
        let header = 0x8000u16 | payload.len() as u16;
        v.extend_from_slice(&header.to_le_bytes());
        v.extend_from_slice(payload);
        v
    }

    #[test]
    fn loads_multiple_chunks_and_builds_positions() {
        let mut image = uncompressed_chunk(b"abc");
        let second_chunk_src_off = image.len() as u32;
        image.extend(uncompressed_chunk(b"defgh"));
        let table_len = image.len() as u64;
        image.resize(image.len().max(512), 0);
        let dev = SliceDevice::new(&image, 512);

        let table = load_table(&dev, &Identity, 0, table_len).unwrap();
        assert_eq!(&table.bytes, b"abcdefgh");
        assert_eq!(table.positions.locate(0).unwrap(), 0);
        assert_eq!(
            table.positions.locate(second_chunk_src_off).unwrap(),
            3
        );
        assert!(table.positions.locate(9999).is_err());
    }
}
