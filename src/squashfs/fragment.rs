// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The fragment resolver. The fragment-entry table is a two-level
//! structure: an index table of absolute byte pointers to metadata
//! chunks (at `fragment_table_start`), and the metadata chunks
//! themselves, each holding up to 512 16-byte entries.

use crate::io;
use crate::leview::{read_u16, read_u32, read_u64};
use crate::result::{Error, Result};

use super::metadata;
use super::{FileSystem, FRAGMENT_ENTRIES_PER_CHUNK, METADATA_CHUNK_SIZE};

/// One fragment-table entry: where the fragment block starts on disk,
/// its stored size, and whether it is compressed.
#[derive(Clone, Copy, Debug)]
pub struct FragmentEntry {
    pub start: u64,
    pub stored_size: u32,
    pub compressed: bool,
}

const ENTRY_LEN: usize = 16;
const POINTER_LEN: usize = 8;

/// Looks up fragment table entry `index`.
pub(crate) fn fragment_lookup(
    fs: &FileSystem,
    index: u32,
) -> Result<FragmentEntry> {
    if index >= fs.superblock().frag_count {
        return Err(Error::InvalidArgument);
    }
    let chunk_index = index as usize / FRAGMENT_ENTRIES_PER_CHUNK;
    let intra_index = index as usize % FRAGMENT_ENTRIES_PER_CHUNK;

    let pointer_offset =
        fs.superblock().fragment_table_start + (chunk_index * POINTER_LEN) as u64;
    let (buf, off) = io::read_bytes(fs.device(), pointer_offset, POINTER_LEN)?;
    let chunk_addr = read_u64(&buf, off);

    // A chunk header claims up to 0x7fff stored bytes; reading that
    // worst case unconditionally would fail for a chunk near the end
    // of the image (the over-read runs past the backing store). Read
    // the 2-byte header first to learn the real span, then read
    // exactly that.
    let (header_buf, header_off) = io::read_bytes(fs.device(), chunk_addr, 2)?;
    let stored_len = (read_u16(&header_buf, header_off) & 0x7fff) as usize;
    let (chunk_buf, chunk_off) =
        io::read_bytes(fs.device(), chunk_addr, 2 + stored_len)?;
    let mut decoded = [0u8; METADATA_CHUNK_SIZE];
    let decoded_len = metadata::decode_chunk(
        &chunk_buf,
        chunk_off,
        fs.decompressor(),
        &mut decoded,
    )?;
    let entry_off = intra_index * ENTRY_LEN;
    if entry_off + ENTRY_LEN > decoded_len {
        return Err(Error::InvalidArgument);
    }
    let start = read_u64(&decoded, entry_off);
    let raw_size = read_u32(&decoded, entry_off + 4);
    Ok(FragmentEntry {
        start,
        stored_size: raw_size & 0x00ff_ffff,
        compressed: raw_size & 0x0100_0000 == 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompress::Decompressor;
    use crate::io::SliceDevice;
    use crate::squashfs::SuperBlock;
    use alloc::vec::Vec;

    struct Identity;
    impl Decompressor for Identity {
        fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
            dst[..src.len()].copy_from_slice(src);
            Ok(src.len())
        }
    }

    fn build_image() -> (Vec<u8>, u64) {
        // Layout: [pointer table][metadata chunk with 2 entries]
        let pointer_table_start = 0u64;
        let chunk_start = 512u64; // sector-aligned for convenience
        let mut image = alloc::vec![0u8; 512];
        image[0..8].copy_from_slice(&chunk_start.to_le_bytes());

        let mut chunk = Vec::new();
        // entry 0: start=1000, size=50 (compressed, top bit clear)
        chunk.extend_from_slice(&1000u64.to_le_bytes());
        chunk.extend_from_slice(&50u32.to_le_bytes());
        chunk.extend_from_slice(&0u32.to_le_bytes());
        // entry 1: start=2000, size=60 | uncompressed bit set
        chunk.extend_from_slice(&2000u64.to_le_bytes());
        chunk.extend_from_slice(&(60u32 | 0x0100_0000).to_le_bytes());
        chunk.extend_from_slice(&0u32.to_le_bytes());

        let header = 0x8000u16 | chunk.len() as u16;
        image.extend_from_slice(&header.to_le_bytes());
        image.extend_from_slice(&chunk);
        // Pad out to a full sector: `SliceDevice` reads whole sectors,
        // so the backing image must cover every sector a read touches,
        // not just the bytes logically in use.
        image.resize(1024, 0);
        (image, pointer_table_start)
    }

    fn superblock_with(frag_count: u32, fragment_table_start: u64) -> SuperBlock {
        SuperBlock {
            inode_count: 0,
            mod_time: 0,
            block_size: 131072,
            frag_count,
            compression_id: 1,
            block_log: 17,
            flags: crate::squashfs::SuperBlockFlags::empty(),
            id_count: 0,
            version_major: 4,
            version_minor: 0,
            root_inode_ref: 0,
            bytes_used: 0,
            id_table_start: 0,
            xattr_table_start: 0,
            inode_table_start: 0,
            directory_table_start: 0,
            fragment_table_start,
            export_table_start: 0,
        }
    }

    #[test]
    fn resolves_both_entries() {
        let (image, fragment_table_start) = build_image();
        let dev = SliceDevice::new(&image, 512);
        let sb = superblock_with(2, fragment_table_start);
        let fs = FileSystem { device: &dev, superblock: sb, decompressor: &Identity };

        let e0 = fragment_lookup(&fs, 0).unwrap();
        assert_eq!(e0.start, 1000);
        assert_eq!(e0.stored_size, 50);
        assert!(e0.compressed);

        let e1 = fragment_lookup(&fs, 1).unwrap();
        assert_eq!(e1.start, 2000);
        assert_eq!(e1.stored_size, 60);
        assert!(!e1.compressed);

        assert_eq!(
            fragment_lookup(&fs, 2).unwrap_err(),
            Error::InvalidArgument
        );
    }
}
