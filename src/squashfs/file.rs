// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The file reader: reconstructs a regular file's content by
//! concatenating decompressed data blocks followed, if the file has
//! one, by a slice of the shared fragment block.
//!
//! `offset` addresses the *destination* buffer, not the file: the
//! whole file (or its first `len` bytes) is always reconstructed from
//! the start, then copied into `dst` starting at `dst[offset..]`.

use crate::io;
use crate::result::{Error, Result};

use alloc::vec;

use super::fragment;
use super::inode::{self, Inode, InodeBody};
use super::FileSystem;

struct FileInfo<'a> {
    size: u64,
    start_block: u64,
    block_sizes: &'a [u32],
    fragment_block_index: u32,
    fragment_offset: u32,
}

fn file_info(inode: &Inode) -> Result<FileInfo<'_>> {
    match &inode.body {
        InodeBody::Reg(r) => Ok(FileInfo {
            size: r.file_size,
            start_block: r.start_block,
            block_sizes: &r.block_sizes,
            fragment_block_index: r.fragment_block_index,
            fragment_offset: r.fragment_offset,
        }),
        InodeBody::ExtReg(r) => Ok(FileInfo {
            size: r.file_size,
            start_block: r.start_block,
            block_sizes: &r.block_sizes,
            fragment_block_index: r.fragment_block_index,
            fragment_offset: r.fragment_offset,
        }),
        _ => Err(Error::NotSupported),
    }
}

/// Reads up to `len` bytes of `inode`'s content into `dst`, starting
/// at `dst[offset..]`. `len == 0` means "the whole file". Fails with
/// `InvalidArgument` if `len` exceeds the file's size or the request
/// does not fit in `dst`.
pub(crate) fn read_inode(
    fs: &FileSystem,
    inode: &Inode,
    dst: &mut [u8],
    offset: u64,
    len: u64,
) -> Result<usize> {
    let info = file_info(inode)?;
    if len > info.size {
        return Err(Error::InvalidArgument);
    }
    let want = if len == 0 { info.size } else { len };
    let offset: usize = offset.try_into().map_err(|_| Error::InvalidArgument)?;
    let want_usize: usize =
        want.try_into().map_err(|_| Error::InvalidArgument)?;
    if offset.checked_add(want_usize).map(|end| end > dst.len()).unwrap_or(true)
    {
        return Err(Error::InvalidArgument);
    }

    let has_fragment = info.fragment_block_index != inode::NO_FRAGMENT;

    let mut file_pos: u64 = 0;
    let mut written: usize = 0;
    let mut data_offset = info.start_block;
    let mut scratch = vec![0u8; fs.block_size() as usize];

    for &raw in info.block_sizes {
        if file_pos >= want {
            break;
        }
        let stored_size = (raw & 0x00ff_ffff) as usize;
        let compressed = raw & 0x0100_0000 == 0;

        let (buf, buf_off) = io::read_bytes(fs.device(), data_offset, stored_size)?;
        let src = &buf[buf_off..buf_off + stored_size];
        let decoded_len = if compressed {
            fs.decompressor().decompress(src, &mut scratch)?
        } else {
            if stored_size > scratch.len() {
                return Err(Error::InvalidArgument);
            }
            scratch[..stored_size].copy_from_slice(src);
            stored_size
        };

        let copy_len =
            core::cmp::min(decoded_len as u64, want - file_pos) as usize;
        dst[offset + written..offset + written + copy_len]
            .copy_from_slice(&scratch[..copy_len]);
        written += copy_len;
        file_pos += decoded_len as u64;
        data_offset += stored_size as u64;
    }

    if has_fragment && file_pos < want {
        let frag = fragment::fragment_lookup(fs, info.fragment_block_index)?;
        let (buf, buf_off) =
            io::read_bytes(fs.device(), frag.start, frag.stored_size as usize)?;
        let src = &buf[buf_off..buf_off + frag.stored_size as usize];
        let mut frag_scratch = vec![0u8; fs.block_size() as usize];
        let decoded_len = if frag.compressed {
            fs.decompressor().decompress(src, &mut frag_scratch)?
        } else {
            let n = frag.stored_size as usize;
            if n > frag_scratch.len() {
                return Err(Error::InvalidArgument);
            }
            frag_scratch[..n].copy_from_slice(src);
            n
        };

        let tail_len = (info.size - file_pos) as usize;
        if info.fragment_offset as usize + tail_len > decoded_len {
            return Err(Error::InvalidArgument);
        }
        let copy_len = core::cmp::min(tail_len as u64, want - file_pos) as usize;
        let frag_start = info.fragment_offset as usize;
        dst[offset + written..offset + written + copy_len]
            .copy_from_slice(&frag_scratch[frag_start..frag_start + copy_len]);
        written += copy_len;
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompress::Decompressor;
    use crate::io::SliceDevice;
    use crate::squashfs::inode::RegInode;
    use crate::squashfs::SuperBlock;
    use alloc::vec::Vec;

    struct Identity;
    impl Decompressor for Identity {
        fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
            dst[..src.len()].copy_from_slice(src);
            Ok(src.len())
        }
    }

    fn sb(block_size: u32) -> SuperBlock {
        SuperBlock {
            inode_count: 0,
            mod_time: 0,
            block_size,
            frag_count: 1,
            compression_id: 1,
            block_log: 0,
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
            fragment_table_start: 0,
            export_table_start: 0,
        }
    }

    fn reg_inode(data: &[u8], start: u64, block_size: u32) -> Inode {
        let mut block_sizes = Vec::new();
        let mut off = 0;
        while off < data.len() {
            let n = core::cmp::min(block_size as usize, data.len() - off);
            block_sizes.push(n as u32 | 0x0100_0000); // uncompressed
            off += n;
        }
        Inode {
            base: crate::squashfs::inode::InodeBase {
                inode_type: crate::squashfs::InodeType::Reg,
                mode: 0o644,
                uid_idx: 0,
                gid_idx: 0,
                mtime: 0,
                inode_number: 1,
            },
            body: InodeBody::Reg(RegInode {
                start_block: start,
                fragment_block_index: NO_FRAGMENT,
                fragment_offset: 0,
                file_size: data.len() as u64,
                block_sizes,
            }),
        }
    }

    #[test]
    fn reads_whole_file_across_multiple_blocks() {
        let block_size = 8u32;
        let data = b"0123456789abcdef!".to_vec(); // 18 bytes, 3 blocks of <=8
        let mut image = data.clone();
        image.resize(512, 0);
        let dev = SliceDevice::new(&image, 512);
        let fs = FileSystem {
            device: &dev,
            superblock: sb(block_size),
            decompressor: &Identity,
        };
        let inode = reg_inode(&data, 0, block_size);

        let mut dst = vec![0u8; data.len()];
        let n = read_inode(&fs, &inode, &mut dst, 0, 0).unwrap();
        assert_eq!(n, data.len());
        assert_eq!(dst, data);
    }

    #[test]
    fn partial_read_returns_prefix() {
        let block_size = 8u32;
        let data = b"0123456789abcdef!".to_vec();
        let mut image = data.clone();
        image.resize(512, 0);
        let dev = SliceDevice::new(&image, 512);
        let fs = FileSystem {
            device: &dev,
            superblock: sb(block_size),
            decompressor: &Identity,
        };
        let inode = reg_inode(&data, 0, block_size);

        let mut dst = vec![0u8; 5];
        let n = read_inode(&fs, &inode, &mut dst, 0, 5).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&dst, &data[..5]);
    }

    #[test]
    fn len_greater_than_size_is_invalid_argument() {
        let block_size = 8u32;
        let data = b"short".to_vec();
        let mut image = data.clone();
        image.resize(512, 0);
        let dev = SliceDevice::new(&image, 512);
        let fs = FileSystem {
            device: &dev,
            superblock: sb(block_size),
            decompressor: &Identity,
        };
        let inode = reg_inode(&data, 0, block_size);

        let mut dst = vec![0u8; 100];
        assert_eq!(
            read_inode(&fs, &inode, &mut dst, 0, 100).unwrap_err(),
            Error::InvalidArgument
        );
    }

    #[test]
    fn zero_length_file_reads_zero_bytes() {
        let block_size = 8u32;
        let image = vec![0u8; 512];
        let dev = SliceDevice::new(&image, 512);
        let fs = FileSystem {
            device: &dev,
            superblock: sb(block_size),
            decompressor: &Identity,
        };
        let inode = reg_inode(&[], 0, block_size);
        let mut dst: Vec<u8> = Vec::new();
        let n = read_inode(&fs, &inode, &mut dst, 0, 0).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn file_with_fragment_appends_tail() {
        let block_size = 8u32;
        let full_block = b"01234567".to_vec(); // exactly one full block
        let data_len = full_block.len() + 2; // plus a 2-byte fragment tail

        // Sector 0: the file's one data block. Sector 1: the shared
        // fragment block, "garxyz__" with fragment_offset=3 -> "xy".
        // Sector 2: the fragment pointer table (one u64 pointing at
        // sector 3). Sector 3: the metadata chunk holding the single
        // fragment entry. `SliceDevice` reads whole sectors, so every
        // region the reader touches must be covered by the image.
        let mut image = full_block.clone();
        image.resize(512, 0);
        let frag_payload = b"garxyz__".to_vec();
        image.extend_from_slice(&frag_payload);
        image.resize(1024, 0);

        let fragment_table_start = image.len() as u64; // 1024
        let chunk_addr = fragment_table_start + 512; // 1536
        image.extend_from_slice(&chunk_addr.to_le_bytes());
        image.resize(1536, 0);

        let mut entry = Vec::new();
        entry.extend_from_slice(&512u64.to_le_bytes()); // fragment start
        entry.extend_from_slice(&(8u32 | 0x0100_0000).to_le_bytes()); // uncompressed
        entry.extend_from_slice(&0u32.to_le_bytes());
        let header = 0x8000u16 | entry.len() as u16;
        image.extend_from_slice(&header.to_le_bytes());
        image.extend_from_slice(&entry);
        image.resize(2048, 0);

        let dev = SliceDevice::new(&image, 512);
        let mut sb = sb(block_size);
        sb.fragment_table_start = fragment_table_start;
        sb.frag_count = 1;
        let fs = FileSystem {
            device: &dev,
            superblock: sb,
            decompressor: &Identity,
        };

        let inode = Inode {
            base: crate::squashfs::inode::InodeBase {
                inode_type: crate::squashfs::InodeType::Reg,
                mode: 0o644,
                uid_idx: 0,
                gid_idx: 0,
                mtime: 0,
                inode_number: 1,
            },
            body: InodeBody::Reg(RegInode {
                start_block: 0,
                fragment_block_index: 0,
                fragment_offset: 3,
                file_size: data_len as u64,
                block_sizes: vec![8 | 0x0100_0000],
            }),
        };

        let mut dst = vec![0u8; data_len];
        let n = read_inode(&fs, &inode, &mut dst, 0, 0).unwrap();
        assert_eq!(n, data_len);
        assert_eq!(&dst[..8], &full_block[..]);
        assert_eq!(&dst[8..], b"xy");
    }
}
