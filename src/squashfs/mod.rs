// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A read-only reader for the SquashFS on-disk filesystem format.
//!
//! The superblock handshake, the metadata-block decoder that
//! reconstructs the inode and directory tables from chained
//! compressed chunks, the path resolver that walks directory entries
//! (including symlink chasing) to a terminal inode, and the
//! file-content reader that reconstructs file bodies from data blocks
//! and the shared fragment store.

use crate::decompress::{Compression, Decompressor};
use crate::io::BlockDevice;
use crate::leview::{read_u16, read_u32, read_u64};
use crate::result::{Error, Result};

use alloc::boxed::Box;
use bitflags::bitflags;
use static_assertions::const_assert_eq;

pub mod dir;
pub mod file;
pub mod fragment;
pub mod inode;
pub mod metadata;
pub mod path;
pub mod table;

pub use dir::{DirEntryKind, DirStream, Entry};
pub use inode::{Inode, InodeType};

/// Magic number at offset 0 of every SquashFS image: the ASCII bytes
/// `hsqs` read as a little-endian u32.
pub const MAGIC: u32 = 0x7371_7368;

/// Size in bytes of the on-disk superblock.
pub const SUPERBLOCK_SIZE: usize = 96;

/// Maximum decompressed size of a single metadata chunk.
pub const METADATA_CHUNK_SIZE: usize = 8192;

/// Number of fragment entries packed into one decompressed metadata
/// chunk of the fragment table (512 entries * 16 bytes/entry = 8192).
pub const FRAGMENT_ENTRIES_PER_CHUNK: usize = 512;
const_assert_eq!(FRAGMENT_ENTRIES_PER_CHUNK * 16, METADATA_CHUNK_SIZE);

/// Default symlink-resolution recursion bound: a cycle of symlinks must
/// not hang the resolver.
pub const MAX_SYMLINK_DEPTH: u32 = 40;

bitflags! {
    /// The superblock's `flags` field: compressor/table hints a reader
    /// may use to skip work it would otherwise do speculatively (e.g.
    /// `UNCOMPRESSED_INODES` means every inode-table chunk is stored,
    /// never compressed).
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct SuperBlockFlags: u16 {
        const UNCOMPRESSED_INODES   = 0x0001;
        const UNCOMPRESSED_DATA     = 0x0002;
        const CHECK                 = 0x0004;
        const UNCOMPRESSED_FRAGMENTS = 0x0008;
        const NO_FRAGMENTS          = 0x0010;
        const ALWAYS_FRAGMENTS      = 0x0020;
        const DUPLICATES            = 0x0040;
        const EXPORTABLE            = 0x0080;
        const UNCOMPRESSED_XATTRS   = 0x0100;
        const NO_XATTRS             = 0x0200;
        const COMPRESSOR_OPTIONS    = 0x0400;
        const UNCOMPRESSED_IDS      = 0x0800;
    }
}

/// The on-disk superblock, parsed from the first 96 bytes of the
/// image.
#[derive(Clone, Copy, Debug)]
pub struct SuperBlock {
    pub inode_count: u32,
    pub mod_time: u32,
    pub block_size: u32,
    pub frag_count: u32,
    pub compression_id: u16,
    pub block_log: u16,
    pub flags: SuperBlockFlags,
    pub id_count: u16,
    pub version_major: u16,
    pub version_minor: u16,
    pub root_inode_ref: u64,
    pub bytes_used: u64,
    pub id_table_start: u64,
    pub xattr_table_start: u64,
    pub inode_table_start: u64,
    pub directory_table_start: u64,
    pub fragment_table_start: u64,
    pub export_table_start: u64,
}

impl SuperBlock {
    /// Parses a superblock from the first `SUPERBLOCK_SIZE` bytes of
    /// an image. Fails with `InvalidArgument` on a magic mismatch or
    /// an out-of-order table anchor (invariant 1 in the data model:
    /// inode-start < dir-start < frag-start <= export-start).
    pub fn parse(buf: &[u8]) -> Result<SuperBlock> {
        if buf.len() < SUPERBLOCK_SIZE {
            return Err(Error::InvalidArgument);
        }
        if read_u32(buf, 0) != MAGIC {
            return Err(Error::InvalidArgument);
        }
        let sb = SuperBlock {
            inode_count: read_u32(buf, 4),
            mod_time: read_u32(buf, 8),
            block_size: read_u32(buf, 12),
            frag_count: read_u32(buf, 16),
            compression_id: read_u16(buf, 20),
            block_log: read_u16(buf, 22),
            flags: SuperBlockFlags::from_bits_truncate(read_u16(buf, 24)),
            id_count: read_u16(buf, 26),
            version_major: read_u16(buf, 28),
            version_minor: read_u16(buf, 30),
            root_inode_ref: read_u64(buf, 32),
            bytes_used: read_u64(buf, 40),
            id_table_start: read_u64(buf, 48),
            xattr_table_start: read_u64(buf, 56),
            inode_table_start: read_u64(buf, 64),
            directory_table_start: read_u64(buf, 72),
            fragment_table_start: read_u64(buf, 80),
            export_table_start: read_u64(buf, 88),
        };
        if !sb.block_size.is_power_of_two()
            || sb.block_size < 4096
            || sb.block_size > 1024 * 1024
        {
            return Err(Error::InvalidArgument);
        }
        if !(sb.inode_table_start < sb.directory_table_start
            && sb.directory_table_start < sb.fragment_table_start
            && sb.fragment_table_start <= sb.export_table_start)
        {
            return Err(Error::InvalidArgument);
        }
        Ok(sb)
    }

    pub fn has_fragments(&self) -> bool {
        self.frag_count != 0
    }
}

/// A mounted SquashFS image: a device, a superblock, and the
/// decompressor named by the superblock's compression id. A plain
/// value, driveable directly in-process or under test, independent of
/// the singleton exposed by [`crate::api`].
pub struct FileSystem<'d> {
    device: &'d dyn BlockDevice,
    superblock: SuperBlock,
    decompressor: &'static dyn Decompressor,
}

impl<'d> FileSystem<'d> {
    /// Mounts the image on `device`: reads the superblock and resolves
    /// the compressor it names. Fails with `InvalidArgument` on a bad
    /// superblock and `NotSupported` on an unknown or disabled codec.
    pub fn probe(device: &'d dyn BlockDevice) -> Result<FileSystem<'d>> {
        let (buf, off) = crate::io::read_bytes(device, 0, SUPERBLOCK_SIZE)?;
        let superblock = match SuperBlock::parse(&buf[off..off + SUPERBLOCK_SIZE]) {
            Ok(sb) => sb,
            Err(e) => {
                crate::println!("squashfs mount failed: invalid superblock ({e})");
                return Err(e);
            }
        };
        let decompressor = match Compression::from_id(superblock.compression_id)
            .and_then(Compression::decompressor)
        {
            Ok(d) => d,
            Err(e) => {
                crate::println!(
                    "squashfs mount failed: unsupported compression id {} ({e})",
                    superblock.compression_id
                );
                return Err(e);
            }
        };
        crate::println!(
            "squashfs mounted successfully ({} inodes, block size {})",
            superblock.inode_count,
            superblock.block_size
        );
        Ok(FileSystem { device, superblock, decompressor })
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    pub fn device(&self) -> &'d dyn BlockDevice {
        self.device
    }

    pub fn decompressor(&self) -> &'static dyn Decompressor {
        self.decompressor
    }

    pub fn block_size(&self) -> u32 {
        self.superblock.block_size
    }

    /// Opens a directory stream positioned at `path`.
    pub fn open_dir(&self, path: &str) -> Result<Box<DirStream>> {
        path::open_dir(self, path, 0)
    }

    /// Reads up to `len` bytes of `path` into `dst`, starting at
    /// `offset`. `len == 0` means "the whole file from `offset`".
    pub fn read(
        &self,
        path: &str,
        dst: &mut [u8],
        offset: u64,
        len: u64,
    ) -> Result<usize> {
        let (ino, _) = path::resolve(self, path, 0)?;
        file::read_inode(self, &ino, dst, offset, len)
    }

    /// Returns the size in bytes of the regular file (or the file a
    /// symlink resolves to) at `path`.
    pub fn size(&self, path: &str) -> Result<u64> {
        let (ino, _) = path::resolve(self, path, 0)?;
        match ino.body {
            inode::InodeBody::Reg(ref r) => Ok(r.file_size),
            inode::InodeBody::ExtReg(ref r) => Ok(r.file_size),
            _ => Err(Error::NotSupported),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_superblock_bytes() -> [u8; SUPERBLOCK_SIZE] {
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        buf[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        buf[4..8].copy_from_slice(&1000u32.to_le_bytes()); // inode_count
        buf[12..16].copy_from_slice(&131072u32.to_le_bytes()); // block_size
        buf[20..22].copy_from_slice(&1u16.to_le_bytes()); // compression: zlib
        buf[64..72].copy_from_slice(&96u64.to_le_bytes()); // inode_table_start
        buf[72..80].copy_from_slice(&1000u64.to_le_bytes()); // dir_table_start
        buf[80..88].copy_from_slice(&2000u64.to_le_bytes()); // frag_table_start
        buf[88..96].copy_from_slice(&3000u64.to_le_bytes()); // export_table_start
        buf
    }

    #[test]
    fn parses_valid_superblock() {
        let buf = valid_superblock_bytes();
        let sb = SuperBlock::parse(&buf).unwrap();
        assert_eq!(sb.block_size, 131072);
        assert_eq!(sb.compression_id, 1);
        assert_eq!(sb.inode_table_start, 96);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = valid_superblock_bytes();
        buf[0] = 0;
        assert_eq!(
            SuperBlock::parse(&buf).unwrap_err(),
            Error::InvalidArgument
        );
    }

    #[test]
    fn rejects_out_of_order_anchors() {
        let mut buf = valid_superblock_bytes();
        // Swap directory and fragment table starts.
        buf[72..80].copy_from_slice(&2000u64.to_le_bytes());
        buf[80..88].copy_from_slice(&1000u64.to_le_bytes());
        assert_eq!(
            SuperBlock::parse(&buf).unwrap_err(),
            Error::InvalidArgument
        );
    }

    #[test]
    fn rejects_non_power_of_two_block_size() {
        let mut buf = valid_superblock_bytes();
        buf[12..16].copy_from_slice(&131073u32.to_le_bytes());
        assert_eq!(
            SuperBlock::parse(&buf).unwrap_err(),
            Error::InvalidArgument
        );
    }

    #[test]
    fn parses_flags_and_ignores_unknown_bits() {
        let mut buf = valid_superblock_bytes();
        let raw = SuperBlockFlags::NO_FRAGMENTS.bits() | 0x8000; // unknown high bit
        buf[24..26].copy_from_slice(&raw.to_le_bytes());
        let sb = SuperBlock::parse(&buf).unwrap();
        assert!(sb.flags.contains(SuperBlockFlags::NO_FRAGMENTS));
        assert!(!sb.flags.contains(SuperBlockFlags::EXPORTABLE));
    }
}
