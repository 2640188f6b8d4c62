// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inodes: tagged by a 16-bit type discriminant into one of the basic
//! or "extended" (L-prefixed) variants. Every inode begins with a
//! common base (type, mode, uid/gid index, mtime, inode number); the
//! remainder of the record is variant-specific and, for regular
//! files, followed by a trailing array of per-block stored sizes.

use crate::leview::{read_i16, read_u16, read_u32, read_u64};
use crate::result::{Error, Result};

use alloc::vec::Vec;

use super::table::PositionList;

const BASE_LEN: usize = 16;

/// The 16-bit inode type discriminant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u16)]
pub enum InodeType {
    Dir = 1,
    Reg = 2,
    Symlink = 3,
    BlockDev = 4,
    CharDev = 5,
    Fifo = 6,
    Socket = 7,
    ExtDir = 8,
    ExtReg = 9,
    ExtSymlink = 10,
    ExtBlockDev = 11,
    ExtCharDev = 12,
    ExtFifo = 13,
    ExtSocket = 14,
}

impl InodeType {
    fn from_raw(raw: u16) -> Result<InodeType> {
        Ok(match raw {
            1 => InodeType::Dir,
            2 => InodeType::Reg,
            3 => InodeType::Symlink,
            4 => InodeType::BlockDev,
            5 => InodeType::CharDev,
            6 => InodeType::Fifo,
            7 => InodeType::Socket,
            8 => InodeType::ExtDir,
            9 => InodeType::ExtReg,
            10 => InodeType::ExtSymlink,
            11 => InodeType::ExtBlockDev,
            12 => InodeType::ExtCharDev,
            13 => InodeType::ExtFifo,
            14 => InodeType::ExtSocket,
            _ => return Err(Error::InvalidArgument),
        })
    }

    /// The coarse kind the public directory-entry API reports.
    pub fn kind(self) -> super::dir::DirEntryKind {
        use super::dir::DirEntryKind::*;
        match self {
            InodeType::Dir | InodeType::ExtDir => Dir,
            InodeType::Reg | InodeType::ExtReg => Reg,
            InodeType::Symlink | InodeType::ExtSymlink => Symlink,
            _ => Other,
        }
    }

    pub fn is_dir(self) -> bool {
        matches!(self, InodeType::Dir | InodeType::ExtDir)
    }
}

/// Fields shared by every inode variant.
#[derive(Clone, Copy, Debug)]
pub struct InodeBase {
    pub inode_type: InodeType,
    pub mode: u16,
    pub uid_idx: u16,
    pub gid_idx: u16,
    pub mtime: u32,
    pub inode_number: u32,
}

#[derive(Clone, Debug)]
pub struct DirInode {
    /// Byte offset into the directory table (relative to its anchor)
    /// of the metadata chunk holding this directory's listing.
    pub start_block: u32,
    pub nlink: u32,
    pub file_size: u16,
    pub offset: u16,
    pub parent_inode: u32,
}

#[derive(Clone, Debug)]
pub struct ExtDirInode {
    pub nlink: u32,
    pub file_size: u32,
    pub start_block: u32,
    pub parent_inode: u32,
    pub offset: u16,
}

/// Sentinel fragment-block index meaning "this file has no fragment".
pub const NO_FRAGMENT: u32 = 0xffff_ffff;

#[derive(Clone, Debug)]
pub struct RegInode {
    pub start_block: u64,
    pub fragment_block_index: u32,
    pub fragment_offset: u32,
    pub file_size: u64,
    pub block_sizes: Vec<u32>,
}

#[derive(Clone, Debug)]
pub struct ExtRegInode {
    pub start_block: u64,
    pub file_size: u64,
    pub fragment_block_index: u32,
    pub fragment_offset: u32,
    pub block_sizes: Vec<u32>,
}

#[derive(Clone, Debug)]
pub struct SymlinkInode {
    pub nlink: u32,
    pub target: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct DeviceInode {
    pub nlink: u32,
    pub rdev: u32,
}

#[derive(Clone, Debug)]
pub struct PipeInode {
    pub nlink: u32,
}

#[derive(Clone, Debug)]
pub enum InodeBody {
    Dir(DirInode),
    ExtDir(ExtDirInode),
    Reg(RegInode),
    ExtReg(ExtRegInode),
    Symlink(SymlinkInode),
    Device(DeviceInode),
    Pipe(PipeInode),
}

#[derive(Clone, Debug)]
pub struct Inode {
    pub base: InodeBase,
    pub body: InodeBody,
}

impl Inode {
    pub fn is_dir(&self) -> bool {
        self.base.inode_type.is_dir()
    }
}

/// Parses one inode record starting at `table[offset..]`. Returns the
/// inode and the number of bytes consumed (needed by
/// [`find_inode_by_number`] to advance past variable-length records).
pub(crate) fn parse_inode(
    table: &[u8],
    offset: usize,
    block_size: u32,
) -> Result<(Inode, usize)> {
    if offset + BASE_LEN > table.len() {
        return Err(Error::InvalidArgument);
    }
    let inode_type = InodeType::from_raw(read_u16(table, offset))?;
    let base = InodeBase {
        inode_type,
        mode: read_u16(table, offset + 2),
        uid_idx: read_u16(table, offset + 4),
        gid_idx: read_u16(table, offset + 6),
        mtime: read_u32(table, offset + 8),
        inode_number: read_u32(table, offset + 12),
    };
    let mut p = offset + BASE_LEN;
    let need = |p: usize, n: usize| -> Result<()> {
        if p + n > table.len() {
            Err(Error::InvalidArgument)
        } else {
            Ok(())
        }
    };

    let body = match inode_type {
        InodeType::Dir => {
            need(p, 16)?;
            let body = DirInode {
                start_block: read_u32(table, p),
                nlink: read_u32(table, p + 4),
                file_size: read_u16(table, p + 8),
                offset: read_u16(table, p + 10),
                parent_inode: read_u32(table, p + 12),
            };
            p += 16;
            InodeBody::Dir(body)
        }
        InodeType::ExtDir => {
            need(p, 24)?;
            let nlink = read_u32(table, p);
            let file_size = read_u32(table, p + 4);
            let start_block = read_u32(table, p + 8);
            let parent_inode = read_u32(table, p + 12);
            let i_count = read_u16(table, p + 16);
            let offset = read_u16(table, p + 18);
            p += 24;
            // Skip the trailing squashfs_dir_index[] array: each entry
            // is a 12-byte fixed header plus a variable-length name
            // (name_size stored as len - 1, at byte 11 of the entry).
            for _ in 0..i_count {
                need(p, 12)?;
                let name_size = read_u32(table, p + 8) as usize;
                p += 12 + name_size + 1;
            }
            InodeBody::ExtDir(ExtDirInode {
                nlink,
                file_size,
                start_block,
                parent_inode,
                offset,
            })
        }
        InodeType::Reg => {
            need(p, 16)?;
            let start_block = read_u32(table, p) as u64;
            let fragment_block_index = read_u32(table, p + 4);
            let fragment_offset = read_u32(table, p + 8);
            let file_size = read_u32(table, p + 12) as u64;
            p += 16;
            let block_sizes = read_block_sizes(
                table,
                &mut p,
                file_size,
                fragment_block_index,
                block_size,
            )?;
            InodeBody::Reg(RegInode {
                start_block,
                fragment_block_index,
                fragment_offset,
                file_size,
                block_sizes,
            })
        }
        InodeType::ExtReg => {
            need(p, 40)?;
            let start_block = read_u64(table, p);
            let file_size = read_u64(table, p + 8);
            // sparse: u64 at p+16, unused by a read-only reader.
            // nlink: u32 at p+24, unused.
            let fragment_block_index = read_u32(table, p + 28);
            let fragment_offset = read_u32(table, p + 32);
            // xattr idx: u32 at p+36, unused (xattrs are out of scope).
            p += 40;
            let block_sizes = read_block_sizes(
                table,
                &mut p,
                file_size,
                fragment_block_index,
                block_size,
            )?;
            InodeBody::ExtReg(ExtRegInode {
                start_block,
                file_size,
                fragment_block_index,
                fragment_offset,
                block_sizes,
            })
        }
        InodeType::Symlink => {
            need(p, 8)?;
            let nlink = read_u32(table, p);
            let symlink_size = read_u32(table, p + 4) as usize;
            p += 8;
            need(p, symlink_size)?;
            let target = table[p..p + symlink_size].to_vec();
            p += symlink_size;
            InodeBody::Symlink(SymlinkInode { nlink, target })
        }
        InodeType::ExtSymlink => {
            need(p, 8)?;
            let nlink = read_u32(table, p);
            let symlink_size = read_u32(table, p + 4) as usize;
            p += 8;
            need(p, symlink_size)?;
            let target = table[p..p + symlink_size].to_vec();
            p += symlink_size;
            need(p, 4)?; // xattr idx, unused
            p += 4;
            InodeBody::Symlink(SymlinkInode { nlink, target })
        }
        InodeType::BlockDev | InodeType::CharDev => {
            need(p, 8)?;
            let nlink = read_u32(table, p);
            let rdev = read_u32(table, p + 4);
            p += 8;
            InodeBody::Device(DeviceInode { nlink, rdev })
        }
        InodeType::ExtBlockDev | InodeType::ExtCharDev => {
            need(p, 12)?;
            let nlink = read_u32(table, p);
            let rdev = read_u32(table, p + 4);
            // xattr idx: u32 at p+8, unused.
            p += 12;
            InodeBody::Device(DeviceInode { nlink, rdev })
        }
        InodeType::Fifo | InodeType::Socket => {
            need(p, 4)?;
            let nlink = read_u32(table, p);
            p += 4;
            InodeBody::Pipe(PipeInode { nlink })
        }
        InodeType::ExtFifo | InodeType::ExtSocket => {
            need(p, 8)?;
            let nlink = read_u32(table, p);
            // xattr idx: u32 at p+4, unused.
            p += 8;
            InodeBody::Pipe(PipeInode { nlink })
        }
    };

    Ok((Inode { base, body }, p - offset))
}

/// Computes `datablk_count` (invariant 5) and reads that many
/// trailing `u32` stored-size entries, advancing `*p` past them.
fn read_block_sizes(
    table: &[u8],
    p: &mut usize,
    file_size: u64,
    fragment_block_index: u32,
    block_size: u32,
) -> Result<Vec<u32>> {
    let block_size = block_size as u64;
    let has_fragment = fragment_block_index != NO_FRAGMENT;
    let count = if has_fragment {
        file_size / block_size
    } else {
        crate::leview::div_round_up(file_size, block_size)
    };
    let count: usize = count.try_into().map_err(|_| Error::InvalidArgument)?;
    if *p + count * 4 > table.len() {
        return Err(Error::InvalidArgument);
    }
    let mut sizes = Vec::with_capacity(count);
    for i in 0..count {
        sizes.push(read_u32(table, *p + i * 4));
    }
    *p += count * 4;
    Ok(sizes)
}

/// Given a SquashFS inode reference (high 32 bits: the owning chunk's
/// on-disk start offset; low 16 bits: the intra-chunk byte offset),
/// locates and parses the inode in O(1) using the table's position
/// list.
pub(crate) fn find_inode(
    table: &[u8],
    positions: &PositionList,
    inode_ref: u64,
    block_size: u32,
) -> Result<Inode> {
    let chunk_start = (inode_ref >> 16) as u32;
    let intra = (inode_ref & 0xffff) as usize;
    let decoded_base = positions.locate(chunk_start)? as usize;
    let (inode, _) = parse_inode(table, decoded_base + intra, block_size)?;
    Ok(inode)
}

/// Linear scan of the whole inode table, keyed by `inode_number`
/// rather than by a chunk-relative reference. Used where the caller
/// only has an inode number (`..` traversal via `parent_inode`) and no
/// chunk-relative reference to resolve directly: correctness-preserving
/// but O(inodes), since it must re-decode every inode's type tag to
/// skip over its variable-length record.
pub fn find_inode_by_number(
    table: &[u8],
    target: u32,
    block_size: u32,
) -> Result<Inode> {
    let mut offset = 0;
    while offset < table.len() {
        let (inode, consumed) = parse_inode(table, offset, block_size)?;
        if inode.base.inode_number == target {
            return Ok(inode);
        }
        if consumed == 0 {
            return Err(Error::InvalidArgument);
        }
        offset += consumed;
    }
    Err(Error::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_base(buf: &mut Vec<u8>, ty: u16, inode_number: u32) {
        buf.extend_from_slice(&ty.to_le_bytes());
        buf.extend_from_slice(&0o644u16.to_le_bytes()); // mode
        buf.extend_from_slice(&0u16.to_le_bytes()); // uid idx
        buf.extend_from_slice(&0u16.to_le_bytes()); // gid idx
        buf.extend_from_slice(&0u32.to_le_bytes()); // mtime
        buf.extend_from_slice(&inode_number.to_le_bytes());
    }

    #[test]
    fn parses_basic_symlink() {
        let mut buf = Vec::new();
        push_base(&mut buf, 3, 7);
        buf.extend_from_slice(&1u32.to_le_bytes()); // nlink
        buf.extend_from_slice(&5u32.to_le_bytes()); // symlink_size
        buf.extend_from_slice(b"a/b.c");
        let (inode, consumed) = parse_inode(&buf, 0, 131072).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(inode.base.inode_number, 7);
        match inode.body {
            InodeBody::Symlink(s) => assert_eq!(s.target, b"a/b.c"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn parses_basic_directory() {
        let mut buf = Vec::new();
        push_base(&mut buf, 1, 2);
        buf.extend_from_slice(&100u32.to_le_bytes()); // start_block
        buf.extend_from_slice(&2u32.to_le_bytes()); // nlink
        buf.extend_from_slice(&30u16.to_le_bytes()); // file_size
        buf.extend_from_slice(&8u16.to_le_bytes()); // offset
        buf.extend_from_slice(&2u32.to_le_bytes()); // parent_inode
        let (inode, consumed) = parse_inode(&buf, 0, 131072).unwrap();
        assert_eq!(consumed, buf.len());
        assert!(inode.is_dir());
        match inode.body {
            InodeBody::Dir(d) => {
                assert_eq!(d.start_block, 100);
                assert_eq!(d.offset, 8);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn find_inode_by_number_scans_past_earlier_records() {
        let mut buf = Vec::new();
        push_base(&mut buf, 6, 10); // fifo, nlink-only body
        buf.extend_from_slice(&1u32.to_le_bytes());
        push_base(&mut buf, 3, 11); // symlink
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(b"x");

        let inode = find_inode_by_number(&buf, 11, 131072).unwrap();
        assert_eq!(inode.base.inode_number, 11);
        assert!(find_inode_by_number(&buf, 99, 131072).is_err());
    }
}
