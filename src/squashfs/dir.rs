// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The directory walker: the primary state machine of the system. A
//! directory's listing is a run of {header, entries...} groups in the
//! directory table; this module turns that run into a `readdir`-style
//! iterator that resolves each entry down to a `{name, type, size}`
//! triple.

use crate::leview::{read_i16, read_u16, read_u32};
use crate::result::{Error, Result};

use alloc::string::String;

use super::inode;
use super::table::{PositionList, Table};

const HEADER_LEN: usize = 12;
const ENTRY_FIXED_LEN: usize = 8;

/// The coarse file kind reported by `readdir`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DirEntryKind {
    Dir,
    Reg,
    Symlink,
    Other,
}

/// One resolved directory entry.
#[derive(Clone, Debug)]
pub struct Entry {
    pub name: String,
    pub kind: DirEntryKind,
    pub size: u64,
    /// The inode reference backing this entry, kept around so path
    /// resolution can follow it without re-walking the directory.
    pub(crate) inode_ref: u64,
}

enum State {
    /// A header has just been parsed; `entry_count` entries remain in
    /// this run, `remaining` bytes remain in the directory's total
    /// span.
    HeaderReady { entry_count: u32, remaining: i64 },
    End,
}

/// A positioned, iterable view of one directory's listing.
///
/// Owns the fully decoded inode and directory tables (arena-style:
/// every cursor into them is a `(&Table, usize)` pair) — it is the
/// only runtime object that holds onto them, and dropping it frees
/// them.
pub struct DirStream {
    inode_table: Table,
    dir_table: Table,
    block_size: u32,
    cursor: usize,
    header_chunk_start: u32,
    header_inode_number: i64,
    state: State,
}

impl DirStream {
    pub(crate) fn new(
        inode_table: Table,
        dir_table: Table,
        block_size: u32,
        start_cursor: usize,
        span: u32,
    ) -> DirStream {
        DirStream {
            inode_table,
            dir_table,
            block_size,
            cursor: start_cursor,
            header_chunk_start: 0,
            header_inode_number: 0,
            // The on-disk `file_size` field over-counts by 3 bytes; a
            // directory's true listing span is `file_size - 3` (a
            // long-standing SquashFS convention, not stated by the
            // struct layout itself).
            state: State::HeaderReady {
                entry_count: 0,
                remaining: span as i64 - 3,
            },
        }
    }

    fn read_header(&mut self) -> Result<()> {
        let buf = &self.dir_table.bytes;
        if self.cursor + HEADER_LEN > buf.len() {
            self.state = State::End;
            return Ok(());
        }
        let count = read_u32(buf, self.cursor);
        self.header_chunk_start = read_u32(buf, self.cursor + 4);
        self.header_inode_number = read_u32(buf, self.cursor + 8) as i64;
        self.cursor += HEADER_LEN;
        self.state = match &self.state {
            State::HeaderReady { remaining, .. } => {
                let remaining = remaining - HEADER_LEN as i64;
                if remaining <= 0 {
                    State::End
                } else {
                    State::HeaderReady { entry_count: count + 1, remaining }
                }
            }
            State::End => State::End,
        };
        Ok(())
    }

    /// Advances the stream and returns the next entry, or `None` at
    /// end of iteration.
    pub fn readdir(&mut self) -> Result<Option<Entry>> {
        loop {
            match self.state {
                State::End => return Ok(None),
                State::HeaderReady { entry_count: 0, .. } => {
                    self.read_header()?;
                    if matches!(self.state, State::End) {
                        return Ok(None);
                    }
                }
                State::HeaderReady { entry_count, remaining } => {
                    let buf = &self.dir_table.bytes;
                    if self.cursor + ENTRY_FIXED_LEN > buf.len() {
                        self.state = State::End;
                        return Ok(None);
                    }
                    let offset = read_u16(buf, self.cursor);
                    let delta = read_i16(buf, self.cursor + 2);
                    let raw_type = read_u16(buf, self.cursor + 4);
                    let name_size = read_u16(buf, self.cursor + 6) as usize;
                    let name_len = name_size + 1;
                    let name_start = self.cursor + ENTRY_FIXED_LEN;
                    if name_start + name_len > buf.len() {
                        self.state = State::End;
                        return Ok(None);
                    }
                    let name = String::from_utf8_lossy(
                        &buf[name_start..name_start + name_len],
                    )
                    .into_owned();
                    let entry_size = ENTRY_FIXED_LEN + name_len;
                    self.cursor += entry_size;

                    let inode_number =
                        (self.header_inode_number + delta as i64) as u32;
                    let inode_ref =
                        ((self.header_chunk_start as u64) << 16) | offset as u64;
                    let kind = kind_from_raw(raw_type);

                    let next_count = entry_count - 1;
                    let next_remaining = remaining - entry_size as i64;
                    self.state = if next_remaining <= 0 {
                        State::End
                    } else {
                        State::HeaderReady {
                            entry_count: next_count,
                            remaining: next_remaining,
                        }
                    };

                    let size = self.entry_size(inode_ref, inode_number)?;
                    return Ok(Some(Entry { name, kind, size, inode_ref }));
                }
            }
        }
    }

    fn entry_size(&self, inode_ref: u64, _inode_number: u32) -> Result<u64> {
        let inode = inode::find_inode(
            &self.inode_table.bytes,
            &self.inode_table.positions,
            inode_ref,
            self.block_size,
        )?;
        Ok(match inode.body {
            super::inode::InodeBody::Reg(r) => r.file_size,
            super::inode::InodeBody::ExtReg(r) => r.file_size,
            _ => 0,
        })
    }

    pub(crate) fn inode_table(&self) -> &Table {
        &self.inode_table
    }

    pub(crate) fn inode_positions(&self) -> &PositionList {
        &self.inode_table.positions
    }

    pub(crate) fn resolve_ref(&self, inode_ref: u64) -> Result<inode::Inode> {
        inode::find_inode(
            &self.inode_table.bytes,
            &self.inode_table.positions,
            inode_ref,
            self.block_size,
        )
    }
}

pub(crate) fn kind_from_raw(raw_type: u16) -> DirEntryKind {
    match raw_type {
        1 | 8 => DirEntryKind::Dir,
        2 | 9 => DirEntryKind::Reg,
        3 | 10 => DirEntryKind::Symlink,
        _ => DirEntryKind::Other,
    }
}

/// Scans one directory's `{header, entries...}` run (same grammar as
/// [`DirStream::readdir`]) for an entry named `name`, without
/// materialising every entry's file size by re-visiting the inode
/// table. Used by the path resolver, which only needs an entry's
/// inode reference and kind to continue the walk.
pub(crate) fn find_entry(
    dir_bytes: &[u8],
    start_cursor: usize,
    span: u32,
    name: &str,
) -> Result<Option<(u64, DirEntryKind)>> {
    let mut cursor = start_cursor;
    let mut remaining: i64 = span as i64 - 3;
    let name = name.as_bytes();

    while remaining > 0 {
        if cursor + HEADER_LEN > dir_bytes.len() {
            return Ok(None);
        }
        let count = read_u32(dir_bytes, cursor);
        let chunk_start = read_u32(dir_bytes, cursor + 4);
        cursor += HEADER_LEN;
        remaining -= HEADER_LEN as i64;
        if remaining <= 0 {
            return Ok(None);
        }

        let mut entry_count = count + 1;
        while entry_count > 0 {
            if cursor + ENTRY_FIXED_LEN > dir_bytes.len() {
                return Ok(None);
            }
            let offset = read_u16(dir_bytes, cursor);
            let _delta = read_i16(dir_bytes, cursor + 2);
            let raw_type = read_u16(dir_bytes, cursor + 4);
            let name_size = read_u16(dir_bytes, cursor + 6) as usize;
            let name_len = name_size + 1;
            let name_start = cursor + ENTRY_FIXED_LEN;
            if name_start + name_len > dir_bytes.len() {
                return Ok(None);
            }
            let entry_name = &dir_bytes[name_start..name_start + name_len];
            let entry_size = ENTRY_FIXED_LEN + name_len;

            if entry_name == name {
                let inode_ref =
                    ((chunk_start as u64) << 16) | offset as u64;
                return Ok(Some((inode_ref, kind_from_raw(raw_type))));
            }

            cursor += entry_size;
            remaining -= entry_size as i64;
            entry_count -= 1;
            if remaining <= 0 {
                return Ok(None);
            }
        }
    }
    Ok(None)
}
