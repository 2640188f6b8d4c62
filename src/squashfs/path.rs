// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The path resolver: tokenises paths, walks the tree entry-by-entry
//! from the root inode, chases symlinks, and yields the terminal
//! inode. Symlink-target arithmetic (`join_symlink_target`) is kept as
//! a pure string operation, decoupled from any image, so it can be
//! unit-tested on strings alone.

use crate::result::{Error, Result};

use alloc::boxed::Box;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use super::dir::{self, DirEntryKind, DirStream};
use super::inode::{self, Inode, InodeBody};
use super::table::{self, Table};
use super::{FileSystem, MAX_SYMLINK_DEPTH};

/// Splits a path on `/`, dropping empty components, so leading,
/// trailing, and repeated slashes collapse away. An empty path or
/// `"/"` tokenises to an empty list, which resolves to the root.
pub(crate) fn tokenize(path: &str) -> Vec<String> {
    path.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect()
}

fn join(tokens: &[String]) -> String {
    format!("/{}", tokens.join("/"))
}

fn load_inode_table(fs: &FileSystem) -> Result<Table> {
    table::load_table(
        fs.device(),
        fs.decompressor(),
        fs.superblock().inode_table_start,
        fs.superblock().directory_table_start,
    )
}

fn load_dir_table(fs: &FileSystem) -> Result<Table> {
    table::load_table(
        fs.device(),
        fs.decompressor(),
        fs.superblock().directory_table_start,
        fs.superblock().fragment_table_start,
    )
}

/// The directory-table cursor and listing span for a directory inode.
fn dir_cursor(dir_table: &Table, inode: &Inode) -> Result<(usize, u32)> {
    match &inode.body {
        InodeBody::Dir(d) => {
            let base = dir_table.positions.locate(d.start_block)? as usize;
            Ok((base + d.offset as usize, d.file_size as u32))
        }
        InodeBody::ExtDir(d) => {
            let base = dir_table.positions.locate(d.start_block)? as usize;
            Ok((base + d.offset as usize, d.file_size))
        }
        _ => Err(Error::NotADirectory),
    }
}

fn parent_inode_number(inode: &Inode) -> Result<u32> {
    match &inode.body {
        InodeBody::Dir(d) => Ok(d.parent_inode),
        InodeBody::ExtDir(d) => Ok(d.parent_inode),
        _ => Err(Error::NotADirectory),
    }
}

/// Resolves `path` against already-loaded tables, chasing symlinks by
/// recursing on the rewritten path (bounded by `MAX_SYMLINK_DEPTH` via
/// `depth`). Returns the terminal inode plus the token path actually
/// walked to reach it (the symlink-free form of `path`).
fn resolve_with_tables(
    inode_table: &Table,
    dir_table: &Table,
    block_size: u32,
    root_ref: u64,
    path: &str,
    depth: u32,
) -> Result<(Inode, Vec<String>)> {
    if depth > MAX_SYMLINK_DEPTH {
        return Err(Error::LoopDetected);
    }

    let tokens = tokenize(path);
    let mut current = inode::find_inode(
        &inode_table.bytes,
        &inode_table.positions,
        root_ref,
        block_size,
    )?;
    let mut consumed: Vec<String> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let t = &tokens[i];

        if t == ".." {
            if !current.is_dir() {
                return Err(Error::NotADirectory);
            }
            let parent_number = parent_inode_number(&current)?;
            current = inode::find_inode_by_number(
                &inode_table.bytes,
                parent_number,
                block_size,
            )?;
            consumed.pop();
            i += 1;
            continue;
        }

        if !current.is_dir() {
            return Err(Error::NotADirectory);
        }
        let (start_cursor, span) = dir_cursor(dir_table, &current)?;
        let (inode_ref, kind) =
            dir::find_entry(&dir_table.bytes, start_cursor, span, t)?
                .ok_or(Error::NotFound)?;
        let next = inode::find_inode(
            &inode_table.bytes,
            &inode_table.positions,
            inode_ref,
            block_size,
        )?;

        if kind == DirEntryKind::Symlink {
            consumed.push(t.clone());
            let target_text = match &next.body {
                InodeBody::Symlink(s) => {
                    String::from_utf8_lossy(&s.target).into_owned()
                }
                _ => return Err(Error::InvalidArgument),
            };
            let new_base = join_symlink_target(&consumed, &target_text);
            let tail = tokens[i + 1..].join("/");
            let rebuilt = if tail.is_empty() {
                new_base
            } else {
                format!("{}/{}", new_base, tail)
            };
            return resolve_with_tables(
                inode_table,
                dir_table,
                block_size,
                root_ref,
                &rebuilt,
                depth + 1,
            );
        }

        current = next;
        consumed.push(t.clone());
        i += 1;
    }

    Ok((current, consumed))
}

/// Resolves `path` to its terminal inode. Loads the inode and
/// directory tables once for the call.
pub(crate) fn resolve(
    fs: &FileSystem,
    path: &str,
    depth: u32,
) -> Result<(Inode, Vec<String>)> {
    let block_size = fs.block_size();
    let inode_table = load_inode_table(fs)?;
    let dir_table = load_dir_table(fs)?;
    resolve_with_tables(
        &inode_table,
        &dir_table,
        block_size,
        fs.superblock().root_inode_ref,
        path,
        depth,
    )
}

/// Resolves `path` and positions a directory stream at it. Fails with
/// `NotADirectory` if the terminal inode is not a directory.
pub(crate) fn open_dir(
    fs: &FileSystem,
    path: &str,
    depth: u32,
) -> Result<Box<DirStream>> {
    let block_size = fs.block_size();
    let inode_table = load_inode_table(fs)?;
    let dir_table = load_dir_table(fs)?;
    let (inode, _) = resolve_with_tables(
        &inode_table,
        &dir_table,
        block_size,
        fs.superblock().root_inode_ref,
        path,
        depth,
    )?;
    if !inode.is_dir() {
        return Err(Error::NotADirectory);
    }
    let (start_cursor, span) = dir_cursor(&dir_table, &inode)?;
    Ok(Box::new(DirStream::new(
        inode_table,
        dir_table,
        block_size,
        start_cursor,
        span,
    )))
}

/// Joins a symlink's stored target `target` onto the tokens of its own
/// path `base` (the last element of `base` is the symlink's own name).
///
/// Default behaviour applies `..` components positionally, left to
/// right, matching POSIX: each `..` pops whatever is on the stack at
/// the point it is encountered while scanning `target`.
///
/// With the `bugcompat-symlink` feature, this instead reproduces the
/// legacy reference reader's arithmetic: it counts `..` occurrences
/// *anywhere* in `target` (not just a leading run) and drops that many
/// tokens, plus the symlink's own name, from the front of `base`,
/// before appending every non-`..` token of `target` in order. See the
/// symlink Open Question decision in DESIGN.md.
pub(crate) fn join_symlink_target(base: &[String], target: &str) -> String {
    let target_tokens = tokenize(target);

    #[cfg(feature = "bugcompat-symlink")]
    {
        let updirs =
            target_tokens.iter().filter(|t| t.as_str() == "..").count();
        let drop = (updirs + 1).min(base.len());
        let mut stack: Vec<String> = base[..base.len() - drop].to_vec();
        for t in target_tokens.iter().filter(|t| t.as_str() != "..") {
            stack.push(t.clone());
        }
        join(&stack)
    }

    #[cfg(not(feature = "bugcompat-symlink"))]
    {
        let is_absolute = target.starts_with('/');
        let mut stack: Vec<String> = if is_absolute {
            Vec::new()
        } else {
            let mut b = base.to_vec();
            b.pop();
            b
        };
        for t in &target_tokens {
            if t == ".." {
                stack.pop();
            } else if t != "." {
                stack.push(t.clone());
            }
        }
        join(&stack)
    }
}
