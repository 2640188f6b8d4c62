// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The metadata stream decoder.
//!
//! A metadata stream is a chain of self-delimiting chunks: a 16-bit
//! header followed by `stored_len` bytes of payload, which is either
//! compressed or stored verbatim. Decompressed, each chunk is at most
//! [`super::METADATA_CHUNK_SIZE`] bytes. This module has no notion of
//! "the inode table" or "the directory table"; it operates purely on
//! a caller-provided byte slice that covers at least one chunk.

use crate::decompress::Decompressor;
use crate::leview::read_u16;
use crate::result::{Error, Result};

use super::METADATA_CHUNK_SIZE;

/// Header of one metadata chunk: whether its payload is compressed,
/// and the payload's stored (on-disk) length.
pub(crate) struct ChunkHeader {
    pub(crate) compressed: bool,
    pub(crate) stored_len: usize,
}

/// Parses the 2-byte chunk header at `buf[offset..]`.
pub(crate) fn read_chunk_header(
    buf: &[u8],
    offset: usize,
) -> Result<ChunkHeader> {
    if offset + 2 > buf.len() {
        return Err(Error::InvalidArgument);
    }
    let raw = read_u16(buf, offset);
    let stored_len = (raw & 0x7fff) as usize;
    let compressed = raw & 0x8000 == 0;
    if offset + 2 + stored_len > buf.len() {
        return Err(Error::InvalidArgument);
    }
    Ok(ChunkHeader { compressed, stored_len })
}

/// Decodes the chunk at `buf[offset..]` into `scratch_out`.
///
/// Returns the number of decoded bytes written to `scratch_out`. The
/// caller passes a scratch buffer of at least `METADATA_CHUNK_SIZE`
/// bytes; this function never writes more than that, regardless of
/// what a hostile `stored_len` claims.
pub(crate) fn decode_chunk(
    buf: &[u8],
    offset: usize,
    decompressor: &dyn Decompressor,
    scratch_out: &mut [u8],
) -> Result<usize> {
    let header = read_chunk_header(buf, offset)?;
    let payload = &buf[offset + 2..offset + 2 + header.stored_len];
    if header.compressed {
        let out_cap = scratch_out.len().min(METADATA_CHUNK_SIZE);
        decompressor.decompress(payload, &mut scratch_out[..out_cap])
    } else {
        if payload.len() > scratch_out.len() {
            return Err(Error::InvalidArgument);
        }
        scratch_out[..payload.len()].copy_from_slice(payload);
        Ok(payload.len())
    }
}

/// Total on-disk bytes (header + payload) consumed by the chunk at
/// `buf[offset..]`.
pub(crate) fn chunk_span(buf: &[u8], offset: usize) -> Result<usize> {
    Ok(2 + read_chunk_header(buf, offset)?.stored_len)
}
