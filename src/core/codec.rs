//! Codec selection boundary
//!
//! Entries never construct a codec themselves: they ask a [`CodecSelector`]
//! for the [`Codec`] that handles their pack method and hand it an
//! [`AlgorithmContext`] describing where to read, where to write and
//! what was produced.

use crate::compression::{self, Lz4Adapter};
use crate::config::PackageConfig;
use crate::error::{PackageError, Result};
use crate::io::PkgStream;
use crate::params::{DigestMethod, EntryInfo, Lz4Params, PackMethod};
use tracing::debug;

/// Offsets in, sizes out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlgorithmContext {
    /// Where reading starts in the input stream
    pub src_offset: u64,
    /// Where writing starts in the output stream
    pub dest_offset: u64,
    /// Compressed bytes; an upper bound going into unpack, the exact count coming out
    pub packed_size: u64,
    pub unpacked_size: u64,
    pub crc: u32,
    pub digest_method: DigestMethod,
}

/// One compression algorithm
pub trait Codec {
    /// Compress `input` from `ctx.src_offset` to end into `output` at `ctx.dest_offset`
    fn pack(
        &self,
        input: &mut dyn PkgStream,
        output: &mut dyn PkgStream,
        ctx: &mut AlgorithmContext,
    ) -> Result<()>;

    /// Decompress `input` from `ctx.src_offset` into `output` at `ctx.dest_offset`
    fn unpack(
        &self,
        input: &mut dyn PkgStream,
        output: &mut dyn PkgStream,
        ctx: &mut AlgorithmContext,
    ) -> Result<()>;

    /// Fill in entry fields only known after decoding
    fn update_file_info(&self, _info: &mut EntryInfo) {}
}

/// Maps a pack method to its codec
pub trait CodecSelector {
    fn resolve(
        &self,
        method: PackMethod,
        digest_method: DigestMethod,
        params: &Lz4Params,
    ) -> Option<Box<dyn Codec>>;
}

/// Selector for the two LZ4 strategies
#[derive(Debug, Clone)]
pub struct Lz4CodecSelector {
    block_cap: usize,
    read_chunk: usize,
}

impl Lz4CodecSelector {
    pub fn new(config: &PackageConfig) -> Self {
        Lz4CodecSelector {
            block_cap: config.block_size_cap,
            read_chunk: config.read_chunk_size.max(1),
        }
    }
}

impl Default for Lz4CodecSelector {
    fn default() -> Self {
        Self::new(&PackageConfig::default())
    }
}

impl CodecSelector for Lz4CodecSelector {
    fn resolve(
        &self,
        method: PackMethod,
        _digest_method: DigestMethod,
        params: &Lz4Params,
    ) -> Option<Box<dyn Codec>> {
        Some(Box::new(Lz4Codec {
            method,
            params: *params,
            block_cap: self.block_cap,
            read_chunk: self.read_chunk,
        }))
    }
}

/// Streams input through an [`Lz4Adapter`] on pack, decodes on unpack
#[derive(Debug, Clone)]
pub struct Lz4Codec {
    method: PackMethod,
    params: Lz4Params,
    block_cap: usize,
    read_chunk: usize,
}

impl Codec for Lz4Codec {
    fn pack(
        &self,
        input: &mut dyn PkgStream,
        output: &mut dyn PkgStream,
        ctx: &mut AlgorithmContext,
    ) -> Result<()> {
        let mut adapter = Lz4Adapter::new(
            self.method,
            output,
            ctx.dest_offset,
            self.params,
            self.block_cap,
        );
        adapter.open()?;

        let mut chunk = vec![0u8; self.read_chunk];
        let mut pos = ctx.src_offset;
        loop {
            let n = input
                .read(&mut chunk, pos)
                .map_err(|source| PackageError::IoReadFailed {
                    offset: pos,
                    source,
                })?;
            if n == 0 {
                break;
            }
            adapter.write_data(&chunk[..n])?;
            pos += n as u64;
        }

        let end = adapter.flush_data()?;
        adapter.close()?;

        ctx.packed_size = end - ctx.dest_offset;
        ctx.unpacked_size = pos - ctx.src_offset;
        debug!(
            method = ?self.method,
            packed = ctx.packed_size,
            unpacked = ctx.unpacked_size,
            "packed"
        );
        Ok(())
    }

    fn unpack(
        &self,
        input: &mut dyn PkgStream,
        output: &mut dyn PkgStream,
        ctx: &mut AlgorithmContext,
    ) -> Result<()> {
        let len = input.length()?;
        let end = if ctx.packed_size > 0 {
            len.min(ctx.src_offset.saturating_add(ctx.packed_size))
        } else {
            len
        };

        let (packed, unpacked) =
            compression::unpack(self.method, input, ctx.src_offset, end, output, ctx.dest_offset)?;
        ctx.packed_size = packed;
        ctx.unpacked_size = unpacked;
        Ok(())
    }

    fn update_file_info(&self, info: &mut EntryInfo) {
        info.pack_method = Some(self.method);
        info.digest_method = DigestMethod::None;
    }
}
