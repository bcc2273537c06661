//! Raw-block strategy
//!
//! Wire layout: `[u32 magic]` then zero or more `[u32 length][length bytes]`
//! records, each an independently decodable LZ4 block. No footer.

use super::buffer::BlockBuffer;
use crate::error::{PackageError, Result};
use crate::io::PkgStream;
use crate::params::{Lz4Params, BLOCK_LEN_PREFIX, LZ4_BLOCK_MAGIC, MAGIC_LEN};
use lz4::block::CompressionMode;
use tracing::debug;

/// Streaming compressor writing length-prefixed raw LZ4 blocks
pub struct BlockAdapter<'a> {
    sink: &'a mut dyn PkgStream,
    offset: u64,
    params: Lz4Params,
    block_size: usize,
    input: Option<BlockBuffer>,
    output: Vec<u8>,
}

impl<'a> BlockAdapter<'a> {
    /// Adapter writing to `sink` starting at `offset`
    pub fn new(sink: &'a mut dyn PkgStream, offset: u64, params: Lz4Params, block_cap: usize) -> Self {
        BlockAdapter {
            sink,
            offset,
            params,
            block_size: params.block_size(block_cap),
            input: None,
            output: Vec::new(),
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_open(&self) -> bool {
        self.input.is_some()
    }

    /// Effective block size
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Size the buffers and write the magic
    pub fn open(&mut self) -> Result<()> {
        if self.is_open() {
            debug!(sink = self.sink.name(), "block adapter already open");
            return Ok(());
        }

        if self.block_size == 0 {
            return Err(PackageError::BufferSizeInvalid(0));
        }
        let bound = lz4::block::compress_bound(self.block_size)
            .map_err(|_| PackageError::BufferSizeInvalid(self.block_size))?;
        if bound == 0 {
            return Err(PackageError::BufferSizeInvalid(self.block_size));
        }

        let magic = LZ4_BLOCK_MAGIC.to_le_bytes();
        self.sink
            .write(&magic, self.offset)
            .map_err(|source| PackageError::IoWriteFailed {
                offset: self.offset,
                source,
            })?;
        self.offset += MAGIC_LEN as u64;

        self.output = vec![0u8; BLOCK_LEN_PREFIX + bound];
        self.input = Some(BlockBuffer::new(self.block_size));
        debug!(
            sink = self.sink.name(),
            block_size = self.block_size,
            level = self.params.compression_level(),
            "block adapter opened"
        );
        Ok(())
    }

    /// Buffer `block`, compressing every full block it completes
    pub fn write_data(&mut self, block: &[u8]) -> Result<()> {
        let input = self.input.as_mut().ok_or_else(not_open)?;
        let (sink, offset, output, params) =
            (&mut *self.sink, &mut self.offset, &mut self.output, &self.params);
        input.feed(block, |chunk| {
            compress_block(sink, offset, output, params, chunk)
        })
    }

    /// Compress the buffered remainder and return the final offset
    pub fn flush_data(&mut self) -> Result<u64> {
        let input = self.input.as_mut().ok_or_else(not_open)?;
        let (sink, offset, output, params) =
            (&mut *self.sink, &mut self.offset, &mut self.output, &self.params);
        input.drain(|chunk| compress_block(sink, offset, output, params, chunk))?;
        Ok(self.offset)
    }

    pub fn close(&mut self) -> Result<()> {
        if self.input.take().is_none() {
            debug!(sink = self.sink.name(), "block adapter already closed");
        }
        Ok(())
    }
}

fn not_open() -> PackageError {
    PackageError::CompressFailed("block adapter is not open".to_string())
}

/// Compress one block into `output` behind a length prefix and write the record
fn compress_block(
    sink: &mut dyn PkgStream,
    offset: &mut u64,
    output: &mut [u8],
    params: &Lz4Params,
    data: &[u8],
) -> Result<()> {
    let mode = if params.uses_hc() {
        CompressionMode::HIGHCOMPRESSION(params.compression_level())
    } else {
        CompressionMode::DEFAULT
    };

    let compressed = lz4::block::compress_to_buffer(
        data,
        Some(mode),
        false,
        &mut output[BLOCK_LEN_PREFIX..],
    )
    .map_err(|e| PackageError::CompressFailed(e.to_string()))?;
    if compressed == 0 {
        return Err(PackageError::CompressFailed(format!(
            "empty output for {} byte block",
            data.len()
        )));
    }

    let len = u32::try_from(compressed)
        .map_err(|_| PackageError::CompressFailed(format!("block too large: {}", compressed)))?;
    output[..BLOCK_LEN_PREFIX].copy_from_slice(&len.to_le_bytes());

    let record = &output[..BLOCK_LEN_PREFIX + compressed];
    sink.write(record, *offset)
        .map_err(|source| PackageError::IoWriteFailed {
            offset: *offset,
            source,
        })?;
    *offset += record.len() as u64;
    Ok(())
}
