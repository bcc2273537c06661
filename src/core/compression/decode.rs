//! Decoding side of both LZ4 strategies
//!
//! Each function reads `[src_offset, end)` of the input stream, writes the
//! plain bytes at `dest_offset` onward and returns `(packed, unpacked)`
//! byte counts. `src_offset` may point at the format magic or just past it.

use crate::error::{PackageError, Result};
use crate::io::{read_full, PkgStream, StreamReader};
use crate::params::{read_magic, BLOCK_LEN_PREFIX, LZ4_BLOCK_MAGIC, LZ4_FRAME_MAGIC, MAGIC_LEN, MAX_BLOCK_SIZE};
use std::io::Read;
use tracing::debug;

const COPY_CHUNK: usize = 64 * 1024;

/// Whether `[src_offset, end)` starts with `magic`
fn starts_with_magic(input: &mut dyn PkgStream, src_offset: u64, end: u64, magic: u32) -> Result<bool> {
    if end.saturating_sub(src_offset) < MAGIC_LEN as u64 {
        return Ok(false);
    }
    let mut head = [0u8; MAGIC_LEN];
    let n = read_full(input, &mut head, src_offset)?;
    Ok(n == MAGIC_LEN && read_magic(&head) == Some(magic))
}

fn write_out(output: &mut dyn PkgStream, data: &[u8], offset: u64) -> Result<()> {
    output
        .write(data, offset)
        .map_err(|source| PackageError::IoWriteFailed { offset, source })
}

/// Decode an LZ4 frame
pub fn unpack_frame(
    input: &mut dyn PkgStream,
    src_offset: u64,
    end: u64,
    output: &mut dyn PkgStream,
    dest_offset: u64,
) -> Result<(u64, u64)> {
    let has_magic = starts_with_magic(input, src_offset, end, LZ4_FRAME_MAGIC)?;
    let magic = LZ4_FRAME_MAGIC.to_le_bytes();
    let prefix: &[u8] = if has_magic { &[] } else { &magic };

    let reader = StreamReader::new(input, src_offset, end);
    let mut decoder = lz4_flex::frame::FrameDecoder::new(prefix.chain(reader));

    let mut chunk = vec![0u8; COPY_CHUNK];
    let mut written = 0u64;
    loop {
        let n = decoder
            .read(&mut chunk)
            .map_err(|e| PackageError::DecompressFailed(e.to_string()))?;
        if n == 0 {
            break;
        }
        write_out(output, &chunk[..n], dest_offset + written)?;
        written += n as u64;
    }

    let consumed = decoder.into_inner().into_inner().1.position() - src_offset;
    debug!(packed = consumed, unpacked = written, "frame decoded");
    Ok((consumed, written))
}

/// Decode a raw-block stream
pub fn unpack_blocks(
    input: &mut dyn PkgStream,
    src_offset: u64,
    end: u64,
    output: &mut dyn PkgStream,
    dest_offset: u64,
) -> Result<(u64, u64)> {
    let mut pos = src_offset;
    if starts_with_magic(input, src_offset, end, LZ4_BLOCK_MAGIC)? {
        pos += MAGIC_LEN as u64;
    }

    let max_record = lz4_flex::block::get_maximum_output_size(MAX_BLOCK_SIZE);
    let mut record = Vec::new();
    let mut plain = vec![0u8; MAX_BLOCK_SIZE];
    let mut written = 0u64;
    let mut blocks = 0usize;

    while end.saturating_sub(pos) >= BLOCK_LEN_PREFIX as u64 {
        let mut prefix = [0u8; BLOCK_LEN_PREFIX];
        if read_full(input, &mut prefix, pos)? < BLOCK_LEN_PREFIX {
            break;
        }
        let len = u32::from_le_bytes(prefix) as usize;
        if len == 0 || len > max_record {
            return Err(PackageError::DecompressFailed(format!(
                "invalid block length {} at offset {}",
                len, pos
            )));
        }
        pos += BLOCK_LEN_PREFIX as u64;

        record.resize(len, 0);
        if read_full(input, &mut record, pos)? < len {
            return Err(PackageError::DecompressFailed(format!(
                "truncated block at offset {}",
                pos
            )));
        }
        pos += len as u64;

        let n = lz4_flex::block::decompress_into(&record, &mut plain)
            .map_err(|e| PackageError::DecompressFailed(e.to_string()))?;
        write_out(output, &plain[..n], dest_offset + written)?;
        written += n as u64;
        blocks += 1;
    }

    debug!(blocks, packed = pos - src_offset, unpacked = written, "blocks decoded");
    Ok((pos - src_offset, written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStream;

    #[test]
    fn test_block_stream_without_magic() {
        let plain = b"record one, record one";
        let compressed = lz4_flex::block::compress(plain);

        let mut bytes = LZ4_BLOCK_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&compressed);
        let end = bytes.len() as u64;
        let mut input = MemoryStream::from_bytes("in", bytes);

        // Load path: data offset points past the magic
        let mut out = MemoryStream::new("out");
        let (packed, unpacked) = unpack_blocks(&mut input, 4, end, &mut out, 0).unwrap();
        assert_eq!(packed, end - 4);
        assert_eq!(unpacked, plain.len() as u64);
        assert_eq!(out.as_bytes(), plain);
    }

    #[test]
    fn test_zero_length_record_rejected() {
        let mut bytes = LZ4_BLOCK_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0u32.to_le_bytes());
        let end = bytes.len() as u64;
        let mut input = MemoryStream::from_bytes("in", bytes);
        let mut out = MemoryStream::new("out");
        assert!(matches!(
            unpack_blocks(&mut input, 0, end, &mut out, 0),
            Err(PackageError::DecompressFailed(_))
        ));
    }

    #[test]
    fn test_truncated_record_rejected() {
        let mut bytes = LZ4_BLOCK_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&100u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 10]);
        let end = bytes.len() as u64;
        let mut input = MemoryStream::from_bytes("in", bytes);
        let mut out = MemoryStream::new("out");
        assert!(unpack_blocks(&mut input, 0, end, &mut out, 0).is_err());
    }

    #[test]
    fn test_frame_past_magic() {
        let plain = b"frame payload frame payload frame payload".repeat(10);
        let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::new());
        std::io::Write::write_all(&mut encoder, &plain).unwrap();
        let bytes = encoder.finish().unwrap();
        let end = bytes.len() as u64;
        let mut input = MemoryStream::from_bytes("in", bytes);

        let mut out = MemoryStream::new("out");
        let (packed, unpacked) = unpack_frame(&mut input, 4, end, &mut out, 0).unwrap();
        assert_eq!(packed, end - 4);
        assert_eq!(unpacked, plain.len() as u64);
        assert_eq!(out.as_bytes(), plain.as_slice());
    }

    #[test]
    fn test_garbage_frame_fails() {
        let mut input = MemoryStream::from_bytes("in", vec![0x5Au8; 32]);
        let mut out = MemoryStream::new("out");
        assert!(matches!(
            unpack_frame(&mut input, 0, 32, &mut out, 0),
            Err(PackageError::DecompressFailed(_))
        ));
    }
}
