//! Fill-then-flush block buffering shared by both adapters

use crate::error::Result;

/// Accumulates caller data into fixed-size blocks
///
/// `fill` only moves once the step that consumes the buffered bytes has
/// succeeded, so a failed compress leaves the buffer as it was.
#[derive(Debug)]
pub(crate) struct BlockBuffer {
    data: Vec<u8>,
    fill: usize,
}

impl BlockBuffer {
    pub(crate) fn new(block_size: usize) -> Self {
        BlockBuffer {
            data: vec![0u8; block_size],
            fill: 0,
        }
    }

    pub(crate) fn block_size(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn fill(&self) -> usize {
        self.fill
    }

    /// Buffer `input`, handing every completed block to `compress`.
    ///
    /// Whole blocks in `input` are passed straight through without a copy;
    /// a trailing partial block stays buffered.
    pub(crate) fn feed<F>(&mut self, mut input: &[u8], mut compress: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        let block_size = self.data.len();
        if self.fill + input.len() < block_size {
            self.data[self.fill..self.fill + input.len()].copy_from_slice(input);
            self.fill += input.len();
            return Ok(());
        }

        if self.fill > 0 {
            let take = block_size - self.fill;
            self.data[self.fill..].copy_from_slice(&input[..take]);
            compress(&self.data)?;
            self.fill = 0;
            input = &input[take..];
        }

        let mut blocks = input.chunks_exact(block_size);
        for block in &mut blocks {
            compress(block)?;
        }

        let tail = blocks.remainder();
        self.data[..tail.len()].copy_from_slice(tail);
        self.fill = tail.len();
        Ok(())
    }

    /// Hand any buffered remainder to `compress`
    pub(crate) fn drain<F>(&mut self, mut compress: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        if self.fill > 0 {
            compress(&self.data[..self.fill])?;
            self.fill = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PackageError;

    fn collect(buffer: &mut BlockBuffer, input: &[u8], seen: &mut Vec<Vec<u8>>) {
        buffer
            .feed(input, |block| {
                seen.push(block.to_vec());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_short_input_is_buffered() {
        let mut buffer = BlockBuffer::new(8);
        let mut seen = Vec::new();
        collect(&mut buffer, b"abc", &mut seen);
        collect(&mut buffer, b"defg", &mut seen);
        assert!(seen.is_empty());
        assert_eq!(buffer.fill(), 7);
    }

    #[test]
    fn test_exact_fill_compresses_once() {
        let mut buffer = BlockBuffer::new(8);
        let mut seen = Vec::new();
        collect(&mut buffer, b"abc", &mut seen);
        collect(&mut buffer, b"defgh", &mut seen);
        assert_eq!(seen, vec![b"abcdefgh".to_vec()]);
        assert_eq!(buffer.fill(), 0);
    }

    #[test]
    fn test_spanning_input_splits_into_blocks() {
        let mut buffer = BlockBuffer::new(4);
        let mut seen = Vec::new();
        collect(&mut buffer, b"ab", &mut seen);
        collect(&mut buffer, b"cdefghijk", &mut seen);
        assert_eq!(seen, vec![b"abcd".to_vec(), b"efgh".to_vec()]);
        assert_eq!(buffer.fill(), 3);

        buffer
            .drain(|block| {
                seen.push(block.to_vec());
                Ok(())
            })
            .unwrap();
        assert_eq!(seen.last().unwrap(), b"ijk");
        assert_eq!(buffer.fill(), 0);
    }

    #[test]
    fn test_failed_compress_keeps_fill() {
        let mut buffer = BlockBuffer::new(4);
        let mut seen = Vec::new();
        collect(&mut buffer, b"ab", &mut seen);

        let result = buffer.feed(b"cdef", |_| Err(PackageError::CompressFailed("boom".into())));
        assert!(matches!(result, Err(PackageError::CompressFailed(_))));
        assert_eq!(buffer.fill(), 2);
    }

    #[test]
    fn test_drain_empty_is_noop() {
        let mut buffer = BlockBuffer::new(4);
        let mut called = false;
        buffer
            .drain(|_| {
                called = true;
                Ok(())
            })
            .unwrap();
        assert!(!called);
    }
}
