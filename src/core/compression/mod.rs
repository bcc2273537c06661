//! Streaming LZ4 compression over a package stream
//!
//! Two strategies share one contract: [`FrameAdapter`] emits a standard
//! LZ4 frame, [`BlockAdapter`] emits a magic followed by independently
//! compressed, length-prefixed blocks. [`Lz4Adapter`] picks one by
//! [`PackMethod`] when it is built and keeps it for its whole life.
//!
//! Every adapter starts at a caller-supplied base offset and advances it
//! by exactly the bytes it writes. Data handed to `write_data` is only
//! borrowed for the duration of the call.
//!
//! ```text
//! Frame:  [frame header][block]...[end mark][checksum?]
//! Block:  [0x184C2102][len][lz4 block][len][lz4 block]...
//! ```

mod block;
mod buffer;
pub mod decode;
mod frame;

pub use block::BlockAdapter;
pub use decode::{unpack_blocks, unpack_frame};
pub use frame::FrameAdapter;

use crate::error::Result;
use crate::io::PkgStream;
use crate::params::{Lz4Params, PackMethod};

/// Compression adapter selected by pack method
pub enum Lz4Adapter<'a> {
    Frame(FrameAdapter<'a>),
    Block(BlockAdapter<'a>),
}

impl<'a> Lz4Adapter<'a> {
    /// Build the adapter for `method`, writing to `sink` from `offset`
    pub fn new(
        method: PackMethod,
        sink: &'a mut dyn PkgStream,
        offset: u64,
        params: Lz4Params,
        block_cap: usize,
    ) -> Self {
        match method {
            PackMethod::Lz4Frame => {
                Lz4Adapter::Frame(FrameAdapter::new(sink, offset, params, block_cap))
            }
            PackMethod::Lz4Block => {
                Lz4Adapter::Block(BlockAdapter::new(sink, offset, params, block_cap))
            }
        }
    }

    pub fn method(&self) -> PackMethod {
        match self {
            Lz4Adapter::Frame(_) => PackMethod::Lz4Frame,
            Lz4Adapter::Block(_) => PackMethod::Lz4Block,
        }
    }

    /// Current absolute write offset
    pub fn offset(&self) -> u64 {
        match self {
            Lz4Adapter::Frame(a) => a.offset(),
            Lz4Adapter::Block(a) => a.offset(),
        }
    }

    pub fn open(&mut self) -> Result<()> {
        match self {
            Lz4Adapter::Frame(a) => a.open(),
            Lz4Adapter::Block(a) => a.open(),
        }
    }

    pub fn write_data(&mut self, block: &[u8]) -> Result<()> {
        match self {
            Lz4Adapter::Frame(a) => a.write_data(block),
            Lz4Adapter::Block(a) => a.write_data(block),
        }
    }

    /// Drain buffered data, write any footer, return the final offset
    pub fn flush_data(&mut self) -> Result<u64> {
        match self {
            Lz4Adapter::Frame(a) => a.flush_data(),
            Lz4Adapter::Block(a) => a.flush_data(),
        }
    }

    pub fn close(&mut self) -> Result<()> {
        match self {
            Lz4Adapter::Frame(a) => a.close(),
            Lz4Adapter::Block(a) => a.close(),
        }
    }
}

/// Decode `[src_offset, end)` of `input` with the decoder for `method`
pub fn unpack(
    method: PackMethod,
    input: &mut dyn PkgStream,
    src_offset: u64,
    end: u64,
    output: &mut dyn PkgStream,
    dest_offset: u64,
) -> Result<(u64, u64)> {
    match method {
        PackMethod::Lz4Frame => unpack_frame(input, src_offset, end, output, dest_offset),
        PackMethod::Lz4Block => unpack_blocks(input, src_offset, end, output, dest_offset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PackageError;
    use crate::io::MemoryStream;
    use crate::testing::FailingStream;

    #[test]
    fn test_adapter_reports_method() {
        let mut sink = MemoryStream::new("out");
        let adapter = Lz4Adapter::new(PackMethod::Lz4Block, &mut sink, 0, Lz4Params::default(), 64);
        assert_eq!(adapter.method(), PackMethod::Lz4Block);
    }

    #[test]
    fn test_round_trip_across_block_boundaries() {
        for method in [PackMethod::Lz4Frame, PackMethod::Lz4Block] {
            for len in [0usize, 1, 15, 16, 17, 100] {
                let data: Vec<u8> = (0..len).map(|i| (i * 7 % 13) as u8).collect();
                let mut sink = MemoryStream::new("out");
                let end = {
                    let params = Lz4Params::default().block_size_id(0);
                    let mut adapter = Lz4Adapter::new(method, &mut sink, 0, params, 16);
                    adapter.open().unwrap();
                    adapter.write_data(&data).unwrap();
                    let end = adapter.flush_data().unwrap();
                    adapter.close().unwrap();
                    end
                };

                let mut out = MemoryStream::new("plain");
                let (_, unpacked) = unpack(method, &mut sink, 0, end, &mut out, 0).unwrap();
                assert_eq!(unpacked, len as u64, "{:?} len {}", method, len);
                assert_eq!(out.as_bytes(), data.as_slice(), "{:?} len {}", method, len);
            }
        }
    }

    #[test]
    fn test_block_write_failure_keeps_offset() {
        // magic + first record
        let mut sink = FailingStream::new(2);
        let mut adapter = BlockAdapter::new(&mut sink, 0, Lz4Params::default(), 8);
        adapter.open().unwrap();
        adapter.write_data(b"01234567").unwrap();
        let before = adapter.offset();

        let result = adapter.write_data(b"89abcdef");
        assert!(matches!(result, Err(PackageError::IoWriteFailed { .. })));
        assert_eq!(adapter.offset(), before);
    }

    #[test]
    fn test_block_open_failure_keeps_offset() {
        let mut sink = FailingStream::new(0);
        let mut adapter = BlockAdapter::new(&mut sink, 42, Lz4Params::default(), 8);
        assert!(matches!(
            adapter.open(),
            Err(PackageError::IoWriteFailed { offset: 42, .. })
        ));
        assert_eq!(adapter.offset(), 42);
        assert!(!adapter.is_open());
    }

    #[test]
    fn test_frame_write_failure_is_io_error() {
        // frame header only
        let mut sink = FailingStream::new(1);
        let mut adapter = FrameAdapter::new(&mut sink, 0, Lz4Params::default(), 64);
        adapter.open().unwrap();
        let header_end = adapter.offset();

        // Auto-flush is off, so the failure may surface on write or on flush
        let result = adapter
            .write_data(&[0xAB; 1000])
            .and_then(|_| adapter.flush_data());
        assert!(matches!(result, Err(PackageError::IoWriteFailed { .. })));
        assert_eq!(adapter.offset(), header_end);
    }
}
