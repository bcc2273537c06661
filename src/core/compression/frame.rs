//! LZ4 frame strategy
//!
//! Drives liblz4's frame encoder: begin-frame on open, compress-update per
//! buffered block, end-frame on flush. Frame preferences come straight
//! from [`Lz4Params`].

use super::buffer::BlockBuffer;
use crate::error::{PackageError, Result};
use crate::io::PkgStream;
use crate::params::Lz4Params;
use lz4::{BlockMode, BlockSize, ContentChecksum, Encoder, EncoderBuilder};
use std::io::{self, Write};
use tracing::debug;

/// `io::Write` over a stream at an advancing offset
///
/// Remembers whether the last failure came from the stream so encoder
/// errors can be told apart from write errors.
struct SinkWriter<'a> {
    sink: &'a mut dyn PkgStream,
    offset: u64,
    write_failed: bool,
}

impl Write for SinkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Err(e) = self.sink.write(buf, self.offset) {
            self.write_failed = true;
            return Err(e);
        }
        self.offset += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

enum FrameState<'a> {
    /// Not opened yet
    Ready(SinkWriter<'a>),
    /// Frame header written, context live
    Open(Encoder<SinkWriter<'a>>),
    /// Footer written, context consumed
    Finished(SinkWriter<'a>),
    Closed,
}

/// Streaming LZ4 frame compressor
pub struct FrameAdapter<'a> {
    state: FrameState<'a>,
    offset: u64,
    params: Lz4Params,
    input: BlockBuffer,
    sink_name: String,
}

/// Frame block size for a block size id; ids outside 4..=7 use the library default
fn frame_block_size(id: u8) -> BlockSize {
    match id {
        4 => BlockSize::Max64KB,
        5 => BlockSize::Max256KB,
        6 => BlockSize::Max1MB,
        7 => BlockSize::Max4MB,
        _ => BlockSize::Default,
    }
}

impl<'a> FrameAdapter<'a> {
    /// Adapter writing to `sink` starting at `offset`
    pub fn new(sink: &'a mut dyn PkgStream, offset: u64, params: Lz4Params, block_cap: usize) -> Self {
        let sink_name = sink.name().to_string();
        FrameAdapter {
            state: FrameState::Ready(SinkWriter {
                sink,
                offset,
                write_failed: false,
            }),
            offset,
            params,
            input: BlockBuffer::new(params.block_size(block_cap)),
            sink_name,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, FrameState::Open(_) | FrameState::Finished(_))
    }

    /// Effective block size
    pub fn block_size(&self) -> usize {
        self.input.block_size()
    }

    fn builder(&self) -> EncoderBuilder {
        let mut builder = EncoderBuilder::new();
        builder
            .level(self.params.compression_level() as u32)
            .block_size(frame_block_size(self.params.block_size_id))
            .block_mode(if self.params.block_independence {
                BlockMode::Independent
            } else {
                BlockMode::Linked
            })
            .checksum(if self.params.content_checksum {
                ContentChecksum::ChecksumEnabled
            } else {
                ContentChecksum::NoChecksum
            })
            .auto_flush(self.params.auto_flush);
        builder
    }

    /// Create the compression context and write the frame header
    pub fn open(&mut self) -> Result<()> {
        match self.state {
            FrameState::Ready(_) => {}
            FrameState::Open(_) | FrameState::Finished(_) => {
                debug!(sink = %self.sink_name, "frame adapter already open");
                return Ok(());
            }
            FrameState::Closed => return Err(not_open()),
        }

        // The encoder sizes its own output buffer from the frame bound; only
        // the input staging buffer is ours.
        if self.block_size() == 0 {
            return Err(PackageError::BufferSizeInvalid(0));
        }

        let builder = self.builder();
        let FrameState::Ready(writer) = std::mem::replace(&mut self.state, FrameState::Closed)
        else {
            return Err(not_open());
        };
        let offset = writer.offset;
        match builder.build(writer) {
            Ok(encoder) => {
                self.offset = encoder.writer().offset;
                debug!(
                    sink = %self.sink_name,
                    header_len = self.offset - offset,
                    level = self.params.compression_level(),
                    "frame adapter opened"
                );
                self.state = FrameState::Open(encoder);
                Ok(())
            }
            Err(e) => Err(PackageError::CompressFailed(format!(
                "frame begin failed at offset {}: {}",
                offset, e
            ))),
        }
    }

    /// Buffer `block`, compressing every full block it completes
    pub fn write_data(&mut self, block: &[u8]) -> Result<()> {
        let FrameState::Open(encoder) = &mut self.state else {
            return Err(not_open());
        };
        let offset = &mut self.offset;
        self.input
            .feed(block, |chunk| compress_block(encoder, offset, chunk))
    }

    /// Compress the buffered remainder, write the frame footer and return the final offset
    pub fn flush_data(&mut self) -> Result<u64> {
        {
            let FrameState::Open(encoder) = &mut self.state else {
                return Err(not_open());
            };
            let offset = &mut self.offset;
            self.input
                .drain(|chunk| compress_block(encoder, offset, chunk))?;
        }

        let FrameState::Open(encoder) = std::mem::replace(&mut self.state, FrameState::Closed)
        else {
            return Err(not_open());
        };
        let (mut writer, result) = encoder.finish();
        let write_failed = std::mem::take(&mut writer.write_failed);
        let end = writer.offset;
        self.state = FrameState::Finished(writer);
        if let Err(e) = result {
            return Err(if write_failed {
                PackageError::IoWriteFailed {
                    offset: self.offset,
                    source: e,
                }
            } else {
                PackageError::CompressFailed(format!("frame end failed: {}", e))
            });
        }

        self.offset = end;
        Ok(self.offset)
    }

    /// Release the compression context
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, FrameState::Closed) {
            FrameState::Open(_) | FrameState::Finished(_) => {}
            FrameState::Ready(writer) => {
                debug!(sink = %self.sink_name, "frame adapter was never opened");
                self.state = FrameState::Ready(writer);
            }
            FrameState::Closed => {
                debug!(sink = %self.sink_name, "frame adapter already closed");
            }
        }
        Ok(())
    }
}

fn not_open() -> PackageError {
    PackageError::CompressFailed("frame adapter is not open".to_string())
}

/// Feed one block through compress-update; the encoder writes whatever it produced
fn compress_block(
    encoder: &mut Encoder<SinkWriter<'_>>,
    offset: &mut u64,
    data: &[u8],
) -> Result<()> {
    match encoder.write_all(data) {
        Ok(()) => {
            *offset = encoder.writer().offset;
            Ok(())
        }
        Err(e) if encoder.writer().write_failed => Err(PackageError::IoWriteFailed {
            offset: *offset,
            source: e,
        }),
        Err(e) => Err(PackageError::CompressFailed(e.to_string())),
    }
}
