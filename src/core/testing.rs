//! Instrumented streams for unit tests

use crate::io::{MemoryStream, PkgStream};
use std::io;

/// Counts bytes accepted by `write`
#[derive(Debug, Default)]
pub(crate) struct CountingStream {
    pub(crate) inner: MemoryStream,
    pub(crate) bytes_written: u64,
    pub(crate) flushes: Vec<u64>,
}

impl PkgStream for CountingStream {
    fn name(&self) -> &str {
        "counting"
    }

    fn read(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.inner.read(buf, offset)
    }

    fn write(&mut self, data: &[u8], offset: u64) -> io::Result<()> {
        self.inner.write(data, offset)?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    fn flush(&mut self, size_hint: u64) -> io::Result<()> {
        self.flushes.push(size_hint);
        Ok(())
    }

    fn length(&self) -> io::Result<u64> {
        self.inner.length()
    }
}

/// Accepts a fixed number of writes, then fails every one after
#[derive(Debug, Default)]
pub(crate) struct FailingStream {
    pub(crate) inner: MemoryStream,
    pub(crate) writes_left: usize,
}

impl FailingStream {
    pub(crate) fn new(writes_left: usize) -> Self {
        FailingStream {
            inner: MemoryStream::new("failing"),
            writes_left,
        }
    }
}

impl PkgStream for FailingStream {
    fn name(&self) -> &str {
        "failing"
    }

    fn read(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.inner.read(buf, offset)
    }

    fn write(&mut self, data: &[u8], offset: u64) -> io::Result<()> {
        if self.writes_left == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        self.writes_left -= 1;
        self.inner.write(data, offset)
    }

    fn flush(&mut self, _size_hint: u64) -> io::Result<()> {
        Ok(())
    }

    fn length(&self) -> io::Result<u64> {
        self.inner.length()
    }
}
