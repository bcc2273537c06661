//! Seekable byte streams for package data
//!
//! Every package, and every input or output of an entry, is a [`PkgStream`]:
//! a byte range addressed by absolute offset. Callers pick the offsets;
//! streams never keep an implicit position.

use crate::error::{PackageError, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Positional byte stream
pub trait PkgStream {
    /// Stream name used in log lines and error messages
    fn name(&self) -> &str;

    /// Read up to `buf.len()` bytes at `offset`, returning the count read.
    /// Zero means end of stream.
    fn read(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Write all of `data` at `offset`
    fn write(&mut self, data: &[u8], offset: u64) -> io::Result<()>;

    /// Push buffered data out; `size_hint` is the logical stream size the
    /// caller expects after the flush
    fn flush(&mut self, size_hint: u64) -> io::Result<()>;

    /// Current stream length in bytes
    fn length(&self) -> io::Result<u64>;
}

/// Fill `buf` from `offset`, stopping early only at end of stream
pub fn read_full(stream: &mut dyn PkgStream, buf: &mut [u8], offset: u64) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let at = offset + filled as u64;
        let n = stream
            .read(&mut buf[filled..], at)
            .map_err(|source| PackageError::IoReadFailed { offset: at, source })?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Adapts a range of a [`PkgStream`] to [`std::io::Read`]
pub struct StreamReader<'a> {
    stream: &'a mut dyn PkgStream,
    pos: u64,
    end: u64,
}

impl<'a> StreamReader<'a> {
    pub fn new(stream: &'a mut dyn PkgStream, start: u64, end: u64) -> Self {
        StreamReader {
            stream,
            pos: start,
            end,
        }
    }

    pub fn position(&self) -> u64 {
        self.pos
    }
}

impl Read for StreamReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.end.saturating_sub(self.pos);
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(remaining.min(usize::MAX as u64) as usize);
        let n = self.stream.read(&mut buf[..want], self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }
}

/// In-memory stream
#[derive(Debug, Clone, Default)]
pub struct MemoryStream {
    name: String,
    data: Vec<u8>,
}

impl MemoryStream {
    /// Create an empty stream
    pub fn new(name: impl Into<String>) -> Self {
        MemoryStream {
            name: name.into(),
            data: Vec::new(),
        }
    }

    /// Wrap existing bytes
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        MemoryStream {
            name: name.into(),
            data: data.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl PkgStream for MemoryStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let len = self.data.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn write(&mut self, data: &[u8], offset: u64) -> io::Result<()> {
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset exceeds memory"))?;
        let end = start
            .checked_add(data.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "write end overflows"))?;
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn flush(&mut self, _size_hint: u64) -> io::Result<()> {
        Ok(())
    }

    fn length(&self) -> io::Result<u64> {
        Ok(self.data.len() as u64)
    }
}

/// Disk-backed stream
pub struct FileStream {
    file: File,
    path: PathBuf,
    name: String,
}

impl FileStream {
    /// Create (or truncate) a file for writing a package
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self::wrap(file, path.as_ref()))
    }

    /// Open an existing file read-only
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(&path)?;
        Ok(Self::wrap(file, path.as_ref()))
    }

    fn wrap(file: File, path: &Path) -> Self {
        FileStream {
            file,
            path: path.to_path_buf(),
            name: path.display().to_string(),
        }
    }

    /// Get file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sync all writes to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

impl PkgStream for FileStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read(buf)
    }

    fn write(&mut self, data: &[u8], offset: u64) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)
    }

    fn flush(&mut self, _size_hint: u64) -> io::Result<()> {
        self.file.flush()
    }

    fn length(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}
