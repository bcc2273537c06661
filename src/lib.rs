//! # lz4pack - LZ4 update-package container
//!
//! Builds and reads raw LZ4 update packages. Each entry is compressed in
//! one of two wire formats:
//!
//! - **LZ4 frame**: standard frame with optional content checksum and
//!   linked or independent blocks
//! - **LZ4 block**: a magic followed by length-prefixed raw blocks
//!
//! Loading sniffs the leading magic and exposes the whole stream as a
//! single entry.
//!
//! ## Quick Start
//!
//! ```rust
//! use lz4pack::{Lz4FileInfo, Lz4Package, Lz4Params, MemoryStream, PackMethod, Result};
//!
//! # fn main() -> Result<()> {
//! let mut package = Lz4Package::new(MemoryStream::new("update.pkg"));
//! let mut input = MemoryStream::from_bytes("system.img", b"payload".repeat(32));
//! let meta = Lz4FileInfo::new("system.img", PackMethod::Lz4Frame, Lz4Params::with_level(9));
//!
//! package.add_entry(&meta, &mut input)?;
//! let size = package.save_package()?;
//! package.close()?;
//! assert_eq!(size, package.stream().as_bytes().len() as u64);
//! # Ok(())
//! # }
//! ```

pub mod core;

// Re-export core modules internally so crate:: paths in core still work
#[allow(unused_imports)]
pub(crate) use self::core::{codec, compression, config, entry, error, io, package, params};

#[cfg(test)]
pub(crate) use self::core::testing;

pub use crate::core::{
    codec::{AlgorithmContext, Codec, CodecSelector, Lz4Codec, Lz4CodecSelector},
    compression::{BlockAdapter, FrameAdapter, Lz4Adapter},
    config::PackageConfig,
    entry::PackageEntry,
    error::{PackageError, Result},
    io::{FileStream, MemoryStream, PkgStream},
    package::{
        LoadStatus, Lz4Package, NoSignData, PackageState, PackageVerifier, SignDataAppender,
    },
    params::{
        block_size_for, clamp_level, DigestMethod, EntryInfo, Lz4FileInfo, Lz4Params, PackMethod,
        LZ4HC_CLEVEL_DEFAULT, LZ4HC_CLEVEL_MAX, LZ4HC_CLEVEL_MIN, LZ4_BLOCK_MAGIC,
        LZ4_FRAME_MAGIC, MAX_BLOCK_SIZE,
    },
};

use crate::core::params::read_magic;
use std::path::Path;
use tracing::{debug, info};

/// Builder for a package with custom collaborators
///
/// # Examples
///
/// ```rust
/// use lz4pack::{MemoryStream, PackageBuilder, PackageConfig};
///
/// # fn main() -> lz4pack::Result<()> {
/// let package = PackageBuilder::new()
///     .config(PackageConfig::default().with_block_size_cap(64 * 1024))
///     .build(MemoryStream::new("update.pkg"))?;
/// assert_eq!(package.config().block_size_cap, 64 * 1024);
/// # Ok(())
/// # }
/// ```
pub struct PackageBuilder {
    config: PackageConfig,
    selector: Option<Box<dyn CodecSelector>>,
    signer: Option<Box<dyn SignDataAppender>>,
}

impl PackageBuilder {
    /// Builder with the default config, LZ4 selector and no signing data
    pub fn new() -> Self {
        PackageBuilder {
            config: PackageConfig::default(),
            selector: None,
            signer: None,
        }
    }

    /// Set the package config
    pub fn config(mut self, config: PackageConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom codec selector
    pub fn selector(mut self, selector: Box<dyn CodecSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Append signing data on save
    pub fn sign_appender(mut self, signer: Box<dyn SignDataAppender>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Validate the config and build the package over `stream`
    pub fn build<S: PkgStream>(self, stream: S) -> Result<Lz4Package<S>> {
        self.config.check()?;
        let selector = self
            .selector
            .unwrap_or_else(|| Box::new(Lz4CodecSelector::new(&self.config)));
        let signer = self.signer.unwrap_or_else(|| Box::new(NoSignData));
        Lz4Package::with_parts(stream, self.config, selector, signer)
    }
}

impl Default for PackageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a package file from exactly one input file
///
/// Returns the final package size.
pub fn create_package<P, Q>(
    path: P,
    files: &[(Q, Lz4FileInfo)],
    config: &PackageConfig,
) -> Result<u64>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let [(input_path, meta)] = files else {
        return Err(PackageError::InvalidParam(format!(
            "a raw LZ4 package holds exactly one file, got {}",
            files.len()
        )));
    };

    let mut input = FileStream::open(input_path)?;
    let mut package = PackageBuilder::new()
        .config(config.clone())
        .build(FileStream::create(path.as_ref())?)?;

    package.add_entry(meta, &mut input)?;
    let size = package.save_package()?;
    package.close()?;
    let mut stream = package.into_stream();
    stream.sync()?;

    info!(path = %path.as_ref().display(), size, "package file written");
    Ok(size)
}

/// Open a package file and return it with its entry names
pub fn open_package<P: AsRef<Path>>(
    path: P,
    config: &PackageConfig,
) -> Result<(Lz4Package<FileStream>, Vec<String>)> {
    let mut package = PackageBuilder::new()
        .config(config.clone())
        .build(FileStream::open(path)?)?;

    let mut names = Vec::new();
    let status = package.load_package(&mut names, None)?;
    debug!(?status, entries = names.len(), "package file opened");
    Ok((package, names))
}

/// Compress `input` with the method and parameters in `meta`
///
/// Fills in the packed and unpacked sizes of `meta`.
pub fn compress_buffer(
    meta: &mut Lz4FileInfo,
    input: &[u8],
    config: &PackageConfig,
) -> Result<Vec<u8>> {
    config.check()?;
    let method = meta.file_info.pack_method.ok_or_else(|| {
        PackageError::InvalidParam(format!(
            "no pack method for '{}'",
            meta.file_info.identity
        ))
    })?;
    let codec = resolve_codec(config, method, meta)?;

    let mut source = MemoryStream::from_bytes(meta.file_info.identity.clone(), input);
    let mut sink = MemoryStream::new("compressed");
    let mut ctx = AlgorithmContext {
        digest_method: meta.file_info.digest_method,
        ..Default::default()
    };
    codec.pack(&mut source, &mut sink, &mut ctx)?;

    meta.file_info.packed_size = ctx.packed_size;
    meta.file_info.unpacked_size = ctx.unpacked_size;
    Ok(sink.into_bytes())
}

/// Decompress `input`, identifying the format by magic when `meta` has no method
///
/// Fills in the pack method and sizes of `meta`.
pub fn decompress_buffer(
    meta: &mut Lz4FileInfo,
    input: &[u8],
    config: &PackageConfig,
) -> Result<Vec<u8>> {
    config.check()?;
    let method = match meta.file_info.pack_method {
        Some(method) => method,
        None => {
            let magic = read_magic(input).ok_or_else(|| {
                PackageError::InvalidParam(format!("buffer too short: {} bytes", input.len()))
            })?;
            PackMethod::from_magic(magic).ok_or(PackageError::FormatUnrecognized(magic))?
        }
    };
    let codec = resolve_codec(config, method, meta)?;

    let mut source = MemoryStream::from_bytes("compressed", input);
    let mut sink = MemoryStream::new(meta.file_info.identity.clone());
    let mut ctx = AlgorithmContext {
        packed_size: input.len() as u64,
        digest_method: meta.file_info.digest_method,
        ..Default::default()
    };
    codec.unpack(&mut source, &mut sink, &mut ctx)?;
    codec.update_file_info(&mut meta.file_info);

    meta.file_info.packed_size = ctx.packed_size;
    meta.file_info.unpacked_size = ctx.unpacked_size;
    Ok(sink.into_bytes())
}

fn resolve_codec(
    config: &PackageConfig,
    method: PackMethod,
    meta: &Lz4FileInfo,
) -> Result<Box<dyn Codec>> {
    Lz4CodecSelector::new(config)
        .resolve(method, meta.file_info.digest_method, &meta.params)
        .ok_or_else(|| PackageError::InvalidParam(format!("no codec for {:?}", method)))
}
