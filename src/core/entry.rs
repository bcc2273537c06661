//! Package entries
//!
//! A [`PackageEntry`] holds one payload's metadata and orchestrates its
//! header encode, pack, unpack and header decode. Raw LZ4 entries have no
//! header region of their own: the header offset always equals the data
//! offset and encoding a header writes nothing.

use crate::codec::{AlgorithmContext, CodecSelector};
use crate::error::{PackageError, Result};
use crate::io::PkgStream;
use crate::params::{read_magic, DigestMethod, EntryInfo, Lz4FileInfo, Lz4Params, PackMethod};
use tracing::debug;

/// One named payload inside a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    node_id: u32,
    info: EntryInfo,
    params: Lz4Params,
}

impl PackageEntry {
    /// Empty entry with the given node id
    pub fn new(node_id: u32) -> Self {
        PackageEntry {
            node_id,
            info: EntryInfo::default(),
            params: Lz4Params::default(),
        }
    }

    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    pub fn identity(&self) -> &str {
        &self.info.identity
    }

    pub fn info(&self) -> &EntryInfo {
        &self.info
    }

    pub fn params(&self) -> &Lz4Params {
        &self.params
    }

    /// Copy identity, tags and codec parameters from `meta`
    pub fn init(&mut self, meta: &Lz4FileInfo) -> Result<()> {
        if meta.file_info.identity.is_empty() {
            return Err(PackageError::InvalidParam(
                "entry identity is empty".to_string(),
            ));
        }
        if meta.file_info.pack_method.is_none() {
            return Err(PackageError::InvalidParam(format!(
                "no pack method for entry '{}'",
                meta.file_info.identity
            )));
        }

        self.info = EntryInfo {
            identity: meta.file_info.identity.clone(),
            pack_method: meta.file_info.pack_method,
            digest_method: meta.file_info.digest_method,
            ..Default::default()
        };
        self.params = meta.params;
        Ok(())
    }

    /// Reserve the header at `start_offset`; raw LZ4 writes nothing and returns 0
    pub fn encode_header(&mut self, start_offset: u64) -> Result<u64> {
        self.info.header_offset = start_offset;
        self.info.data_offset = start_offset;
        Ok(0)
    }

    /// Compress `input` into `output` at `start_offset`, returning the packed length
    pub fn pack(
        &mut self,
        selector: &dyn CodecSelector,
        input: &mut dyn PkgStream,
        output: &mut dyn PkgStream,
        start_offset: u64,
    ) -> Result<u64> {
        if self.info.header_offset != start_offset {
            return Err(PackageError::InvalidParam(format!(
                "pack offset {} does not match header offset {} of '{}'",
                start_offset, self.info.header_offset, self.info.identity
            )));
        }

        let method = self.method()?;
        let codec = selector
            .resolve(method, self.info.digest_method, &self.params)
            .ok_or_else(|| PackageError::InvalidParam(format!("no codec for {:?}", method)))?;

        let mut ctx = AlgorithmContext {
            src_offset: 0,
            dest_offset: start_offset,
            packed_size: self.info.packed_size,
            unpacked_size: self.info.unpacked_size,
            crc: 0,
            digest_method: self.info.digest_method,
        };
        codec.pack(input, output, &mut ctx)?;

        self.info.packed_size = ctx.packed_size;
        self.info.unpacked_size = ctx.unpacked_size;
        debug!(
            entry = %self.info.identity,
            offset = start_offset,
            packed = ctx.packed_size,
            unpacked = ctx.unpacked_size,
            "entry packed"
        );
        Ok(ctx.packed_size)
    }

    /// Decompress this entry from the package stream into `output`
    pub fn unpack(
        &mut self,
        selector: &dyn CodecSelector,
        package: &mut dyn PkgStream,
        output: &mut dyn PkgStream,
    ) -> Result<()> {
        let method = self.method()?;
        let codec = selector
            .resolve(method, self.info.digest_method, &self.params)
            .ok_or_else(|| PackageError::InvalidParam(format!("no codec for {:?}", method)))?;

        let mut ctx = AlgorithmContext {
            src_offset: self.info.data_offset,
            dest_offset: 0,
            packed_size: self.info.packed_size,
            unpacked_size: self.info.unpacked_size,
            crc: 0,
            digest_method: self.info.digest_method,
        };
        codec.unpack(package, output, &mut ctx)?;

        output.flush(ctx.unpacked_size)?;
        self.info.packed_size = ctx.packed_size;
        self.info.unpacked_size = ctx.unpacked_size;
        codec.update_file_info(&mut self.info);
        debug!(
            entry = %self.info.identity,
            packed = ctx.packed_size,
            unpacked = ctx.unpacked_size,
            "entry unpacked"
        );
        Ok(())
    }

    /// Identify the format from `header` and describe the whole stream as this entry
    ///
    /// Leaves the pack method unresolved when the magic is unknown. Sizes are
    /// set to `stream_len`, which only holds for a single-entry stream; unpack
    /// replaces them with the exact counts.
    ///
    /// Bytes appended after the payload are read as part of it. A frame stops
    /// at its end mark, but a block-format package saved with signing data
    /// fails to unpack because the trailer is read as a record length.
    pub fn decode_header(
        &mut self,
        header: &[u8],
        stream_len: u64,
        header_offset: u64,
        data_offset: u64,
    ) -> Result<u64> {
        let magic = read_magic(header).ok_or_else(|| {
            PackageError::InvalidParam(format!("header too short: {} bytes", header.len()))
        })?;

        self.info.identity = format!("lz4_{}", self.node_id);
        self.info.digest_method = DigestMethod::None;
        self.info.pack_method = PackMethod::from_magic(magic);
        self.info.header_offset = header_offset;
        self.info.data_offset = data_offset;
        self.info.unpacked_size = stream_len;
        self.info.packed_size = stream_len;
        Ok(data_offset.saturating_sub(header_offset))
    }

    fn method(&self) -> Result<PackMethod> {
        self.info.pack_method.ok_or_else(|| {
            PackageError::InvalidParam(format!(
                "entry '{}' has no pack method",
                self.info.identity
            ))
        })
    }
}
