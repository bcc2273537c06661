//! Package core
//!
//! - [`error`] - Error type shared by every layer
//! - [`io`] - Positioned byte streams packages are written to and read from
//! - [`params`] - Wire constants, pack methods and LZ4 parameters
//! - [`config`] - Package-wide tunables
//! - [`compression`] - Streaming frame and block adapters plus their decoders
//! - [`codec`] - Codec selection boundary used by entries
//! - [`entry`] - One payload inside a package
//! - [`package`] - The container and its lifecycle

pub mod codec;
pub mod compression;
pub mod config;
pub mod entry;
pub mod error;
pub mod io;
pub mod package;
pub mod params;

#[cfg(test)]
pub(crate) mod testing;

pub use codec::{AlgorithmContext, Codec, CodecSelector, Lz4Codec, Lz4CodecSelector};
pub use compression::{BlockAdapter, FrameAdapter, Lz4Adapter};
pub use config::PackageConfig;
pub use entry::PackageEntry;
pub use error::{PackageError, Result};
pub use io::{FileStream, MemoryStream, PkgStream};
pub use package::{
    LoadStatus, Lz4Package, NoSignData, PackageState, PackageVerifier, SignDataAppender,
};
pub use params::{DigestMethod, EntryInfo, Lz4FileInfo, Lz4Params, PackMethod};
