//! Package configuration
//!
//! Loaded from TOML or built in code, then validated before use.

use crate::error::{PackageError, Result};
use crate::params::{DigestMethod, MAX_BLOCK_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;

/// Tunables shared by every entry of a package
///
/// # Examples
///
/// ```
/// use lz4pack::PackageConfig;
///
/// let config = PackageConfig::from_toml_str("block_size_cap = 65536").unwrap();
/// assert_eq!(config.block_size_cap, 65536);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PackageConfig {
    /// Upper bound on the adapter block size, applied after the block-size table
    #[validate(range(min = 1, max = 4194304))]
    pub block_size_cap: usize,

    /// Chunk size used when reading entry input streams
    #[validate(range(min = 1))]
    pub read_chunk_size: usize,

    /// Digest method handed to the sign-data step on save
    pub digest_method: DigestMethod,
}

impl Default for PackageConfig {
    fn default() -> Self {
        PackageConfig {
            block_size_cap: MAX_BLOCK_SIZE,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            digest_method: DigestMethod::None,
        }
    }
}

impl PackageConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PackageConfig =
            toml::from_str(text).map_err(|e| PackageError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Read a TOML config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| PackageError::Config(e.to_string()))
    }

    /// Run field validation
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| PackageError::Config(e.to_string()))
    }

    /// Config with a smaller block cap, mostly useful for exercising block boundaries
    pub fn with_block_size_cap(mut self, cap: usize) -> Self {
        self.block_size_cap = cap;
        self
    }
}
