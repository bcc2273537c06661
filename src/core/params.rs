//! Entry metadata and LZ4 codec parameters
//!
//! Magic numbers, compression-level bounds and the block-size table are
//! plain constants and pure functions; nothing here holds mutable state.

use serde::{Deserialize, Deserializer, Serialize};

/// Magic at the start of a standard LZ4 frame
pub const LZ4_FRAME_MAGIC: u32 = 0x184D_2204;

/// Magic at the start of a raw-block stream
pub const LZ4_BLOCK_MAGIC: u32 = 0x184C_2102;

/// Size of either magic on the wire
pub const MAGIC_LEN: usize = 4;

/// Size of the little-endian length prefix on each raw block record
pub const BLOCK_LEN_PREFIX: usize = 4;

pub const LZ4HC_CLEVEL_MIN: i32 = 3;
pub const LZ4HC_CLEVEL_DEFAULT: i32 = 9;
pub const LZ4HC_CLEVEL_MAX: i32 = 12;

/// Largest block size id in the table
pub const MAX_BLOCK_SIZE_ID: u8 = 7;

/// Hard cap on the adapter block size (4 MiB)
pub const MAX_BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Block size for a block size id: `1 << (8 + 2 * id)`, 256 B up to 4 MiB.
/// Ids above [`MAX_BLOCK_SIZE_ID`] saturate.
pub fn block_size_for(id: u8) -> usize {
    let id = id.min(MAX_BLOCK_SIZE_ID) as u32;
    1usize << (8 + 2 * id)
}

/// Clamp a requested compression level into `[LZ4HC_CLEVEL_MIN - 1, LZ4HC_CLEVEL_MAX]`
///
/// Levels below 1 become `LZ4HC_CLEVEL_MIN - 1` (fast compressor); levels at
/// or above the maximum become the maximum.
pub fn clamp_level(level: i32) -> i32 {
    if level < 1 {
        LZ4HC_CLEVEL_MIN - 1
    } else if level >= LZ4HC_CLEVEL_MAX {
        LZ4HC_CLEVEL_MAX
    } else {
        level
    }
}

/// Read a little-endian magic from the first four bytes
pub fn read_magic(bytes: &[u8]) -> Option<u32> {
    let head: [u8; MAGIC_LEN] = bytes.get(..MAGIC_LEN)?.try_into().ok()?;
    Some(u32::from_le_bytes(head))
}

/// Wire format of an entry's data region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PackMethod {
    /// Standard LZ4 frame
    Lz4Frame = 1,
    /// Magic followed by `[u32 length][raw LZ4 block]` records
    Lz4Block = 2,
}

impl PackMethod {
    /// Identify the format from its magic
    pub fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            LZ4_FRAME_MAGIC => Some(PackMethod::Lz4Frame),
            LZ4_BLOCK_MAGIC => Some(PackMethod::Lz4Block),
            _ => None,
        }
    }

    pub fn magic(self) -> u32 {
        match self {
            PackMethod::Lz4Frame => LZ4_FRAME_MAGIC,
            PackMethod::Lz4Block => LZ4_BLOCK_MAGIC,
        }
    }
}

/// Digest algorithm tag carried by entries and used when signing a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DigestMethod {
    #[default]
    None = 0,
    Crc = 1,
    Sha256 = 2,
    Sha384 = 3,
}

/// Per-entry metadata
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntryInfo {
    /// Entry name, unique within a package by convention
    pub identity: String,

    /// Wire format; `None` when a header could not be identified
    pub pack_method: Option<PackMethod>,

    pub digest_method: DigestMethod,

    /// Absolute offset of the entry header (equal to `data_offset` for raw LZ4)
    pub header_offset: u64,

    /// Absolute offset of the compressed data
    pub data_offset: u64,

    /// Compressed size; zero until packed or decoded
    pub packed_size: u64,

    /// Uncompressed size; zero until packed or decoded
    pub unpacked_size: u64,
}

impl EntryInfo {
    pub fn new(identity: impl Into<String>, pack_method: PackMethod) -> Self {
        EntryInfo {
            identity: identity.into(),
            pack_method: Some(pack_method),
            ..Default::default()
        }
    }
}

/// LZ4 codec configuration, copied into an adapter when it is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lz4Params {
    #[serde(deserialize_with = "deserialize_level")]
    compression_level: i32,

    /// Independent blocks; otherwise frame blocks are linked
    pub block_independence: bool,

    /// Append a content checksum to frames
    pub content_checksum: bool,

    /// Index into the block-size table
    pub block_size_id: u8,

    /// Flush the frame encoder after every update
    pub auto_flush: bool,
}

fn deserialize_level<'de, D>(deserializer: D) -> std::result::Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    i32::deserialize(deserializer).map(clamp_level)
}

impl Default for Lz4Params {
    fn default() -> Self {
        Lz4Params {
            compression_level: clamp_level(0),
            block_independence: false,
            content_checksum: false,
            block_size_id: 4,
            auto_flush: false,
        }
    }
}

impl Lz4Params {
    /// Parameters with the given level, clamped
    pub fn with_level(level: i32) -> Self {
        Lz4Params {
            compression_level: clamp_level(level),
            ..Default::default()
        }
    }

    /// Stored (clamped) compression level
    pub fn compression_level(&self) -> i32 {
        self.compression_level
    }

    pub fn set_compression_level(&mut self, level: i32) {
        self.compression_level = clamp_level(level);
    }

    /// Whether the level selects the high-compression compressor
    pub fn uses_hc(&self) -> bool {
        self.compression_level >= LZ4HC_CLEVEL_MIN
    }

    pub fn block_size_id(mut self, id: u8) -> Self {
        self.block_size_id = id;
        self
    }

    pub fn block_independence(mut self, independent: bool) -> Self {
        self.block_independence = independent;
        self
    }

    pub fn content_checksum(mut self, enabled: bool) -> Self {
        self.content_checksum = enabled;
        self
    }

    pub fn auto_flush(mut self, enabled: bool) -> Self {
        self.auto_flush = enabled;
        self
    }

    /// Effective block size for adapters: table size, limited by `cap`
    pub fn block_size(&self, cap: usize) -> usize {
        block_size_for(self.block_size_id).min(cap).min(MAX_BLOCK_SIZE)
    }
}

/// Entry metadata plus LZ4 parameters, as handed to `add_entry`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lz4FileInfo {
    pub file_info: EntryInfo,
    #[serde(default)]
    pub params: Lz4Params,
}

impl Lz4FileInfo {
    pub fn new(identity: impl Into<String>, pack_method: PackMethod, params: Lz4Params) -> Self {
        Lz4FileInfo {
            file_info: EntryInfo::new(identity, pack_method),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_clamping() {
        for requested in [-100, -1, 0] {
            assert_eq!(clamp_level(requested), LZ4HC_CLEVEL_MIN - 1);
        }
        for requested in 1..LZ4HC_CLEVEL_MAX {
            assert_eq!(clamp_level(requested), requested);
        }
        for requested in [LZ4HC_CLEVEL_MAX, 13, 99, i32::MAX] {
            assert_eq!(clamp_level(requested), LZ4HC_CLEVEL_MAX);
        }
    }

    #[test]
    fn test_hc_threshold() {
        assert!(!Lz4Params::with_level(0).uses_hc());
        assert!(!Lz4Params::with_level(2).uses_hc());
        assert!(Lz4Params::with_level(LZ4HC_CLEVEL_MIN).uses_hc());
        assert!(Lz4Params::with_level(LZ4HC_CLEVEL_DEFAULT).uses_hc());
    }

    #[test]
    fn test_block_size_table() {
        assert_eq!(block_size_for(0), 256);
        assert_eq!(block_size_for(4), 64 * 1024);
        assert_eq!(block_size_for(7), MAX_BLOCK_SIZE);
        assert_eq!(block_size_for(200), MAX_BLOCK_SIZE);

        let params = Lz4Params::default().block_size_id(7);
        assert_eq!(params.block_size(8), 8);
        assert_eq!(params.block_size(usize::MAX), MAX_BLOCK_SIZE);
    }

    #[test]
    fn test_magic_dispatch() {
        assert_eq!(
            PackMethod::from_magic(LZ4_FRAME_MAGIC),
            Some(PackMethod::Lz4Frame)
        );
        assert_eq!(
            PackMethod::from_magic(LZ4_BLOCK_MAGIC),
            Some(PackMethod::Lz4Block)
        );
        assert_eq!(PackMethod::from_magic(0xDEAD_BEEF), None);
        assert_eq!(read_magic(&[0x04, 0x22, 0x4D, 0x18, 0xFF]), Some(LZ4_FRAME_MAGIC));
        assert_eq!(read_magic(&[0x04, 0x22]), None);
    }

    #[test]
    fn test_params_deserialize_clamps_level() {
        let params: Lz4Params = toml::from_str("compression_level = 40\nblock_size_id = 5").unwrap();
        assert_eq!(params.compression_level(), LZ4HC_CLEVEL_MAX);
        assert_eq!(params.block_size_id, 5);

        let params: Lz4Params = toml::from_str("compression_level = -3").unwrap();
        assert_eq!(params.compression_level(), LZ4HC_CLEVEL_MIN - 1);
    }
}
