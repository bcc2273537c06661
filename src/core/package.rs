//! Raw LZ4 package container
//!
//! Owns the entries of one package, the write cursor and the lifecycle:
//!
//! ```text
//! Idle --add_entry / load_package--> Working --close--> Closed
//! ```
//!
//! Entries live in one arena; the id and name indices hold arena
//! positions. Adding an entry with a name already in use moves the name
//! to the new entry while the old one stays reachable by id.

use crate::codec::{CodecSelector, Lz4CodecSelector};
use crate::config::PackageConfig;
use crate::entry::PackageEntry;
use crate::error::{PackageError, Result};
use crate::io::{read_full, PkgStream};
use crate::params::{DigestMethod, Lz4FileInfo, PackMethod, MAGIC_LEN};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Package lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageState {
    Idle,
    Working,
    Closed,
}

/// Outcome of [`Lz4Package::load_package`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// One entry describing the stream was registered
    Loaded,
    /// Stream is empty, too short or not raw LZ4
    NoContent,
}

/// Appends signing data after the last entry on save
pub trait SignDataAppender {
    /// Write signing data at `cursor` and return the offset past it
    fn append_sign_data(
        &mut self,
        stream: &mut dyn PkgStream,
        digest_method: DigestMethod,
        cursor: u64,
    ) -> Result<u64>;
}

/// Appends nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSignData;

impl SignDataAppender for NoSignData {
    fn append_sign_data(
        &mut self,
        _stream: &mut dyn PkgStream,
        _digest_method: DigestMethod,
        cursor: u64,
    ) -> Result<u64> {
        Ok(cursor)
    }
}

/// Package signature check, accepted by `load_package`
///
/// Raw LZ4 packages carry no signature block of their own, so the load
/// path does not call it.
pub trait PackageVerifier {
    fn verify(&self, stream: &mut dyn PkgStream, digest_method: DigestMethod) -> Result<()>;
}

/// Single-writer LZ4 package over a stream
pub struct Lz4Package<S: PkgStream> {
    stream: S,
    config: PackageConfig,
    selector: Box<dyn CodecSelector>,
    signer: Box<dyn SignDataAppender>,
    state: PackageState,
    cursor: u64,
    entries: Vec<PackageEntry>,
    id_index: HashMap<u32, usize>,
    name_index: HashMap<String, usize>,
    next_node_id: u32,
}

impl<S: PkgStream> Lz4Package<S> {
    /// Package with the default config
    pub fn new(stream: S) -> Self {
        let config = PackageConfig::default();
        let selector = Box::new(Lz4CodecSelector::new(&config));
        Self::assemble(stream, config, selector, Box::new(NoSignData))
    }

    /// Package with a validated config and the LZ4 codec selector
    pub fn with_config(stream: S, config: PackageConfig) -> Result<Self> {
        config.check()?;
        let selector = Box::new(Lz4CodecSelector::new(&config));
        Ok(Self::assemble(stream, config, selector, Box::new(NoSignData)))
    }

    /// Package with explicit collaborators and a validated config
    pub fn with_parts(
        stream: S,
        config: PackageConfig,
        selector: Box<dyn CodecSelector>,
        signer: Box<dyn SignDataAppender>,
    ) -> Result<Self> {
        config.check()?;
        Ok(Self::assemble(stream, config, selector, signer))
    }

    fn assemble(
        stream: S,
        config: PackageConfig,
        selector: Box<dyn CodecSelector>,
        signer: Box<dyn SignDataAppender>,
    ) -> Self {
        Lz4Package {
            stream,
            config,
            selector,
            signer,
            state: PackageState::Idle,
            cursor: 0,
            entries: Vec::new(),
            id_index: HashMap::new(),
            name_index: HashMap::new(),
            next_node_id: 0,
        }
    }

    pub fn state(&self) -> PackageState {
        self.state
    }

    /// Offset of the next write
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn config(&self) -> &PackageConfig {
        &self.config
    }

    /// Entries in insertion order, including ones whose name was taken over
    pub fn entries(&self) -> &[PackageEntry] {
        &self.entries
    }

    pub fn entry_by_id(&self, node_id: u32) -> Option<&PackageEntry> {
        self.id_index.get(&node_id).map(|&i| &self.entries[i])
    }

    /// Latest entry registered under `name`
    pub fn entry_by_name(&self, name: &str) -> Option<&PackageEntry> {
        self.name_index.get(name).map(|&i| &self.entries[i])
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn into_stream(self) -> S {
        self.stream
    }

    fn require(&self, allowed: &[PackageState], operation: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(PackageError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn register(&mut self, entry: PackageEntry) {
        let index = self.entries.len();
        let name = entry.identity().to_string();
        if let Some(previous) = self.name_index.insert(name.clone(), index) {
            warn!(
                entry = %name,
                previous_id = self.entries[previous].node_id(),
                node_id = entry.node_id(),
                "duplicate entry name, newer entry takes the name"
            );
        }
        self.id_index.insert(entry.node_id(), index);
        self.entries.push(entry);
        self.next_node_id += 1;
    }

    /// Compress `input` as a new entry at the cursor
    ///
    /// On failure the cursor and the indices are left untouched; bytes
    /// already written to the stream are not rolled back.
    pub fn add_entry(&mut self, meta: &Lz4FileInfo, input: &mut dyn PkgStream) -> Result<()> {
        self.require(&[PackageState::Idle, PackageState::Working], "add_entry")?;

        let mut entry = PackageEntry::new(self.next_node_id);
        entry.init(meta)?;

        let mut cursor = self.cursor;
        cursor += entry.encode_header(cursor)?;
        cursor += entry.pack(self.selector.as_ref(), input, &mut self.stream, cursor)?;
        self.stream.flush(cursor)?;

        info!(
            entry = %entry.identity(),
            node_id = entry.node_id(),
            offset = self.cursor,
            packed = entry.info().packed_size,
            unpacked = entry.info().unpacked_size,
            "entry added"
        );
        self.cursor = cursor;
        self.register(entry);
        self.state = PackageState::Working;
        Ok(())
    }

    /// Append signing data and return the final package size
    pub fn save_package(&mut self) -> Result<u64> {
        self.require(&[PackageState::Working], "save_package")?;

        let end = self.signer.append_sign_data(
            &mut self.stream,
            self.config.digest_method,
            self.cursor,
        )?;
        self.stream.flush(end)?;
        self.cursor = end;
        info!(
            stream = self.stream.name(),
            entries = self.entries.len(),
            size = end,
            "package saved"
        );
        Ok(end)
    }

    /// Sniff the stream and register it as a single entry
    ///
    /// Appends the entry name to `file_names`. A stream shorter than the
    /// magic or with an unknown magic yields [`LoadStatus::NoContent`].
    pub fn load_package(
        &mut self,
        file_names: &mut Vec<String>,
        _verifier: Option<&dyn PackageVerifier>,
    ) -> Result<LoadStatus> {
        self.require(&[PackageState::Idle], "load_package")?;
        self.state = PackageState::Working;

        let mut head = [0u8; MAGIC_LEN];
        let n = read_full(&mut self.stream, &mut head, 0)?;
        if n < MAGIC_LEN {
            debug!(stream = self.stream.name(), len = n, "stream too short for a package");
            return Ok(LoadStatus::NoContent);
        }

        let magic = u32::from_le_bytes(head);
        if PackMethod::from_magic(magic).is_none() {
            warn!(stream = self.stream.name(), magic = %format!("{:#010x}", magic), "not a raw LZ4 package");
            return Ok(LoadStatus::NoContent);
        }

        let len = self.stream.length()?;
        let mut entry = PackageEntry::new(self.next_node_id);
        entry.decode_header(&head, len, 0, MAGIC_LEN as u64)?;

        info!(
            stream = self.stream.name(),
            entry = %entry.identity(),
            method = ?entry.info().pack_method,
            size = len,
            "package loaded"
        );
        file_names.push(entry.identity().to_string());
        self.register(entry);
        Ok(LoadStatus::Loaded)
    }

    /// Unpack the entry registered under `name` into `output`
    pub fn extract_file(&mut self, name: &str, output: &mut dyn PkgStream) -> Result<()> {
        self.require(&[PackageState::Working], "extract_file")?;
        let index = *self
            .name_index
            .get(name)
            .ok_or_else(|| PackageError::EntryNotFound(name.to_string()))?;

        let entry = &mut self.entries[index];
        entry.unpack(self.selector.as_ref(), &mut self.stream, output)
    }

    /// Finish the package; closing twice is a no-op
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            PackageState::Working => {
                self.state = PackageState::Closed;
                debug!(stream = self.stream.name(), "package closed");
                Ok(())
            }
            PackageState::Closed => {
                debug!(stream = self.stream.name(), "package already closed");
                Ok(())
            }
            PackageState::Idle => Err(PackageError::InvalidState {
                operation: "close",
                state: self.state,
            }),
        }
    }
}
