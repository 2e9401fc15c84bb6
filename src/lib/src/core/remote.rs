//! Remote synchronization. Clients are transport-agnostic: everything is
//! expressed against the `Transport` trait (ref listing plus chunk-level
//! negotiation and a root CAS), with a filesystem implementation shipped
//! here. Push, fetch, clone, shallow clone, and backup sync live in `sync`.

pub mod file_transport;
pub mod sync;

use std::collections::{BTreeMap, HashSet};

use crate::error::{DoltError, Result};
use crate::model::Hash;

#[derive(Debug, Clone)]
pub struct RepoMetadata {
    pub format: String,
    /// The remote's ghost set; a shallow remote cannot serve
    pub shallow: HashSet<Hash>,
}

pub trait Transport: Send + Sync {
    fn list_refs(&self) -> Result<BTreeMap<String, Hash>>;

    fn get_repo_metadata(&self) -> Result<RepoMetadata>;

    /// Which of `hashes` the remote already has
    fn has_chunks(&self, hashes: &[Hash]) -> Result<HashSet<Hash>>;

    fn get_chunks(&self, hashes: &[Hash]) -> Result<Vec<(Hash, Vec<u8>)>>;

    fn put_chunks(&self, chunks: &[(Hash, Vec<u8>)]) -> Result<()>;

    fn root(&self) -> Result<Option<Hash>>;

    fn commit_root(&self, old: Option<Hash>, new: Hash) -> Result<bool>;
}

/// Open a transport for a remote URL. `file://` paths and bare paths talk to
/// a store directory on local disk; other schemes are wired in by the server
/// integration.
pub fn open_transport(url: &str) -> Result<Box<dyn Transport>> {
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(Box::new(file_transport::FileTransport::open(path)?));
    }
    if !url.contains("://") {
        return Ok(Box::new(file_transport::FileTransport::open(url)?));
    }
    Err(DoltError::InvalidArgument(format!(
        "unsupported remote url scheme: {url}"
    )))
}

/// Create the store behind a transport URL, for `push` to a fresh remote
pub fn create_remote(url: &str) -> Result<()> {
    if let Some(path) = url.strip_prefix("file://") {
        file_transport::FileTransport::create(path)?;
        return Ok(());
    }
    if !url.contains("://") {
        file_transport::FileTransport::create(url)?;
        return Ok(());
    }
    Err(DoltError::InvalidArgument(format!(
        "unsupported remote url scheme: {url}"
    )))
}
