//! Filesystem transport: the remote is another chunk store on local disk,
//! addressed by a `file://` URL. Serving is refused for shallow stores (the
//! required chunks are missing) and for archived stores.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::core::db::{ChunkStore, DiskStore};
use crate::core::remote::{RepoMetadata, Transport};
use crate::error::{DoltError, Result};
use crate::model::Hash;

pub struct FileTransport {
    store: DiskStore,
}

impl FileTransport {
    pub fn open(path: impl AsRef<Path>) -> Result<FileTransport> {
        let store = DiskStore::open(&path)?;
        if store.is_shallow() {
            return Err(DoltError::InvalidArgument(format!(
                "{} is a shallow clone and cannot serve as a remote",
                path.as_ref().display()
            )));
        }
        if store.is_archived()? {
            return Err(DoltError::InvalidArgument(format!(
                "{} contains archive files and cannot serve as a remote",
                path.as_ref().display()
            )));
        }
        Ok(FileTransport { store })
    }

    pub fn create(path: impl AsRef<Path>) -> Result<FileTransport> {
        let store = DiskStore::create(&path)?;
        Ok(FileTransport { store })
    }
}

impl Transport for FileTransport {
    fn list_refs(&self) -> Result<BTreeMap<String, Hash>> {
        self.store.rebase()?;
        match self.store.root()? {
            Some(root) => Ok(serde_json::from_slice(&self.store.get(&root)?)?),
            None => Ok(BTreeMap::new()),
        }
    }

    fn get_repo_metadata(&self) -> Result<RepoMetadata> {
        Ok(RepoMetadata {
            format: crate::constants::FORMAT_DOLT.to_string(),
            shallow: self.store.ghosts(),
        })
    }

    fn has_chunks(&self, hashes: &[Hash]) -> Result<HashSet<Hash>> {
        self.store.has_many(hashes)
    }

    fn get_chunks(&self, hashes: &[Hash]) -> Result<Vec<(Hash, Vec<u8>)>> {
        let mut out = Vec::with_capacity(hashes.len());
        for hash in hashes {
            match self.store.get(hash) {
                Ok(bytes) => out.push((*hash, bytes)),
                Err(DoltError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    fn put_chunks(&self, chunks: &[(Hash, Vec<u8>)]) -> Result<()> {
        for (hash, bytes) in chunks {
            let written = self.store.put(bytes)?;
            if written != *hash {
                return Err(DoltError::Internal(format!(
                    "uploaded chunk hashed to {written}, expected {hash}"
                )));
            }
        }
        Ok(())
    }

    fn root(&self) -> Result<Option<Hash>> {
        self.store.rebase()?;
        self.store.root()
    }

    fn commit_root(&self, old: Option<Hash>, new: Hash) -> Result<bool> {
        self.store.commit_root(old, new)
    }
}
