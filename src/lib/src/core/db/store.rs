//! The chunk store trait and its disk and memory implementations.
//!
//! A store holds immutable chunks keyed by the hash of their bytes plus a
//! single mutable root pointer updated by compare-and-swap. Novel writes
//! append to the journal; `flush` packs them into table files; `rebase`
//! refreshes a handle after an external writer moved the manifest.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use crate::core::db::archive::ArchiveFile;
use crate::core::db::cache::ChunkCache;
use crate::core::db::journal::Journal;
use crate::core::db::manifest::{Manifest, TableSpec};
use crate::core::db::table_file::TableFile;
use crate::constants::GHOSTS_FILE;
use crate::error::{DoltError, Result};
use crate::model::Hash;
use crate::util::hasher;

/// Descriptor of one table or archive file backing a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDesc {
    pub name: String,
    pub chunk_count: u32,
    pub archived: bool,
}

pub trait ChunkStore: Send + Sync {
    fn has(&self, hash: &Hash) -> Result<bool>;

    /// Which of `hashes` are present (ghosts are not present)
    fn has_many(&self, hashes: &[Hash]) -> Result<HashSet<Hash>> {
        let mut present = HashSet::new();
        for hash in hashes {
            if self.has(hash)? {
                present.insert(*hash);
            }
        }
        Ok(present)
    }

    /// Fails with `ShallowBoundary` for a ghost, `NotFound` otherwise
    fn get(&self, hash: &Hash) -> Result<Vec<u8>>;

    /// Idempotent; returns the hash of `bytes`
    fn put(&self, bytes: &[u8]) -> Result<Hash>;

    fn root(&self) -> Result<Option<Hash>>;

    /// Atomic compare-and-swap of the root pointer. A `false` return is
    /// normal control flow: reload and retry.
    fn commit_root(&self, old: Option<Hash>, new: Hash) -> Result<bool>;

    fn sources(&self) -> Result<Vec<SourceDesc>>;

    /// Refresh this handle after external writes to the same directory
    fn rebase(&self) -> Result<()>;

    fn ghosts(&self) -> HashSet<Hash>;

    fn is_ghost(&self, hash: &Hash) -> bool {
        self.ghosts().contains(hash)
    }

    fn is_shallow(&self) -> bool {
        !self.ghosts().is_empty()
    }

    /// Record commits whose content is intentionally absent
    fn add_ghosts(&self, hashes: &HashSet<Hash>) -> Result<()>;

    /// Forget ghosts whose content has been fetched
    fn remove_ghosts(&self, hashes: &HashSet<Hash>) -> Result<()>;
}

pub type StoreRef = Arc<dyn ChunkStore>;

enum TableSource {
    Plain(TableFile),
    Archive(ArchiveFile),
}

impl TableSource {
    fn open(dir: &Path, spec: &TableSpec) -> Result<TableSource> {
        if ArchiveFile::is_archive(dir, &spec.name)? {
            Ok(TableSource::Archive(ArchiveFile::open(dir, spec)?))
        } else {
            Ok(TableSource::Plain(TableFile::open(dir, spec)?))
        }
    }

    fn has(&self, hash: &Hash) -> bool {
        match self {
            TableSource::Plain(t) => t.has(hash),
            TableSource::Archive(a) => a.has(hash),
        }
    }

    fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>> {
        match self {
            TableSource::Plain(t) => t.get(hash),
            TableSource::Archive(a) => a.get(hash),
        }
    }

    fn hashes(&self) -> Vec<Hash> {
        match self {
            TableSource::Plain(t) => t.hashes(),
            TableSource::Archive(a) => a.hashes(),
        }
    }
}

struct DiskInner {
    manifest: Manifest,
    journal: Journal,
    tables: Vec<(TableSpec, TableSource)>,
}

pub struct DiskStore {
    dir: PathBuf,
    inner: Mutex<DiskInner>,
    ghosts: RwLock<HashSet<Hash>>,
}

impl DiskStore {
    pub fn create(dir: impl AsRef<Path>) -> Result<DiskStore> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        if Manifest::exists(&dir) {
            return Err(DoltError::AlreadyExists(format!(
                "chunk store at {}",
                dir.display()
            )));
        }
        Manifest::new().store(&dir)?;
        DiskStore::open(dir)
    }

    pub fn open(dir: impl AsRef<Path>) -> Result<DiskStore> {
        let dir = dir.as_ref().to_path_buf();
        let manifest = Manifest::load(&dir)?;
        let journal = Journal::open(&dir)?;
        let tables = open_tables(&dir, &manifest)?;
        let ghosts = load_ghosts(&dir)?;
        Ok(DiskStore {
            dir,
            inner: Mutex::new(DiskInner {
                manifest,
                journal,
                tables,
            }),
            ghosts: RwLock::new(ghosts),
        })
    }

    pub fn open_or_create(dir: impl AsRef<Path>) -> Result<DiskStore> {
        if Manifest::exists(&dir) {
            DiskStore::open(dir)
        } else {
            DiskStore::create(dir)
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Pack journaled chunks into a new table file and point the manifest at
    /// it. A no-op on an empty journal.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.journal.is_empty() {
            return Ok(());
        }
        let chunks = inner.journal.drain()?;
        let spec = TableFile::write(&self.dir, &chunks)?;
        log::debug!(
            "flushed {} journal chunks into table file {}",
            spec.chunk_count,
            spec.name
        );
        let source = TableSource::open(&self.dir, &spec)?;
        inner.manifest.specs.push(spec.clone());
        inner.manifest.lock = super::manifest::new_lock_nonce();
        inner.manifest.store(&self.dir)?;
        inner.tables.push((spec, source));
        inner.journal.clear()?;
        Ok(())
    }

    /// Every chunk hash present in this store (journal plus files)
    pub fn all_hashes(&self) -> Result<Vec<Hash>> {
        let inner = self.inner.lock().unwrap();
        let mut hashes = inner.journal.hashes();
        for (_, source) in &inner.tables {
            hashes.extend(source.hashes());
        }
        hashes.sort();
        hashes.dedup();
        Ok(hashes)
    }

    pub fn is_archived(&self) -> Result<bool> {
        Ok(self.sources()?.iter().any(|s| s.archived))
    }

    /// Replace every table file with a single one holding exactly `live`,
    /// bumping the GC generation and unlinking the old files.
    pub fn swap_tables(&self, live: Vec<(Hash, Vec<u8>)>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let old_files: Vec<String> = inner.manifest.specs.iter().map(|s| s.name.clone()).collect();
        let spec = TableFile::write(&self.dir, &live)?;
        let source = TableSource::open(&self.dir, &spec)?;
        inner.journal.clear()?;
        inner.manifest.specs = vec![spec.clone()];
        inner.manifest.gc_gen += 1;
        inner.manifest.lock = super::manifest::new_lock_nonce();
        inner.manifest.store(&self.dir)?;
        inner.tables = vec![(spec.clone(), source)];
        for name in old_files {
            if name != spec.name {
                let _ = std::fs::remove_file(self.dir.join(name));
            }
        }
        Ok(())
    }

    /// Re-pack all chunks into a single archive file
    pub fn archive(&self) -> Result<()> {
        let hashes = self.all_hashes()?;
        let mut chunks = Vec::with_capacity(hashes.len());
        for hash in hashes {
            chunks.push((hash, self.get(&hash)?));
        }
        let mut inner = self.inner.lock().unwrap();
        let old_files: Vec<String> = inner.manifest.specs.iter().map(|s| s.name.clone()).collect();
        let spec = ArchiveFile::write(&self.dir, &chunks)?;
        let source = TableSource::open(&self.dir, &spec)?;
        inner.journal.clear()?;
        inner.manifest.specs = vec![spec.clone()];
        inner.manifest.lock = super::manifest::new_lock_nonce();
        inner.manifest.store(&self.dir)?;
        inner.tables = vec![(spec.clone(), source)];
        for name in old_files {
            if name != spec.name {
                let _ = std::fs::remove_file(self.dir.join(name));
            }
        }
        Ok(())
    }

    fn get_uncached(&self, hash: &Hash) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(bytes) = inner.journal.get(hash)? {
            ChunkCache::global().put(*hash, bytes.clone());
            return Ok(bytes);
        }
        for (_, source) in &inner.tables {
            if let Some(bytes) = source.get(hash)? {
                ChunkCache::global().put(*hash, bytes.clone());
                return Ok(bytes);
            }
        }
        drop(inner);
        if self.is_ghost(hash) {
            return Err(DoltError::ShallowBoundary(*hash));
        }
        Err(DoltError::chunk_not_found(hash))
    }

    fn persist_ghosts(&self) -> Result<()> {
        let ghosts = self.ghosts.read().unwrap();
        let mut lines: Vec<String> = ghosts.iter().map(|h| h.to_hex()).collect();
        lines.sort();
        let path = self.dir.join(GHOSTS_FILE);
        if lines.is_empty() {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
            return Ok(());
        }
        std::fs::write(path, lines.join("\n") + "\n")?;
        Ok(())
    }
}

fn open_tables(dir: &Path, manifest: &Manifest) -> Result<Vec<(TableSpec, TableSource)>> {
    manifest
        .specs
        .iter()
        .map(|spec| Ok((spec.clone(), TableSource::open(dir, spec)?)))
        .collect()
}

fn load_ghosts(dir: &Path) -> Result<HashSet<Hash>> {
    let path = dir.join(GHOSTS_FILE);
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let contents = std::fs::read_to_string(path)?;
    contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| Hash::from_hex(l.trim()))
        .collect()
}

impl ChunkStore for DiskStore {
    fn has(&self, hash: &Hash) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        if inner.journal.has(hash) {
            return Ok(true);
        }
        Ok(inner.tables.iter().any(|(_, source)| source.has(hash)))
    }

    fn get(&self, hash: &Hash) -> Result<Vec<u8>> {
        if let Some(bytes) = ChunkCache::global().get(hash) {
            return Ok(bytes);
        }
        // Transient read failures retry a bounded number of times before
        // surfacing
        let mut attempt = 0;
        loop {
            match self.get_uncached(hash) {
                Err(DoltError::Io(e)) if attempt < crate::constants::IO_RETRIES => {
                    attempt += 1;
                    log::debug!("chunk read failed (attempt {attempt}): {e}");
                }
                other => return other,
            }
        }
    }

    fn put(&self, bytes: &[u8]) -> Result<Hash> {
        let hash = hasher::hash_buffer(bytes);
        let mut inner = self.inner.lock().unwrap();
        if inner.journal.has(&hash) || inner.tables.iter().any(|(_, s)| s.has(&hash)) {
            return Ok(hash);
        }
        inner.journal.put(hash, bytes)?;
        Ok(hash)
    }

    fn root(&self) -> Result<Option<Hash>> {
        Ok(self.inner.lock().unwrap().manifest.root)
    }

    fn commit_root(&self, old: Option<Hash>, new: Hash) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        // Re-read the manifest so an external writer's CAS is observed
        let on_disk = Manifest::load(&self.dir)?;
        if on_disk.root != old {
            inner.manifest = on_disk;
            return Ok(false);
        }
        inner.manifest = on_disk;
        inner.manifest.root = Some(new);
        inner.manifest.lock = super::manifest::new_lock_nonce();
        inner.manifest.store(&self.dir)?;
        Ok(true)
    }

    fn sources(&self) -> Result<Vec<SourceDesc>> {
        let inner = self.inner.lock().unwrap();
        inner
            .tables
            .iter()
            .map(|(spec, source)| {
                Ok(SourceDesc {
                    name: spec.name.clone(),
                    chunk_count: spec.chunk_count,
                    archived: matches!(source, TableSource::Archive(_)),
                })
            })
            .collect()
    }

    fn rebase(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let manifest = Manifest::load(&self.dir)?;
        let tables = open_tables(&self.dir, &manifest)?;
        inner.manifest = manifest;
        inner.tables = tables;
        *self.ghosts.write().unwrap() = load_ghosts(&self.dir)?;
        Ok(())
    }

    fn ghosts(&self) -> HashSet<Hash> {
        self.ghosts.read().unwrap().clone()
    }

    fn add_ghosts(&self, hashes: &HashSet<Hash>) -> Result<()> {
        self.ghosts.write().unwrap().extend(hashes.iter().copied());
        self.persist_ghosts()
    }

    fn remove_ghosts(&self, hashes: &HashSet<Hash>) -> Result<()> {
        {
            let mut ghosts = self.ghosts.write().unwrap();
            for hash in hashes {
                ghosts.remove(hash);
            }
        }
        self.persist_ghosts()
    }
}

/// In-memory store for tests and scratch work
#[derive(Default)]
pub struct MemStore {
    chunks: RwLock<HashMap<Hash, Vec<u8>>>,
    root: Mutex<Option<Hash>>,
    ghosts: RwLock<HashSet<Hash>>,
}

impl MemStore {
    pub fn new() -> MemStore {
        MemStore::default()
    }
}

impl ChunkStore for MemStore {
    fn has(&self, hash: &Hash) -> Result<bool> {
        Ok(self.chunks.read().unwrap().contains_key(hash))
    }

    fn get(&self, hash: &Hash) -> Result<Vec<u8>> {
        if let Some(bytes) = self.chunks.read().unwrap().get(hash) {
            return Ok(bytes.clone());
        }
        if self.is_ghost(hash) {
            return Err(DoltError::ShallowBoundary(*hash));
        }
        Err(DoltError::chunk_not_found(hash))
    }

    fn put(&self, bytes: &[u8]) -> Result<Hash> {
        let hash = hasher::hash_buffer(bytes);
        self.chunks.write().unwrap().insert(hash, bytes.to_vec());
        Ok(hash)
    }

    fn root(&self) -> Result<Option<Hash>> {
        Ok(*self.root.lock().unwrap())
    }

    fn commit_root(&self, old: Option<Hash>, new: Hash) -> Result<bool> {
        let mut root = self.root.lock().unwrap();
        if *root != old {
            return Ok(false);
        }
        *root = Some(new);
        Ok(true)
    }

    fn sources(&self) -> Result<Vec<SourceDesc>> {
        Ok(vec![])
    }

    fn rebase(&self) -> Result<()> {
        Ok(())
    }

    fn ghosts(&self) -> HashSet<Hash> {
        self.ghosts.read().unwrap().clone()
    }

    fn add_ghosts(&self, hashes: &HashSet<Hash>) -> Result<()> {
        self.ghosts.write().unwrap().extend(hashes.iter().copied());
        Ok(())
    }

    fn remove_ghosts(&self, hashes: &HashSet<Hash>) -> Result<()> {
        let mut ghosts = self.ghosts.write().unwrap();
        for hash in hashes {
            ghosts.remove(hash);
        }
        Ok(())
    }
}
