//! Immutable table files: a run of zstd-compressed chunks followed by a
//! binary footer index. Files are named by the hex hash of their index so a
//! table file's name is as content-addressed as its chunks.
//!
//! ```text
//! [zstd chunk]* [hash(20) offset(u64) len(u32)]* chunk_count(u32) total_bytes(u64) magic(8)
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::constants::{TABLE_FILE_MAGIC, ZSTD_LEVEL};
use crate::core::db::manifest::TableSpec;
use crate::error::{DoltError, Result};
use crate::model::hash::HASH_LEN;
use crate::model::Hash;
use crate::util::hasher;

const INDEX_ENTRY_LEN: usize = HASH_LEN + 8 + 4;
const FOOTER_TAIL_LEN: usize = 4 + 8 + 8;

pub struct TableFile {
    path: PathBuf,
    /// hash -> (offset, compressed len)
    index: HashMap<Hash, (u64, u32)>,
}

impl TableFile {
    /// Pack raw chunks into a new table file under `dir`, returning its spec
    pub fn write(dir: impl AsRef<Path>, chunks: &[(Hash, Vec<u8>)]) -> Result<TableSpec> {
        let mut sorted: Vec<&(Hash, Vec<u8>)> = chunks.iter().collect();
        sorted.sort_by_key(|(hash, _)| *hash);

        let mut data: Vec<u8> = Vec::new();
        let mut index_bytes: Vec<u8> = Vec::new();
        let mut count: u32 = 0;
        for (hash, raw) in sorted {
            let compressed = zstd::bulk::compress(raw, ZSTD_LEVEL)
                .map_err(|e| DoltError::Internal(format!("table file compress: {e}")))?;
            index_bytes.extend_from_slice(hash.as_bytes());
            index_bytes.extend_from_slice(&(data.len() as u64).to_be_bytes());
            index_bytes.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
            data.extend_from_slice(&compressed);
            count += 1;
        }

        let name = hasher::hash_buffer(&index_bytes).to_hex();
        let path = dir.as_ref().join(&name);
        let mut file = File::create(&path)?;
        file.write_all(&data)?;
        file.write_all(&index_bytes)?;
        file.write_all(&count.to_be_bytes())?;
        file.write_all(&(data.len() as u64).to_be_bytes())?;
        file.write_all(TABLE_FILE_MAGIC)?;
        file.flush()?;

        Ok(TableSpec {
            name,
            chunk_count: count,
        })
    }

    pub fn open(dir: impl AsRef<Path>, spec: &TableSpec) -> Result<TableFile> {
        let path = dir.as_ref().join(&spec.name);
        let mut file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        if file_len < FOOTER_TAIL_LEN as u64 {
            return Err(DoltError::Internal(format!(
                "table file {} too short",
                spec.name
            )));
        }
        let mut tail = [0u8; FOOTER_TAIL_LEN];
        file.seek(SeekFrom::End(-(FOOTER_TAIL_LEN as i64)))?;
        file.read_exact(&mut tail)?;
        if &tail[12..] != TABLE_FILE_MAGIC {
            return Err(DoltError::Internal(format!(
                "table file {} has bad magic",
                spec.name
            )));
        }
        let count = u32::from_be_bytes(tail[..4].try_into().unwrap());
        if count != spec.chunk_count {
            return Err(DoltError::Internal(format!(
                "table file {} chunk count {} does not match manifest {}",
                spec.name, count, spec.chunk_count
            )));
        }
        let index_len = count as usize * INDEX_ENTRY_LEN;
        file.seek(SeekFrom::End(-((FOOTER_TAIL_LEN + index_len) as i64)))?;
        let mut index_bytes = vec![0u8; index_len];
        file.read_exact(&mut index_bytes)?;

        let mut index = HashMap::with_capacity(count as usize);
        for entry in index_bytes.chunks(INDEX_ENTRY_LEN) {
            let hash = Hash(entry[..HASH_LEN].try_into().unwrap());
            let offset = u64::from_be_bytes(entry[HASH_LEN..HASH_LEN + 8].try_into().unwrap());
            let len = u32::from_be_bytes(entry[HASH_LEN + 8..].try_into().unwrap());
            index.insert(hash, (offset, len));
        }
        Ok(TableFile { path, index })
    }

    pub fn has(&self, hash: &Hash) -> bool {
        self.index.contains_key(hash)
    }

    pub fn chunk_count(&self) -> usize {
        self.index.len()
    }

    pub fn hashes(&self) -> Vec<Hash> {
        self.index.keys().copied().collect()
    }

    pub fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>> {
        let Some(&(offset, len)) = self.index.get(hash) else {
            return Ok(None);
        };
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut compressed = vec![0u8; len as usize];
        file.read_exact(&mut compressed)?;
        let raw = zstd::stream::decode_all(&compressed[..])
            .map_err(|e| DoltError::Internal(format!("table file decompress: {e}")))?;
        Ok(Some(raw))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(data: &[u8]) -> (Hash, Vec<u8>) {
        (hasher::hash_buffer(data), data.to_vec())
    }

    #[test]
    fn test_write_open_get() {
        let dir = tempfile::tempdir().unwrap();
        let chunks = vec![chunk(b"alpha"), chunk(b"beta"), chunk(b"gamma")];
        let spec = TableFile::write(dir.path(), &chunks).unwrap();
        assert_eq!(spec.chunk_count, 3);

        let table = TableFile::open(dir.path(), &spec).unwrap();
        for (hash, raw) in &chunks {
            assert!(table.has(hash));
            assert_eq!(table.get(hash).unwrap().as_deref(), Some(raw.as_slice()));
        }
        assert!(table.get(&Hash([0u8; 20])).unwrap().is_none());
    }

    #[test]
    fn test_name_is_deterministic_for_same_chunk_set() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let chunks = vec![chunk(b"one"), chunk(b"two")];
        let mut reversed = chunks.clone();
        reversed.reverse();
        let a = TableFile::write(dir_a.path(), &chunks).unwrap();
        let b = TableFile::write(dir_b.path(), &reversed).unwrap();
        assert_eq!(a.name, b.name);
    }
}
