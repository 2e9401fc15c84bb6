//! Archive files: a table file re-packed with a shared zstd dictionary
//! trained over a sample of its chunks. History-heavy stores carry many
//! near-identical chunks, so a trained dictionary beats chunk-at-a-time
//! compression by a wide margin.
//!
//! ```text
//! dict_len(u32) [plain zstd dict] [dict-compressed chunk]*
//! [hash(20) offset(u64) len(u32)]* chunk_count(u32) total_bytes(u64) magic(8)
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::constants::{ARCHIVE_FILE_MAGIC, ARCHIVE_MIN_SAMPLES, ZSTD_LEVEL};
use crate::core::db::manifest::TableSpec;
use crate::error::{DoltError, Result};
use crate::model::hash::HASH_LEN;
use crate::model::Hash;
use crate::util::hasher;

const INDEX_ENTRY_LEN: usize = HASH_LEN + 8 + 4;
const FOOTER_TAIL_LEN: usize = 4 + 8 + 8;
const DICT_MAX_BYTES: usize = 16 * 1024;

pub struct ArchiveFile {
    path: PathBuf,
    dict: Vec<u8>,
    data_start: u64,
    index: HashMap<Hash, (u64, u32)>,
}

impl ArchiveFile {
    /// Re-pack raw chunks around a trained dictionary. Requires at least
    /// `ARCHIVE_MIN_SAMPLES` chunks to train on; smaller stores fail
    /// explicitly rather than producing a useless dictionary.
    pub fn write(dir: impl AsRef<Path>, chunks: &[(Hash, Vec<u8>)]) -> Result<TableSpec> {
        if chunks.len() < ARCHIVE_MIN_SAMPLES {
            return Err(DoltError::InvalidArgument(format!(
                "archive requires at least {ARCHIVE_MIN_SAMPLES} chunks to train a dictionary, have {}",
                chunks.len()
            )));
        }
        let samples: Vec<&[u8]> = chunks.iter().map(|(_, raw)| raw.as_slice()).collect();
        let dict = zstd::dict::from_samples(&samples, DICT_MAX_BYTES)
            .map_err(|e| DoltError::Internal(format!("dictionary training: {e}")))?;

        let mut sorted: Vec<&(Hash, Vec<u8>)> = chunks.iter().collect();
        sorted.sort_by_key(|(hash, _)| *hash);

        let mut compressor = zstd::bulk::Compressor::with_dictionary(ZSTD_LEVEL, &dict)
            .map_err(|e| DoltError::Internal(format!("archive compressor: {e}")))?;

        let mut data: Vec<u8> = Vec::new();
        let mut index_bytes: Vec<u8> = Vec::new();
        for (hash, raw) in &sorted {
            let compressed = compressor
                .compress(raw)
                .map_err(|e| DoltError::Internal(format!("archive compress: {e}")))?;
            index_bytes.extend_from_slice(hash.as_bytes());
            index_bytes.extend_from_slice(&(data.len() as u64).to_be_bytes());
            index_bytes.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
            data.extend_from_slice(&compressed);
        }

        let name = hasher::hash_buffer(&index_bytes).to_hex();
        let path = dir.as_ref().join(&name);
        let mut file = File::create(&path)?;
        file.write_all(&(dict.len() as u32).to_be_bytes())?;
        file.write_all(&dict)?;
        file.write_all(&data)?;
        file.write_all(&index_bytes)?;
        file.write_all(&(sorted.len() as u32).to_be_bytes())?;
        file.write_all(&(data.len() as u64).to_be_bytes())?;
        file.write_all(ARCHIVE_FILE_MAGIC)?;
        file.flush()?;

        Ok(TableSpec {
            name,
            chunk_count: sorted.len() as u32,
        })
    }

    pub fn open(dir: impl AsRef<Path>, spec: &TableSpec) -> Result<ArchiveFile> {
        let path = dir.as_ref().join(&spec.name);
        let mut file = File::open(&path)?;
        let mut tail = [0u8; FOOTER_TAIL_LEN];
        file.seek(SeekFrom::End(-(FOOTER_TAIL_LEN as i64)))?;
        file.read_exact(&mut tail)?;
        if &tail[12..] != ARCHIVE_FILE_MAGIC {
            return Err(DoltError::Internal(format!(
                "archive file {} has bad magic",
                spec.name
            )));
        }
        let count = u32::from_be_bytes(tail[..4].try_into().unwrap());
        let index_len = count as usize * INDEX_ENTRY_LEN;
        file.seek(SeekFrom::End(-((FOOTER_TAIL_LEN + index_len) as i64)))?;
        let mut index_bytes = vec![0u8; index_len];
        file.read_exact(&mut index_bytes)?;

        file.seek(SeekFrom::Start(0))?;
        let mut dict_len_bytes = [0u8; 4];
        file.read_exact(&mut dict_len_bytes)?;
        let dict_len = u32::from_be_bytes(dict_len_bytes) as usize;
        let mut dict = vec![0u8; dict_len];
        file.read_exact(&mut dict)?;

        let mut index = HashMap::with_capacity(count as usize);
        for entry in index_bytes.chunks(INDEX_ENTRY_LEN) {
            let hash = Hash(entry[..HASH_LEN].try_into().unwrap());
            let offset = u64::from_be_bytes(entry[HASH_LEN..HASH_LEN + 8].try_into().unwrap());
            let len = u32::from_be_bytes(entry[HASH_LEN + 8..].try_into().unwrap());
            index.insert(hash, (offset, len));
        }
        Ok(ArchiveFile {
            path,
            dict,
            data_start: 4 + dict_len as u64,
            index,
        })
    }

    /// Peek the footer magic to tell an archive from a plain table file
    pub fn is_archive(dir: impl AsRef<Path>, name: &str) -> Result<bool> {
        let path = dir.as_ref().join(name);
        let mut file = File::open(path)?;
        let mut tail = [0u8; FOOTER_TAIL_LEN];
        file.seek(SeekFrom::End(-(FOOTER_TAIL_LEN as i64)))?;
        file.read_exact(&mut tail)?;
        Ok(&tail[12..] == ARCHIVE_FILE_MAGIC)
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
        file.seek(SeekFrom::Start(self.data_start + offset))?;
        let mut compressed = vec![0u8; len as usize];
        file.read_exact(&mut compressed)?;
        let mut decompressor = zstd::bulk::Decompressor::with_dictionary(&self.dict)
            .map_err(|e| DoltError::Internal(format!("archive decompressor: {e}")))?;
        let raw = decompressor
            .decompress(&compressed, 64 * 1024 * 1024)
            .map_err(|e| DoltError::Internal(format!("archive decompress: {e}")))?;
        Ok(Some(raw))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
