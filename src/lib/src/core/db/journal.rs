//! Append-only chunk journal. Novel chunks land here first; `flush` drains
//! the journal into an immutable table file. A torn tail record (crash mid
//! append) is ignored on replay.
//!
//! Record layout: `hash (20) | raw_len (u32 BE) | zstd_len (u32 BE) | zstd bytes`

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::constants::{JOURNAL_FILE, ZSTD_LEVEL};
use crate::error::{DoltError, Result};
use crate::model::hash::HASH_LEN;
use crate::model::Hash;

const RECORD_HEADER_LEN: usize = HASH_LEN + 4 + 4;

pub struct Journal {
    path: PathBuf,
    file: File,
    /// hash -> (offset of zstd payload, zstd_len, raw_len)
    index: HashMap<Hash, (u64, u32, u32)>,
}

impl Journal {
    pub fn open(dir: impl AsRef<Path>) -> Result<Journal> {
        let path = dir.as_ref().join(JOURNAL_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;
        let index = Journal::replay(&mut file)?;
        Ok(Journal { path, file, index })
    }

    fn replay(file: &mut File) -> Result<HashMap<Hash, (u64, u32, u32)>> {
        let mut index = HashMap::new();
        let len = file.metadata()?.len();
        let mut pos: u64 = 0;
        file.seek(SeekFrom::Start(0))?;
        let mut header = [0u8; RECORD_HEADER_LEN];
        while pos + RECORD_HEADER_LEN as u64 <= len {
            file.read_exact(&mut header)?;
            let hash = Hash(header[..HASH_LEN].try_into().unwrap());
            let raw_len = u32::from_be_bytes(header[HASH_LEN..HASH_LEN + 4].try_into().unwrap());
            let zstd_len =
                u32::from_be_bytes(header[HASH_LEN + 4..HASH_LEN + 8].try_into().unwrap());
            let payload_at = pos + RECORD_HEADER_LEN as u64;
            if payload_at + zstd_len as u64 > len {
                log::debug!("journal has torn tail record at offset {pos}, ignoring");
                break;
            }
            index.insert(hash, (payload_at, zstd_len, raw_len));
            pos = payload_at + zstd_len as u64;
            file.seek(SeekFrom::Start(pos))?;
        }
        Ok(index)
    }

    pub fn has(&self, hash: &Hash) -> bool {
        self.index.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn hashes(&self) -> Vec<Hash> {
        self.index.keys().copied().collect()
    }

    pub fn get(&mut self, hash: &Hash) -> Result<Option<Vec<u8>>> {
        let Some(&(offset, zstd_len, raw_len)) = self.index.get(hash) else {
            return Ok(None);
        };
        let mut compressed = vec![0u8; zstd_len as usize];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut compressed)?;
        let raw = zstd::bulk::decompress(&compressed, raw_len as usize)
            .map_err(|e| DoltError::Internal(format!("journal decompress: {e}")))?;
        Ok(Some(raw))
    }

    pub fn put(&mut self, hash: Hash, raw: &[u8]) -> Result<()> {
        if self.index.contains_key(&hash) {
            return Ok(());
        }
        let compressed = zstd::bulk::compress(raw, ZSTD_LEVEL)
            .map_err(|e| DoltError::Internal(format!("journal compress: {e}")))?;
        let end = self.file.seek(SeekFrom::End(0))?;
        let mut record = Vec::with_capacity(RECORD_HEADER_LEN + compressed.len());
        record.extend_from_slice(hash.as_bytes());
        record.extend_from_slice(&(raw.len() as u32).to_be_bytes());
        record.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
        record.extend_from_slice(&compressed);
        self.file.write_all(&record)?;
        self.file.flush()?;
        self.index.insert(
            hash,
            (
                end + RECORD_HEADER_LEN as u64,
                compressed.len() as u32,
                raw.len() as u32,
            ),
        );
        Ok(())
    }

    /// Drain every record, returning raw chunk bytes for packing
    pub fn drain(&mut self) -> Result<Vec<(Hash, Vec<u8>)>> {
        let hashes = self.hashes();
        let mut out = Vec::with_capacity(hashes.len());
        for hash in hashes {
            if let Some(raw) = self.get(&hash)? {
                out.push((hash, raw));
            }
        }
        Ok(out)
    }

    /// Truncate after a successful flush into a table file
    pub fn clear(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.index.clear();
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::hasher;

    #[test]
    fn test_put_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = Journal::open(dir.path()).unwrap();
        let data = b"some chunk bytes".to_vec();
        let hash = hasher::hash_buffer(&data);
        journal.put(hash, &data).unwrap();
        assert!(journal.has(&hash));
        assert_eq!(journal.get(&hash).unwrap(), Some(data));
    }

    #[test]
    fn test_reopen_replays_index() {
        let dir = tempfile::tempdir().unwrap();
        let data = b"persisted across reopen".to_vec();
        let hash = hasher::hash_buffer(&data);
        {
            let mut journal = Journal::open(dir.path()).unwrap();
            journal.put(hash, &data).unwrap();
        }
        let mut journal = Journal::open(dir.path()).unwrap();
        assert_eq!(journal.get(&hash).unwrap(), Some(data));
    }

    #[test]
    fn test_torn_tail_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let data = b"whole record".to_vec();
        let hash = hasher::hash_buffer(&data);
        {
            let mut journal = Journal::open(dir.path()).unwrap();
            journal.put(hash, &data).unwrap();
        }
        // Simulate a crash mid-append
        let path = dir.path().join(JOURNAL_FILE);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0u8; 12]).unwrap();
        drop(file);

        let mut journal = Journal::open(dir.path()).unwrap();
        assert_eq!(journal.len(), 1);
        assert_eq!(journal.get(&hash).unwrap(), Some(data));
    }
}
