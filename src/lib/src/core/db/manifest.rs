//! The store manifest: one line of colon-separated fields naming the format,
//! the CAS lock nonce, the current root, the table files, and the GC
//! generation. Rewritten through a temp file and an atomic rename so readers
//! never observe a torn update.
//!
//! ```text
//! <FORMAT> : <LOCK> : <ROOT> : <NUMSPECS> : (<hash>:<chunkcount>)* : <GC-GEN>
//! ```

use std::path::{Path, PathBuf};

use crate::constants::{FORMAT_DOLT, FORMAT_DOLT_DEV, FORMAT_LD1, MANIFEST_FILE};
use crate::error::{DoltError, Result};
use crate::model::Hash;

/// A ROOT of all zeroes means the store has no root yet
const EMPTY_ROOT: &str = "0000000000000000000000000000000000000000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Hex name of the table or archive file within the store directory
    pub name: String,
    pub chunk_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub format: String,
    pub lock: String,
    pub root: Option<Hash>,
    pub specs: Vec<TableSpec>,
    pub gc_gen: u64,
}

impl Manifest {
    pub fn new() -> Manifest {
        Manifest {
            format: FORMAT_DOLT.to_string(),
            lock: new_lock_nonce(),
            root: None,
            specs: vec![],
            gc_gen: 0,
        }
    }

    pub fn path(dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref().join(MANIFEST_FILE)
    }

    pub fn exists(dir: impl AsRef<Path>) -> bool {
        Manifest::path(dir).exists()
    }

    pub fn load(dir: impl AsRef<Path>) -> Result<Manifest> {
        let contents = std::fs::read_to_string(Manifest::path(&dir))?;
        let manifest = Manifest::parse(contents.trim())?;
        if manifest.format != FORMAT_DOLT
            && manifest.format != FORMAT_DOLT_DEV
            && manifest.format != FORMAT_LD1
        {
            return Err(DoltError::FormatMismatch {
                found: manifest.format,
                expected: FORMAT_DOLT.to_string(),
            });
        }
        // We read but never write the legacy format
        if manifest.format == FORMAT_LD1 {
            return Err(DoltError::FormatMismatch {
                found: manifest.format,
                expected: FORMAT_DOLT.to_string(),
            });
        }
        Ok(manifest)
    }

    pub fn parse(line: &str) -> Result<Manifest> {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 5 {
            return Err(DoltError::Internal(format!(
                "malformed manifest: {line:?}"
            )));
        }
        let format = fields[0].to_string();
        let lock = fields[1].to_string();
        let root = if fields[2] == EMPTY_ROOT {
            None
        } else {
            Some(Hash::from_hex(fields[2])?)
        };
        let num_specs: usize = fields[3]
            .parse()
            .map_err(|_| DoltError::Internal(format!("bad spec count in manifest: {line:?}")))?;
        if fields.len() != 5 + num_specs * 2 {
            return Err(DoltError::Internal(format!(
                "manifest names {num_specs} specs but carries {} fields",
                fields.len()
            )));
        }
        let mut specs = Vec::with_capacity(num_specs);
        for i in 0..num_specs {
            let name = fields[4 + i * 2].to_string();
            let chunk_count: u32 = fields[5 + i * 2].parse().map_err(|_| {
                DoltError::Internal(format!("bad chunk count for spec {name} in manifest"))
            })?;
            specs.push(TableSpec { name, chunk_count });
        }
        let gc_gen: u64 = fields[4 + num_specs * 2]
            .parse()
            .map_err(|_| DoltError::Internal(format!("bad gc generation in manifest: {line:?}")))?;
        Ok(Manifest {
            format,
            lock,
            root,
            specs,
            gc_gen,
        })
    }

    pub fn render(&self) -> String {
        let mut fields: Vec<String> = vec![
            self.format.clone(),
            self.lock.clone(),
            self.root
                .map(|h| h.to_hex())
                .unwrap_or_else(|| EMPTY_ROOT.to_string()),
            self.specs.len().to_string(),
        ];
        for spec in &self.specs {
            fields.push(spec.name.clone());
            fields.push(spec.chunk_count.to_string());
        }
        fields.push(self.gc_gen.to_string());
        fields.join(":")
    }

    /// Atomic write: temp file in the same directory, then rename over
    pub fn store(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        use std::io::Write;
        writeln!(tmp, "{}", self.render())?;
        tmp.flush()?;
        tmp.persist(Manifest::path(dir))
            .map_err(|e| DoltError::Io(e.error))?;
        Ok(())
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Manifest::new()
    }
}

/// 20-byte hex nonce refreshed on every manifest CAS
pub fn new_lock_nonce() -> String {
    let uuid = uuid::Uuid::new_v4();
    let hash = crate::util::hasher::hash_buffer(uuid.as_bytes());
    hash.to_hex()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_parse_round_trip() {
        let mut manifest = Manifest::new();
        manifest.root = Some(Hash([3u8; 20]));
        manifest.specs.push(TableSpec {
            name: "ab".repeat(20),
            chunk_count: 17,
        });
        manifest.gc_gen = 2;
        let parsed = Manifest::parse(&manifest.render()).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_empty_root_round_trip() {
        let manifest = Manifest::new();
        let parsed = Manifest::parse(&manifest.render()).unwrap();
        assert_eq!(parsed.root, None);
    }

    #[test]
    fn test_store_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = Manifest::new();
        manifest.root = Some(Hash([9u8; 20]));
        manifest.store(dir.path()).unwrap();
        let loaded = Manifest::load(dir.path()).unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn test_unknown_format_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = Manifest::new();
        manifest.format = "__FUTURE__".to_string();
        manifest.store(dir.path()).unwrap();
        assert!(matches!(
            Manifest::load(dir.path()),
            Err(DoltError::FormatMismatch { .. })
        ));
    }
}
