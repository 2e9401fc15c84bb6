//! Content-defined chunk boundaries via a Gear rolling hash. The same byte
//! stream always splits at the same offsets, so inserting data shifts only
//! the chunks around the edit, and identical suffixes keep identical chunk
//! hashes. Large blobs are spilled into balanced trees of byte chunks.

use std::sync::OnceLock;

use crate::constants::VALUE_CHUNK_TARGET;
use crate::core::value::Value;
use crate::error::{DoltError, Result};
use crate::model::Hash;
use crate::util::hasher;

/// 256-entry table for the Gear rolling hash, derived from the digest of the
/// byte index so every build agrees on it.
fn gear_table() -> &'static [u64; 256] {
    static TABLE: OnceLock<[u64; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u64; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = hasher::hash_u64(&(i as u16).to_le_bytes());
        }
        table
    })
}

/// Rolling boundary detector. Feed bytes; `boundary` fires when the low
/// `mask_bits` of the gear hash are all zero.
pub struct GearChunker {
    gear: u64,
    mask: u64,
}

impl GearChunker {
    pub fn new(mask_bits: u32) -> GearChunker {
        GearChunker {
            gear: 0,
            mask: (1u64 << mask_bits) - 1,
        }
    }

    pub fn update(&mut self, byte: u8) {
        self.gear = (self.gear << 1).wrapping_add(gear_table()[byte as usize]);
    }

    pub fn update_slice(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.update(b);
        }
    }

    pub fn is_boundary(&self) -> bool {
        self.gear & self.mask == 0
    }

    pub fn reset(&mut self) {
        self.gear = 0;
    }
}

const BLOB_BOUNDARY_BITS: u32 = 12; // ~4 KiB average leaf
const BLOB_MAX_CHUNK: usize = 4 * VALUE_CHUNK_TARGET;
const BLOB_FANOUT: usize = 64;

/// Does this value need to be spilled before it can inline into a row?
pub fn needs_spill(value: &Value) -> bool {
    match value {
        Value::Text(s) => s.len() > VALUE_CHUNK_TARGET,
        Value::Blob(b) => b.len() > VALUE_CHUNK_TARGET,
        _ => false,
    }
}

/// Write a large byte sequence as a balanced tree of content-defined chunks
/// and return its root address. `put` persists one chunk.
pub fn write_blob(bytes: &[u8], put: &mut dyn FnMut(&[u8]) -> Result<Hash>) -> Result<(Hash, u64)> {
    let mut leaves: Vec<Hash> = Vec::new();
    let mut chunker = GearChunker::new(BLOB_BOUNDARY_BITS);
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        chunker.update(b);
        let len = i - start + 1;
        if (chunker.is_boundary() && len >= VALUE_CHUNK_TARGET / 4)
            || len >= BLOB_MAX_CHUNK
            || i == bytes.len() - 1
        {
            let mut chunk = Vec::with_capacity(len + 1);
            chunk.push(0u8); // leaf marker
            chunk.extend_from_slice(&bytes[start..=i]);
            leaves.push(put(&chunk)?);
            start = i + 1;
            chunker.reset();
        }
    }
    if bytes.is_empty() {
        leaves.push(put(&[0u8])?);
    }

    // Fold leaf addresses into interior nodes until one root remains
    let mut level = leaves;
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len() / BLOB_FANOUT + 1);
        for group in level.chunks(BLOB_FANOUT) {
            let mut node = Vec::with_capacity(1 + group.len() * 20);
            node.push(1u8); // interior marker
            for hash in group {
                node.extend_from_slice(hash.as_bytes());
            }
            next.push(put(&node)?);
        }
        level = next;
    }
    Ok((level[0], bytes.len() as u64))
}

/// Reassemble a spilled blob from its root address
pub fn read_blob(root: &Hash, get: &dyn Fn(&Hash) -> Result<Vec<u8>>) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    read_blob_node(root, get, &mut out)?;
    Ok(out)
}

fn read_blob_node(
    hash: &Hash,
    get: &dyn Fn(&Hash) -> Result<Vec<u8>>,
    out: &mut Vec<u8>,
) -> Result<()> {
    let node = get(hash)?;
    match node.first() {
        Some(0) => out.extend_from_slice(&node[1..]),
        Some(1) => {
            for child in node[1..].chunks(20) {
                let child_hash = Hash(
                    child
                        .try_into()
                        .map_err(|_| DoltError::Internal("malformed blob node".to_string()))?,
                );
                read_blob_node(&child_hash, get, out)?;
            }
        }
        _ => return Err(DoltError::Internal("empty blob node".to_string())),
    }
    Ok(())
}

/// Spill a value if it is oversized, returning the inline replacement
pub fn spill_value(value: Value, put: &mut dyn FnMut(&[u8]) -> Result<Hash>) -> Result<Value> {
    if !needs_spill(&value) {
        return Ok(value);
    }
    let bytes = match &value {
        Value::Text(s) => s.as_bytes().to_vec(),
        Value::Blob(b) => b.clone(),
        _ => unreachable!(),
    };
    let (hash, len) = write_blob(&bytes, put)?;
    Ok(Value::BlobRef { hash, len })
}

/// Load a spilled value back; text-ness is the reader's call via the schema
pub fn unspill_value(value: &Value, get: &dyn Fn(&Hash) -> Result<Vec<u8>>) -> Result<Value> {
    match value {
        Value::BlobRef { hash, .. } => Ok(Value::Blob(read_blob(hash, get)?)),
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn mem_store() -> (
        std::rc::Rc<std::cell::RefCell<HashMap<Hash, Vec<u8>>>>,
        impl FnMut(&[u8]) -> Result<Hash>,
    ) {
        let store = std::rc::Rc::new(std::cell::RefCell::new(HashMap::new()));
        let writer = {
            let store = store.clone();
            move |bytes: &[u8]| {
                let hash = hasher::hash_buffer(bytes);
                store.borrow_mut().insert(hash, bytes.to_vec());
                Ok(hash)
            }
        };
        (store, writer)
    }

    #[test]
    fn test_blob_round_trip() {
        let (store, mut put) = mem_store();
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let (root, len) = write_blob(&data, &mut put).unwrap();
        assert_eq!(len, data.len() as u64);
        let get = |h: &Hash| {
            store
                .borrow()
                .get(h)
                .cloned()
                .ok_or_else(|| DoltError::chunk_not_found(h))
        };
        assert_eq!(read_blob(&root, &get).unwrap(), data);
    }

    #[test]
    fn test_identical_blobs_share_root() {
        let (_, mut put) = mem_store();
        let data: Vec<u8> = (0..50_000u32).map(|i| (i % 13) as u8).collect();
        let (a, _) = write_blob(&data, &mut put).unwrap();
        let (b, _) = write_blob(&data, &mut put).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_suffix_edit_leaves_prefix_chunks_alone() {
        let (store_a, mut put_a) = mem_store();
        let data: Vec<u8> = (0..200_000u32).map(|i| (i * 7 % 256) as u8).collect();
        write_blob(&data, &mut put_a).unwrap();

        let (store_b, mut put_b) = mem_store();
        let mut edited = data.clone();
        edited.extend_from_slice(b"trailing edit");
        write_blob(&edited, &mut put_b).unwrap();

        let a_keys: std::collections::HashSet<Hash> =
            store_a.borrow().keys().copied().collect();
        let b_keys: std::collections::HashSet<Hash> =
            store_b.borrow().keys().copied().collect();
        let shared = a_keys.intersection(&b_keys).count();
        assert!(shared > 0, "edit at the tail should reuse leading chunks");
    }
}
