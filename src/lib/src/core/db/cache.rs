//! Process-wide LRU cache over decoded chunks, keyed by hash. Initialized at
//! database open, shared by every store handle in the process, safe for
//! parallel readers and writers.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::constants::CHUNK_CACHE_CAPACITY;
use crate::model::Hash;

pub struct ChunkCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    capacity: usize,
    clock: u64,
    entries: HashMap<Hash, (Vec<u8>, u64)>,
}

impl ChunkCache {
    pub fn with_capacity(capacity: usize) -> ChunkCache {
        ChunkCache {
            inner: Mutex::new(CacheInner {
                capacity,
                clock: 0,
                entries: HashMap::new(),
            }),
        }
    }

    pub fn global() -> &'static ChunkCache {
        static CACHE: OnceLock<ChunkCache> = OnceLock::new();
        CACHE.get_or_init(|| ChunkCache::with_capacity(CHUNK_CACHE_CAPACITY))
    }

    pub fn get(&self, hash: &Hash) -> Option<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let clock = inner.clock;
        let entry = inner.entries.get_mut(hash)?;
        entry.1 = clock;
        Some(entry.0.clone())
    }

    pub fn put(&self, hash: Hash, bytes: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let clock = inner.clock;
        inner.entries.insert(hash, (bytes, clock));
        if inner.entries.len() > inner.capacity {
            // Evict the least recently used entry
            if let Some(oldest) = inner
                .entries
                .iter()
                .min_by_key(|(_, (_, used))| *used)
                .map(|(h, _)| *h)
            {
                inner.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_evicts_oldest() {
        let cache = ChunkCache::with_capacity(2);
        let h = |b: u8| Hash([b; 20]);
        cache.put(h(1), vec![1]);
        cache.put(h(2), vec![2]);
        cache.get(&h(1));
        cache.put(h(3), vec![3]);
        assert!(cache.get(&h(2)).is_none());
        assert!(cache.get(&h(1)).is_some());
        assert!(cache.get(&h(3)).is_some());
    }
}
