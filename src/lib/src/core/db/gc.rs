//! Garbage collection: given the set of chunks reachable from every named
//! ref, pack exactly those into a fresh table file and atomically swap the
//! manifest. Ghost commits are neither traced through nor deleted here; the
//! reachability walk already stopped at them.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::core::db::store::{ChunkStore, DiskStore};
use crate::error::Result;
use crate::model::Hash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcStats {
    pub before: usize,
    pub after: usize,
    pub collected: usize,
}

/// Sweep the store down to `live`. The caller guarantees quiescence: the
/// reachability root was frozen with no transactions in flight.
pub fn collect(store: &DiskStore, live: &HashSet<Hash>) -> Result<GcStats> {
    let before = store.all_hashes()?.len();
    // Read the live set in parallel; puts into the new table file stay
    // single-threaded inside swap_tables
    let chunks: Vec<(Hash, Vec<u8>)> = live
        .par_iter()
        .filter(|hash| !store.is_ghost(hash))
        .map(|hash| Ok((*hash, store.get(hash)?)))
        .collect::<Result<Vec<_>>>()?;
    let after = chunks.len();
    store.swap_tables(chunks)?;
    log::debug!("gc packed {after} live chunks, collected {}", before - after.min(before));
    Ok(GcStats {
        before,
        after,
        collected: before.saturating_sub(after),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::ChunkStore;

    #[test]
    fn test_collect_drops_unreachable_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::create(dir.path()).unwrap();
        let keep = store.put(b"reachable").unwrap();
        let drop_hash = store.put(b"garbage").unwrap();
        store.flush().unwrap();

        let live = HashSet::from([keep]);
        let stats = collect(&store, &live).unwrap();
        assert_eq!(stats.after, 1);
        assert_eq!(stats.collected, 1);
        assert!(store.has(&keep).unwrap());
        assert!(!store.has(&drop_hash).unwrap());
    }

    #[test]
    fn test_gc_generation_bumps() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::create(dir.path()).unwrap();
        store.put(b"x").unwrap();
        collect(&store, &HashSet::new()).unwrap();
        drop(store);
        let manifest = crate::core::db::manifest::Manifest::load(dir.path()).unwrap();
        assert_eq!(manifest.gc_gen, 1);
    }
}
