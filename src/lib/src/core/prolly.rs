//! Prolly trees: probabilistic B-trees over ordered byte tuples. Node
//! boundaries are chosen by a rolling hash of entry bytes, so the tree's
//! shape depends only on its contents: two trees built from the same
//! key/value set are byte-identical regardless of edit order, and
//! structural diff prunes every shared subtree.

pub mod diff;
pub mod merge;
pub mod node;

pub use diff::{diff_trees, DiffEvent, DiffKind};
pub use merge::{three_way_merge, Collision, Resolution};
pub use node::Node;

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::constants::{NODE_BOUNDARY_BITS, NODE_MAX_ENTRIES, NODE_MIN_ENTRIES};
use crate::core::db::StoreRef;
use crate::core::value::chunker::GearChunker;
use crate::error::{DoltError, Result};
use crate::model::Hash;

/// An ordered map from key bytes to value bytes, rooted at a chunk hash.
/// Key comparison is plain byte order; the key codec made that equal to
/// value order.
#[derive(Clone)]
pub struct ProllyTree {
    store: StoreRef,
    root: Option<Hash>,
}

/// A batch of edits: `Some(value)` upserts, `None` deletes
pub type EditMap = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

impl ProllyTree {
    pub fn empty(store: StoreRef) -> ProllyTree {
        ProllyTree { store, root: None }
    }

    pub fn load(store: StoreRef, root: Option<Hash>) -> ProllyTree {
        ProllyTree { store, root }
    }

    pub fn root_hash(&self) -> Option<Hash> {
        self.root
    }

    pub fn store(&self) -> &StoreRef {
        &self.store
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    fn read_node(&self, hash: &Hash) -> Result<Node> {
        Node::decode(&self.store.get(hash)?)
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(mut hash) = self.root else {
            return Ok(None);
        };
        loop {
            match self.read_node(&hash)? {
                Node::Leaf(entries) => {
                    return Ok(entries
                        .binary_search_by(|(k, _)| k.as_slice().cmp(key))
                        .ok()
                        .map(|i| entries[i].1.clone()));
                }
                Node::Internal(children) => {
                    let idx = children
                        .iter()
                        .position(|(last, _)| key <= last.as_slice());
                    match idx {
                        Some(i) => hash = children[i].1,
                        None => return Ok(None),
                    }
                }
            }
        }
    }

    pub fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Ordered scan over `[start, end)` style bounds
    pub fn scan(
        &self,
        start: Bound<Vec<u8>>,
        end: Bound<Vec<u8>>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        let mut cursor = Cursor::at_start(self)?;
        while let Some((key, value)) = cursor.peek() {
            let past_start = match &start {
                Bound::Unbounded => true,
                Bound::Included(s) => key >= s.as_slice(),
                Bound::Excluded(s) => key > s.as_slice(),
            };
            let before_end = match &end {
                Bound::Unbounded => true,
                Bound::Included(e) => key <= e.as_slice(),
                Bound::Excluded(e) => key < e.as_slice(),
            };
            if !before_end {
                break;
            }
            if past_start {
                out.push((key.to_vec(), value.to_vec()));
            }
            cursor.advance()?;
        }
        Ok(out)
    }

    /// Every entry in key order
    pub fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.scan(Bound::Unbounded, Bound::Unbounded)
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }

    /// Apply a batch of edits, returning the new tree. The result is built
    /// from the merged entry stream, so it is byte-identical to a tree built
    /// from scratch over the same final contents.
    pub fn apply(&self, edits: &EditMap) -> Result<ProllyTree> {
        if edits.is_empty() {
            return Ok(self.clone());
        }
        let existing = self.entries()?;
        let mut merged: Vec<(Vec<u8>, Vec<u8>)> =
            Vec::with_capacity(existing.len() + edits.len());
        let mut edit_iter = edits.iter().peekable();
        for (key, value) in existing {
            while let Some((edit_key, _)) = edit_iter.peek() {
                if edit_key.as_slice() < key.as_slice() {
                    let (edit_key, edit_value) = edit_iter.next().unwrap();
                    if let Some(v) = edit_value {
                        merged.push((edit_key.clone(), v.clone()));
                    }
                } else {
                    break;
                }
            }
            match edit_iter.peek() {
                Some((edit_key, _)) if edit_key.as_slice() == key.as_slice() => {
                    let (edit_key, edit_value) = edit_iter.next().unwrap();
                    if let Some(v) = edit_value {
                        merged.push((edit_key.clone(), v.clone()));
                    }
                    // None: deletion, drop the existing entry
                }
                _ => merged.push((key, value)),
            }
        }
        for (edit_key, edit_value) in edit_iter {
            if let Some(v) = edit_value {
                merged.push((edit_key.clone(), v.clone()));
            }
        }
        ProllyTree::from_sorted(self.store.clone(), merged)
    }

    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<ProllyTree> {
        let mut edits = EditMap::new();
        edits.insert(key, Some(value));
        self.apply(&edits)
    }

    pub fn delete(&self, key: &[u8]) -> Result<ProllyTree> {
        let mut edits = EditMap::new();
        edits.insert(key.to_vec(), None);
        self.apply(&edits)
    }

    /// Build a tree from entries already sorted by key
    pub fn from_sorted(store: StoreRef, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Result<ProllyTree> {
        if entries.is_empty() {
            return Ok(ProllyTree { store, root: None });
        }
        debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));

        // Chunk the leaf level
        let mut level: Vec<(Vec<u8>, Hash)> = Vec::new();
        let mut chunker = GearChunker::new(NODE_BOUNDARY_BITS);
        let mut pending: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        for (key, value) in entries {
            chunker.update_slice(&key);
            chunker.update_slice(&value);
            pending.push((key, value));
            let boundary = pending.len() >= NODE_MIN_ENTRIES && chunker.is_boundary();
            if boundary || pending.len() >= NODE_MAX_ENTRIES {
                let node = Node::Leaf(std::mem::take(&mut pending));
                level.push(write_node(&store, node)?);
                chunker.reset();
            }
        }
        if !pending.is_empty() {
            level.push(write_node(&store, Node::Leaf(pending))?);
        }

        // Fold internal levels until a single root remains
        while level.len() > 1 {
            let mut next: Vec<(Vec<u8>, Hash)> = Vec::new();
            let mut chunker = GearChunker::new(NODE_BOUNDARY_BITS);
            let mut pending: Vec<(Vec<u8>, Hash)> = Vec::new();
            for (last_key, hash) in level {
                chunker.update_slice(&last_key);
                chunker.update_slice(hash.as_bytes());
                pending.push((last_key, hash));
                let boundary = pending.len() >= NODE_MIN_ENTRIES && chunker.is_boundary();
                if boundary || pending.len() >= NODE_MAX_ENTRIES {
                    let node = Node::Internal(std::mem::take(&mut pending));
                    next.push(write_node(&store, node)?);
                    chunker.reset();
                }
            }
            if !pending.is_empty() {
                next.push(write_node(&store, Node::Internal(pending))?);
            }
            level = next;
        }

        Ok(ProllyTree {
            store,
            root: Some(level[0].1),
        })
    }
}

fn write_node(store: &StoreRef, node: Node) -> Result<(Vec<u8>, Hash)> {
    let last_key = node
        .last_key()
        .ok_or_else(|| DoltError::Internal("cannot write an empty node".to_string()))?
        .to_vec();
    let hash = store.put(&node.encode())?;
    Ok((last_key, hash))
}

/// A depth-first cursor over a tree's leaf entries, in key order
pub struct Cursor<'a> {
    tree: &'a ProllyTree,
    /// (node, child index) from root to current leaf
    stack: Vec<(Hash, Node, usize)>,
}

impl<'a> Cursor<'a> {
    pub fn at_start(tree: &'a ProllyTree) -> Result<Cursor<'a>> {
        let mut cursor = Cursor {
            tree,
            stack: vec![],
        };
        if let Some(root) = tree.root {
            cursor.descend(root)?;
        }
        Ok(cursor)
    }

    fn descend(&mut self, mut hash: Hash) -> Result<()> {
        loop {
            let node = self.tree.read_node(&hash)?;
            match &node {
                Node::Leaf(_) => {
                    self.stack.push((hash, node, 0));
                    return Ok(());
                }
                Node::Internal(children) => {
                    let first = children[0].1;
                    self.stack.push((hash, node, 0));
                    hash = first;
                }
            }
        }
    }

    pub fn peek(&self) -> Option<(&[u8], &[u8])> {
        let (_, node, idx) = self.stack.last()?;
        match node {
            Node::Leaf(entries) => entries
                .get(*idx)
                .map(|(k, v)| (k.as_slice(), v.as_slice())),
            Node::Internal(_) => None,
        }
    }

    /// Hash of the leaf the cursor sits in, plus whether it sits at entry 0
    pub fn leaf_position(&self) -> Option<(Hash, bool)> {
        let (hash, node, idx) = self.stack.last()?;
        match node {
            Node::Leaf(_) => Some((*hash, *idx == 0)),
            Node::Internal(_) => None,
        }
    }

    pub fn advance(&mut self) -> Result<()> {
        let Some((_, node, idx)) = self.stack.last_mut() else {
            return Ok(());
        };
        if let Node::Leaf(entries) = node {
            *idx += 1;
            if *idx < entries.len() {
                return Ok(());
            }
        }
        self.pop_and_advance()
    }

    /// Jump past the entire current leaf
    pub fn skip_leaf(&mut self) -> Result<()> {
        if self.stack.last().is_some() {
            self.pop_and_advance()?;
        }
        Ok(())
    }

    fn pop_and_advance(&mut self) -> Result<()> {
        self.stack.pop();
        while let Some((_, node, idx)) = self.stack.last_mut() {
            if let Node::Internal(children) = node {
                *idx += 1;
                if *idx < children.len() {
                    let next = children[*idx].1;
                    return self.descend(next);
                }
            }
            self.stack.pop();
        }
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::MemStore;
    use std::sync::Arc;

    fn store() -> StoreRef {
        Arc::new(MemStore::new())
    }

    fn kv(i: u32) -> (Vec<u8>, Vec<u8>) {
        (
            format!("key-{i:06}").into_bytes(),
            format!("value-{i}").into_bytes(),
        )
    }

    #[test]
    fn test_empty_tree() {
        let tree = ProllyTree::empty(store());
        assert!(tree.is_empty());
        assert_eq!(tree.get(b"anything").unwrap(), None);
        assert!(tree.entries().unwrap().is_empty());
    }

    #[test]
    fn test_build_get_scan() {
        let entries: Vec<_> = (0..500).map(kv).collect();
        let tree = ProllyTree::from_sorted(store(), entries.clone()).unwrap();
        for (k, v) in &entries {
            assert_eq!(tree.get(k).unwrap().as_deref(), Some(v.as_slice()));
        }
        assert_eq!(tree.get(b"key-999999x").unwrap(), None);
        assert_eq!(tree.entries().unwrap(), entries);
    }

    #[test]
    fn test_same_contents_same_root_regardless_of_order() {
        let entries: Vec<_> = (0..300).map(kv).collect();
        let all_at_once = ProllyTree::from_sorted(store(), entries.clone()).unwrap();

        // Insert in two batches through apply
        let first_half = ProllyTree::from_sorted(store(), entries[..150].to_vec()).unwrap();
        let mut edits = EditMap::new();
        for (k, v) in &entries[150..] {
            edits.insert(k.clone(), Some(v.clone()));
        }
        let incremental = first_half.apply(&edits).unwrap();

        assert_eq!(all_at_once.root_hash(), incremental.root_hash());
    }

    #[test]
    fn test_apply_put_delete() {
        let tree = ProllyTree::from_sorted(store(), (0..100).map(kv).collect()).unwrap();
        let (k5, _) = kv(5);
        let updated = tree.put(k5.clone(), b"changed".to_vec()).unwrap();
        assert_eq!(updated.get(&k5).unwrap().as_deref(), Some(&b"changed"[..]));
        let deleted = updated.delete(&k5).unwrap();
        assert_eq!(deleted.get(&k5).unwrap(), None);
        assert_eq!(deleted.count().unwrap(), 99);
        // Deleting the only difference restores the original root
        let restored = deleted
            .put(k5.clone(), kv(5).1)
            .unwrap();
        assert_eq!(restored.root_hash(), tree.root_hash());
    }

    #[test]
    fn test_scan_range() {
        let tree = ProllyTree::from_sorted(store(), (0..50).map(kv).collect()).unwrap();
        let found = tree
            .scan(
                Bound::Included(kv(10).0),
                Bound::Excluded(kv(20).0),
            )
            .unwrap();
        assert_eq!(found.len(), 10);
        assert_eq!(found[0].0, kv(10).0);
        assert_eq!(found[9].0, kv(19).0);
    }

    #[test]
    fn test_cursor_walks_all_entries() {
        let entries: Vec<_> = (0..257).map(kv).collect();
        let tree = ProllyTree::from_sorted(store(), entries.clone()).unwrap();
        let mut cursor = Cursor::at_start(&tree).unwrap();
        let mut seen = 0;
        while let Some((k, _)) = cursor.peek() {
            assert_eq!(k, entries[seen].0.as_slice());
            seen += 1;
            cursor.advance().unwrap();
        }
        assert_eq!(seen, entries.len());
        assert!(cursor.is_done());
    }

    #[test]
    fn test_single_edit_shares_most_chunks() {
        let shared = store();
        let entries: Vec<_> = (0..2000).map(kv).collect();
        let a = ProllyTree::from_sorted(shared.clone(), entries.clone()).unwrap();
        let b = a.put(kv(1000).0, b"edited".to_vec()).unwrap();
        assert_ne!(a.root_hash(), b.root_hash());
        // Structural diff sees exactly the one change
        let events = diff_trees(&a, &b, &Default::default()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key, kv(1000).0);
    }
}
