//! Three-way merge of prolly trees. Both sides are diffed against the base
//! and the two ordered edit streams are joined by key: one-sided changes
//! apply cleanly, agreeing changes collapse, and disagreeing changes are
//! handed to the collision callback.

use crate::core::prolly::diff::{diff_trees, DiffEvent};
use crate::core::prolly::{EditMap, ProllyTree};
use crate::error::Result;
use crate::util::cancel::CancelToken;

/// A key changed on both sides, to different results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub key: Vec<u8>,
    pub base: Option<Vec<u8>>,
    pub ours: Option<Vec<u8>>,
    pub theirs: Option<Vec<u8>>,
}

/// What the collision callback decided
pub enum Resolution {
    /// Keep our side (tree is left as-is) and do not record a collision
    Ours,
    /// Take their side
    Theirs,
    /// Replace with an explicit value (`None` deletes)
    Value(Option<Vec<u8>>),
    /// No decision: keep ours and report the collision to the caller
    Record,
}

/// Merge `theirs` into `ours` relative to `base`. Returns the merged tree
/// plus every collision the callback declined to resolve.
pub fn three_way_merge<F>(
    base: &ProllyTree,
    ours: &ProllyTree,
    theirs: &ProllyTree,
    mut collide: F,
    cancel: &CancelToken,
) -> Result<(ProllyTree, Vec<Collision>)>
where
    F: FnMut(&Collision) -> Resolution,
{
    // Fast paths: nothing changed on one side
    if base.root_hash() == theirs.root_hash() {
        return Ok((ours.clone(), vec![]));
    }
    if base.root_hash() == ours.root_hash() {
        return Ok((theirs.clone(), vec![]));
    }

    let our_events = diff_trees(base, ours, cancel)?;
    let their_events = diff_trees(base, theirs, cancel)?;

    let mut edits = EditMap::new();
    let mut collisions = Vec::new();

    let mut ours_iter = our_events.into_iter().peekable();
    let mut theirs_iter = their_events.into_iter().peekable();

    loop {
        cancel.check()?;
        let next = match (ours_iter.peek(), theirs_iter.peek()) {
            (None, None) => break,
            (Some(_), None) => Joined::Ours(ours_iter.next().unwrap()),
            (None, Some(_)) => Joined::Theirs(theirs_iter.next().unwrap()),
            (Some(a), Some(b)) => {
                use std::cmp::Ordering;
                match a.key.cmp(&b.key) {
                    Ordering::Less => Joined::Ours(ours_iter.next().unwrap()),
                    Ordering::Greater => Joined::Theirs(theirs_iter.next().unwrap()),
                    Ordering::Equal => Joined::Both(
                        ours_iter.next().unwrap(),
                        theirs_iter.next().unwrap(),
                    ),
                }
            }
        };
        match next {
            // Changed only on our side: the result starts from ours
            Joined::Ours(_) => {}
            // Changed only on their side: replay onto ours
            Joined::Theirs(event) => {
                edits.insert(event.key.clone(), event.new().map(|v| v.to_vec()));
            }
            Joined::Both(our_event, their_event) => {
                if our_event.new() == their_event.new() {
                    // Both sides agree, ours already has it
                    continue;
                }
                let collision = Collision {
                    key: our_event.key.clone(),
                    base: our_event.old().map(|v| v.to_vec()),
                    ours: our_event.new().map(|v| v.to_vec()),
                    theirs: their_event.new().map(|v| v.to_vec()),
                };
                match collide(&collision) {
                    Resolution::Ours => {}
                    Resolution::Theirs => {
                        edits.insert(
                            collision.key.clone(),
                            collision.theirs.clone(),
                        );
                    }
                    Resolution::Value(value) => {
                        edits.insert(collision.key.clone(), value);
                    }
                    Resolution::Record => collisions.push(collision),
                }
            }
        }
    }

    let merged = ours.apply(&edits)?;
    Ok((merged, collisions))
}

enum Joined {
    Ours(DiffEvent),
    Theirs(DiffEvent),
    Both(DiffEvent, DiffEvent),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::{MemStore, StoreRef};
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

    fn base_tree(s: &StoreRef) -> ProllyTree {
        ProllyTree::from_sorted(s.clone(), (0..100).map(kv).collect()).unwrap()
    }

    #[test]
    fn test_fast_forward_when_ours_unchanged() {
        let s = store();
        let base = base_tree(&s);
        let theirs = base.put(kv(200).0, kv(200).1).unwrap();
        let (merged, collisions) =
            three_way_merge(&base, &base, &theirs, |_| Resolution::Record, &CancelToken::new())
                .unwrap();
        assert!(collisions.is_empty());
        assert_eq!(merged.root_hash(), theirs.root_hash());
    }

    #[test]
    fn test_disjoint_changes_merge_cleanly() {
        let s = store();
        let base = base_tree(&s);
        let ours = base.put(kv(10).0, b"ours".to_vec()).unwrap();
        let theirs = base.delete(&kv(20).0).unwrap();
        let (merged, collisions) =
            three_way_merge(&base, &ours, &theirs, |_| Resolution::Record, &CancelToken::new())
                .unwrap();
        assert!(collisions.is_empty());
        assert_eq!(merged.get(&kv(10).0).unwrap().as_deref(), Some(&b"ours"[..]));
        assert_eq!(merged.get(&kv(20).0).unwrap(), None);
    }

    #[test]
    fn test_agreeing_changes_collapse() {
        let s = store();
        let base = base_tree(&s);
        let ours = base.put(kv(5).0, b"same".to_vec()).unwrap();
        let theirs = base.put(kv(5).0, b"same".to_vec()).unwrap();
        let (merged, collisions) =
            three_way_merge(&base, &ours, &theirs, |_| Resolution::Record, &CancelToken::new())
                .unwrap();
        assert!(collisions.is_empty());
        assert_eq!(merged.root_hash(), ours.root_hash());
    }

    #[test]
    fn test_conflicting_change_is_recorded() {
        let s = store();
        let base = base_tree(&s);
        let ours = base.put(kv(5).0, b"mine".to_vec()).unwrap();
        let theirs = base.put(kv(5).0, b"yours".to_vec()).unwrap();
        let (merged, collisions) =
            three_way_merge(&base, &ours, &theirs, |_| Resolution::Record, &CancelToken::new())
                .unwrap();
        assert_eq!(collisions.len(), 1);
        let c = &collisions[0];
        assert_eq!(c.base.as_deref(), Some(kv(5).1.as_slice()));
        assert_eq!(c.ours.as_deref(), Some(&b"mine"[..]));
        assert_eq!(c.theirs.as_deref(), Some(&b"yours"[..]));
        // Ours wins in the tree until resolved
        assert_eq!(merged.get(&kv(5).0).unwrap().as_deref(), Some(&b"mine"[..]));
    }

    #[test]
    fn test_delete_vs_modify_is_a_collision() {
        let s = store();
        let base = base_tree(&s);
        let ours = base.delete(&kv(7).0).unwrap();
        let theirs = base.put(kv(7).0, b"edited".to_vec()).unwrap();
        let (_, collisions) =
            three_way_merge(&base, &ours, &theirs, |_| Resolution::Record, &CancelToken::new())
                .unwrap();
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].ours, None);
        assert_eq!(collisions[0].theirs.as_deref(), Some(&b"edited"[..]));
    }

    #[test]
    fn test_resolution_theirs_applies() {
        let s = store();
        let base = base_tree(&s);
        let ours = base.put(kv(5).0, b"mine".to_vec()).unwrap();
        let theirs = base.put(kv(5).0, b"yours".to_vec()).unwrap();
        let (merged, collisions) =
            three_way_merge(&base, &ours, &theirs, |_| Resolution::Theirs, &CancelToken::new())
                .unwrap();
        assert!(collisions.is_empty());
        assert_eq!(
            merged.get(&kv(5).0).unwrap().as_deref(),
            Some(&b"yours"[..])
        );
    }
}
