//! Structural diff of two prolly trees. Both trees are walked with
//! synchronized cursors; whenever the cursors sit at the start of leaves
//! with equal hashes the whole leaf is skipped on both sides, so the cost is
//! proportional to the differing regions, not the tree size.

use crate::core::prolly::{Cursor, ProllyTree};
use crate::error::Result;
use crate::util::cancel::CancelToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffKind {
    Added { new: Vec<u8> },
    Removed { old: Vec<u8> },
    Modified { old: Vec<u8>, new: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEvent {
    pub key: Vec<u8>,
    pub kind: DiffKind,
}

impl DiffEvent {
    pub fn old(&self) -> Option<&[u8]> {
        match &self.kind {
            DiffKind::Added { .. } => None,
            DiffKind::Removed { old } | DiffKind::Modified { old, .. } => Some(old),
        }
    }

    pub fn new(&self) -> Option<&[u8]> {
        match &self.kind {
            DiffKind::Removed { .. } => None,
            DiffKind::Added { new } | DiffKind::Modified { new, .. } => Some(new),
        }
    }
}

/// Diff `from` against `to`: events describe how to turn `from` into `to`,
/// in key order
pub fn diff_trees(
    from: &ProllyTree,
    to: &ProllyTree,
    cancel: &CancelToken,
) -> Result<Vec<DiffEvent>> {
    let mut events = Vec::new();
    if from.root_hash() == to.root_hash() {
        return Ok(events);
    }
    let mut a = Cursor::at_start(from)?;
    let mut b = Cursor::at_start(to)?;
    loop {
        cancel.check()?;
        // Skip aligned identical leaves wholesale
        while let (Some((ha, true)), Some((hb, true))) = (a.leaf_position(), b.leaf_position()) {
            if ha != hb {
                break;
            }
            a.skip_leaf()?;
            b.skip_leaf()?;
        }
        match (a.peek(), b.peek()) {
            (None, None) => break,
            (Some((key, old)), None) => {
                events.push(DiffEvent {
                    key: key.to_vec(),
                    kind: DiffKind::Removed { old: old.to_vec() },
                });
                a.advance()?;
            }
            (None, Some((key, new))) => {
                events.push(DiffEvent {
                    key: key.to_vec(),
                    kind: DiffKind::Added { new: new.to_vec() },
                });
                b.advance()?;
            }
            (Some((ka, old)), Some((kb, new))) => {
                use std::cmp::Ordering;
                match ka.cmp(kb) {
                    Ordering::Less => {
                        events.push(DiffEvent {
                            key: ka.to_vec(),
                            kind: DiffKind::Removed { old: old.to_vec() },
                        });
                        a.advance()?;
                    }
                    Ordering::Greater => {
                        events.push(DiffEvent {
                            key: kb.to_vec(),
                            kind: DiffKind::Added { new: new.to_vec() },
                        });
                        b.advance()?;
                    }
                    Ordering::Equal => {
                        if old != new {
                            events.push(DiffEvent {
                                key: ka.to_vec(),
                                kind: DiffKind::Modified {
                                    old: old.to_vec(),
                                    new: new.to_vec(),
                                },
                            });
                        }
                        a.advance()?;
                        b.advance()?;
                    }
                }
            }
        }
    }
    Ok(events)
}
