//! Reads commits and walks the commit graph: history traversal, ancestry
//! tests, and merge-base selection. Traversal never crosses a ghost commit;
//! history reports the boundary and merge-base surfaces it as an error.

use std::collections::{HashSet, VecDeque};

use crate::core::db::StoreRef;
use crate::error::{DoltError, Result};
use crate::model::{Commit, Hash, StoredCommit, StoredTag};

/// A history walk: commits in reverse topological order, newest first, plus
/// the ghost hash the walk stopped at, if any.
#[derive(Debug, Clone)]
pub struct History {
    pub commits: Vec<Commit>,
    pub shallow_boundary: Option<Hash>,
}

pub struct CommitReader {
    store: StoreRef,
}

impl CommitReader {
    pub fn new(store: StoreRef) -> CommitReader {
        CommitReader { store }
    }

    pub fn store(&self) -> &StoreRef {
        &self.store
    }

    pub fn get_commit(&self, id: &Hash) -> Result<Commit> {
        let bytes = self.store.get(id)?;
        let stored: StoredCommit = serde_json::from_slice(&bytes)
            .map_err(|_| DoltError::commit_not_found(id))?;
        Ok(Commit::from_stored(*id, stored))
    }

    pub fn get_commit_opt(&self, id: &Hash) -> Result<Option<Commit>> {
        match self.get_commit(id) {
            Ok(commit) => Ok(Some(commit)),
            Err(DoltError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Resolve a hash that may name an annotated tag object to its commit
    pub fn peel_to_commit(&self, id: &Hash) -> Result<Commit> {
        let bytes = self.store.get(id)?;
        if let Ok(tag) = serde_json::from_slice::<StoredTag>(&bytes) {
            return self.get_commit(&tag.commit);
        }
        let stored: StoredCommit =
            serde_json::from_slice(&bytes).map_err(|_| DoltError::commit_not_found(id))?;
        Ok(Commit::from_stored(*id, stored))
    }

    /// Walk ancestors breadth-first in reverse topological order,
    /// deduplicated, halting quietly at ghost commits
    pub fn history_from(&self, id: &Hash) -> Result<History> {
        let mut commits = Vec::new();
        let mut seen: HashSet<Hash> = HashSet::new();
        let mut queue: VecDeque<Hash> = VecDeque::from([*id]);
        let mut shallow_boundary = None;
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            if self.store.is_ghost(&next) {
                shallow_boundary.get_or_insert(next);
                continue;
            }
            let commit = self.get_commit(&next)?;
            for parent in &commit.parent_ids {
                queue.push_back(*parent);
            }
            commits.push(commit);
        }
        // Newest first by committer timestamp, stable on ties
        commits.sort_by(|a, b| {
            b.committer
                .timestamp
                .cmp(&a.committer.timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(History {
            commits,
            shallow_boundary,
        })
    }

    /// The set of ancestor hashes of `id`, including itself.
    /// `strict` errors at a ghost boundary instead of stopping.
    pub fn ancestor_set(&self, id: &Hash, strict: bool) -> Result<HashSet<Hash>> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([*id]);
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            if self.store.is_ghost(&next) {
                if strict {
                    return Err(DoltError::ShallowBoundary(next));
                }
                seen.remove(&next);
                continue;
            }
            let commit = self.get_commit(&next)?;
            queue.extend(commit.parent_ids.iter().copied());
        }
        Ok(seen)
    }

    /// Is `ancestor` reachable from `descendant`?
    pub fn is_ancestor(&self, ancestor: &Hash, descendant: &Hash) -> Result<bool> {
        Ok(self.ancestor_set(descendant, false)?.contains(ancestor))
    }

    /// Commit A fast-forwards to B iff A is an ancestor of B
    pub fn can_fast_forward(&self, from: &Hash, to: &Hash) -> Result<bool> {
        self.is_ancestor(from, to)
    }

    /// Classic merge-base: among common ancestors keep those that are not an
    /// ancestor of another candidate, then break ties by committer timestamp
    /// (newest) and lexicographic hash.
    pub fn merge_base(&self, a: &Hash, b: &Hash) -> Result<Commit> {
        let ancestors_a = self.ancestor_set(a, true)?;
        let ancestors_b = self.ancestor_set(b, true)?;
        let common: Vec<Hash> = ancestors_a.intersection(&ancestors_b).copied().collect();
        if common.is_empty() {
            return Err(DoltError::NotFound(format!(
                "no common ancestor of {} and {}",
                a.short(),
                b.short()
            )));
        }
        // Drop any candidate that another candidate can reach
        let common_set: HashSet<Hash> = common.iter().copied().collect();
        let mut dominated: HashSet<Hash> = HashSet::new();
        for candidate in &common {
            let commit = self.get_commit(candidate)?;
            let mut queue: VecDeque<Hash> = commit.parent_ids.iter().copied().collect();
            let mut seen = HashSet::new();
            while let Some(next) = queue.pop_front() {
                if !seen.insert(next) || self.store.is_ghost(&next) {
                    continue;
                }
                if common_set.contains(&next) {
                    dominated.insert(next);
                }
                if let Some(c) = self.get_commit_opt(&next)? {
                    queue.extend(c.parent_ids.iter().copied());
                }
            }
        }
        let mut candidates: Vec<Commit> = common
            .iter()
            .filter(|h| !dominated.contains(h))
            .map(|h| self.get_commit(h))
            .collect::<Result<_>>()?;
        candidates.sort_by(|x, y| {
            y.committer
                .timestamp
                .cmp(&x.committer.timestamp)
                .then_with(|| x.id.cmp(&y.id))
        });
        Ok(candidates.remove(0))
    }

    /// Commits reachable from `head` but not from `base`, oldest first:
    /// the range a rebase replays
    pub fn commits_between(&self, base: &Hash, head: &Hash) -> Result<Vec<Commit>> {
        let base_set = self.ancestor_set(base, false)?;
        let history = self.history_from(head)?;
        let mut range: Vec<Commit> = history
            .commits
            .into_iter()
            .filter(|c| !base_set.contains(&c.id))
            .collect();
        range.reverse();
        Ok(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::{MemStore, StoreRef};
    use crate::core::index::commit_writer::{signature, CommitWriter};
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn store() -> StoreRef {
        Arc::new(MemStore::new())
    }

    fn make_commit(
        writer: &CommitWriter,
        parents: Vec<Hash>,
        message: &str,
        minutes: i64,
    ) -> Commit {
        let when = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes);
        let root = Hash([0xaa; 20]);
        writer
            .write_commit(StoredCommit {
                root,
                parents,
                author: signature("tester", "t@example.com", Some(when)),
                committer: signature("tester", "t@example.com", Some(when)),
                message: message.to_string(),
                signature: None,
            })
            .unwrap()
    }

    #[test]
    fn test_history_linear() {
        let s = store();
        let writer = CommitWriter::new(s.clone());
        let reader = CommitReader::new(s.clone());
        let c1 = make_commit(&writer, vec![], "c1", 0);
        let c2 = make_commit(&writer, vec![c1.id], "c2", 1);
        let c3 = make_commit(&writer, vec![c2.id], "c3", 2);

        let history = reader.history_from(&c3.id).unwrap();
        assert_eq!(
            history.commits.iter().map(|c| &c.message).collect::<Vec<_>>(),
            vec!["c3", "c2", "c1"]
        );
        assert!(history.shallow_boundary.is_none());
    }

    #[test]
    fn test_ancestors_never_contain_self_strictly_below() {
        let s = store();
        let writer = CommitWriter::new(s.clone());
        let reader = CommitReader::new(s.clone());
        let c1 = make_commit(&writer, vec![], "c1", 0);
        let c2 = make_commit(&writer, vec![c1.id], "c2", 1);
        let history = reader.history_from(&c2.id).unwrap();
        // The walk includes the tip itself; strict ancestors exclude it
        let strict: Vec<&Commit> = history.commits.iter().filter(|c| c.id != c2.id).collect();
        assert!(strict.iter().all(|c| c.id != c2.id));
    }

    #[test]
    fn test_merge_base_simple_fork() {
        let s = store();
        let writer = CommitWriter::new(s.clone());
        let reader = CommitReader::new(s.clone());
        let base = make_commit(&writer, vec![], "base", 0);
        let left = make_commit(&writer, vec![base.id], "left", 1);
        let right = make_commit(&writer, vec![base.id], "right", 2);

        let found = reader.merge_base(&left.id, &right.id).unwrap();
        assert_eq!(found.id, base.id);
        assert!(reader.can_fast_forward(&base.id, &left.id).unwrap());
        assert!(!reader.can_fast_forward(&left.id, &right.id).unwrap());
    }

    #[test]
    fn test_merge_base_prefers_nearest() {
        let s = store();
        let writer = CommitWriter::new(s.clone());
        let reader = CommitReader::new(s.clone());
        let root = make_commit(&writer, vec![], "root", 0);
        let mid = make_commit(&writer, vec![root.id], "mid", 1);
        let left = make_commit(&writer, vec![mid.id], "left", 2);
        let right = make_commit(&writer, vec![mid.id], "right", 3);
        // root is a common ancestor too, but mid dominates it
        let found = reader.merge_base(&left.id, &right.id).unwrap();
        assert_eq!(found.id, mid.id);
    }

    #[test]
    fn test_history_stops_at_ghost() {
        let s = store();
        let writer = CommitWriter::new(s.clone());
        let reader = CommitReader::new(s.clone());
        let c1 = make_commit(&writer, vec![], "c1", 0);
        let c2 = make_commit(&writer, vec![c1.id], "c2", 1);
        let c3 = make_commit(&writer, vec![c2.id], "c3", 2);
        s.add_ghosts(&HashSet::from([c1.id])).unwrap();

        let history = reader.history_from(&c3.id).unwrap();
        assert_eq!(history.commits.len(), 2);
        assert_eq!(history.shallow_boundary, Some(c1.id));
    }

    #[test]
    fn test_merge_base_errors_at_ghost() {
        let s = store();
        let writer = CommitWriter::new(s.clone());
        let reader = CommitReader::new(s.clone());
        let c1 = make_commit(&writer, vec![], "c1", 0);
        let c2 = make_commit(&writer, vec![c1.id], "c2", 1);
        let c3 = make_commit(&writer, vec![c2.id], "c3", 2);
        s.add_ghosts(&HashSet::from([c2.id])).unwrap();

        assert!(matches!(
            reader.merge_base(&c3.id, &c1.id),
            Err(DoltError::ShallowBoundary(_))
        ));
    }

    #[test]
    fn test_commits_between() {
        let s = store();
        let writer = CommitWriter::new(s.clone());
        let reader = CommitReader::new(s.clone());
        let base = make_commit(&writer, vec![], "base", 0);
        let b1 = make_commit(&writer, vec![base.id], "b1", 1);
        let b2 = make_commit(&writer, vec![b1.id], "b2", 2);

        let range = reader.commits_between(&base.id, &b2.id).unwrap();
        assert_eq!(
            range.iter().map(|c| &c.message).collect::<Vec<_>>(),
            vec!["b1", "b2"]
        );
    }
}
