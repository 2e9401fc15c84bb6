//! Revision resolution: turn a user-supplied revision string into a commit.
//! Accepts branch names, tag names, remote-tracking names (`origin/main`),
//! full commit hashes, `HEAD`, and ancestry suffixes (`HEAD~2`, `main~1`).

use crate::core::db::StoreRef;
use crate::core::index::commit_reader::CommitReader;
use crate::core::index::refs::RefReader;
use crate::error::{DoltError, Result};
use crate::model::{Commit, Hash};

/// Resolve `rev` to a commit. `current_branch` anchors `HEAD`.
pub fn resolve_commit(
    store: &StoreRef,
    current_branch: Option<&str>,
    rev: &str,
) -> Result<Commit> {
    let rev = rev.trim();
    let (base, generation) = split_ancestry_suffix(rev)?;
    let reader = CommitReader::new(store.clone());
    let mut commit = resolve_base(store, current_branch, base)?;
    for _ in 0..generation {
        let parent = commit
            .parent_ids
            .first()
            .copied()
            .ok_or_else(|| DoltError::revision_not_found(rev))?;
        if store.is_ghost(&parent) {
            return Err(DoltError::ShallowBoundary(parent));
        }
        commit = reader.get_commit(&parent)?;
    }
    Ok(commit)
}

fn resolve_base(store: &StoreRef, current_branch: Option<&str>, base: &str) -> Result<Commit> {
    let refs = RefReader::new(store.clone());
    let commits = CommitReader::new(store.clone());

    if base.eq_ignore_ascii_case("HEAD") {
        let branch = current_branch
            .ok_or_else(|| DoltError::InvalidArgument("no current branch for HEAD".to_string()))?;
        let branch = refs.expect_branch(branch)?;
        return commits.get_commit(&branch.commit_id);
    }
    if let Some(branch) = refs.get_branch(base)? {
        return commits.get_commit(&branch.commit_id);
    }
    if let Some(tag_hash) = refs.get_tag(base)? {
        return commits.peel_to_commit(&tag_hash);
    }
    if let Some((remote, branch)) = base.split_once('/') {
        if let Some(hash) = refs.get_remote_branch(remote, branch)? {
            return commits.get_commit(&hash);
        }
    }
    if let Ok(hash) = Hash::from_hex(base) {
        if store.is_ghost(&hash) {
            return Err(DoltError::ShallowBoundary(hash));
        }
        if let Some(commit) = commits.get_commit_opt(&hash)? {
            return Ok(commit);
        }
    }
    Err(DoltError::revision_not_found(base))
}

/// Split a trailing `~N` (or bare `~`, meaning 1) off a revision
fn split_ancestry_suffix(rev: &str) -> Result<(&str, usize)> {
    match rev.find('~') {
        None => Ok((rev, 0)),
        Some(idx) => {
            let base = &rev[..idx];
            let suffix = &rev[idx + 1..];
            if base.is_empty() {
                return Err(DoltError::revision_not_found(rev));
            }
            let generation = if suffix.is_empty() {
                1
            } else {
                suffix
                    .parse()
                    .map_err(|_| DoltError::revision_not_found(rev))?
            };
            Ok((base, generation))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::MemStore;
    use crate::core::index::commit_writer::{signature, CommitWriter};
    use crate::core::index::refs::RefWriter;
    use crate::model::StoredCommit;
    use std::sync::Arc;

    fn setup() -> (StoreRef, Vec<Commit>) {
        let store: StoreRef = Arc::new(MemStore::new());
        let writer = CommitWriter::new(store.clone());
        let mut commits: Vec<Commit> = vec![];
        for i in 0..3 {
            let parents = commits.last().map(|c| vec![c.id]).unwrap_or_default();
            let commit = writer
                .write_commit(StoredCommit {
                    root: crate::model::Hash([0xbb; 20]),
                    parents,
                    author: signature("t", "t@example.com", None),
                    committer: signature("t", "t@example.com", None),
                    message: format!("c{}", i + 1),
                    signature: None,
                })
                .unwrap();
            commits.push(commit);
        }
        RefWriter::new(store.clone())
            .create_branch("main", commits[2].id)
            .unwrap();
        (store, commits)
    }

    #[test]
    fn test_resolve_head_and_ancestry() {
        let (store, commits) = setup();
        let head = resolve_commit(&store, Some("main"), "HEAD").unwrap();
        assert_eq!(head.id, commits[2].id);
        let parent = resolve_commit(&store, Some("main"), "HEAD~1").unwrap();
        assert_eq!(parent.id, commits[1].id);
        let grandparent = resolve_commit(&store, Some("main"), "main~2").unwrap();
        assert_eq!(grandparent.id, commits[0].id);
        assert!(resolve_commit(&store, Some("main"), "HEAD~9").is_err());
    }

    #[test]
    fn test_resolve_hash_and_missing() {
        let (store, commits) = setup();
        let by_hash = resolve_commit(&store, None, &commits[0].id.to_hex()).unwrap();
        assert_eq!(by_hash.id, commits[0].id);
        assert!(matches!(
            resolve_commit(&store, None, "no-such-branch"),
            Err(DoltError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_tag() {
        let (store, commits) = setup();
        RefWriter::new(store.clone())
            .create_tag("v1", commits[1].id)
            .unwrap();
        let tagged = resolve_commit(&store, None, "v1").unwrap();
        assert_eq!(tagged.id, commits[1].id);
    }
}
