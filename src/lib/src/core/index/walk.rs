//! Reachability walks over the object graph. GC traces the full closure of
//! every ref; push, fetch, and clone trace the closure of selected commits,
//! stopping at commits the other side already has. Ghost commits are never
//! descended into.

use std::collections::{HashSet, VecDeque};

use crate::core::db::StoreRef;
use crate::core::index::refs::RefReader;
use crate::core::table::TableData;
use crate::core::value::codec;
use crate::core::value::Value;
use crate::core::prolly::Node;
use crate::core::root::RootValue;
use crate::error::{DoltError, Result};
use crate::model::{Hash, StoredCommit, StoredTag};

/// Every chunk reachable from every named ref, including the ref map chunk
/// the store root names. This is the GC live set.
pub fn reachable_from_refs(store: &StoreRef) -> Result<HashSet<Hash>> {
    let mut out = HashSet::new();
    if let Some(root) = store.root()? {
        out.insert(root);
    }
    let refs = RefReader::new(store.clone()).load()?;
    for (name, hash) in &refs {
        walk_ref_target(store, name, hash, &mut out)?;
    }
    Ok(out)
}

fn walk_ref_target(
    store: &StoreRef,
    name: &str,
    hash: &Hash,
    out: &mut HashSet<Hash>,
) -> Result<()> {
    if name.starts_with(crate::constants::WORKING_SETS_PREFIX) {
        walk_working_set(store, hash, out)
    } else if name.starts_with(crate::constants::TAGS_PREFIX) {
        walk_tag(store, hash, out)
    } else {
        walk_commits(store, &[*hash], &HashSet::new(), out)
    }
}

fn walk_tag(store: &StoreRef, hash: &Hash, out: &mut HashSet<Hash>) -> Result<()> {
    if store.is_ghost(hash) || !out.insert(*hash) {
        return Ok(());
    }
    let bytes = store.get(hash)?;
    if let Ok(tag) = serde_json::from_slice::<StoredTag>(&bytes) {
        walk_commits(store, &[tag.commit], &HashSet::new(), out)?;
    } else {
        // Lightweight tag: the hash is the commit itself
        out.remove(hash);
        walk_commits(store, &[*hash], &HashSet::new(), out)?;
    }
    Ok(())
}

fn walk_working_set(store: &StoreRef, hash: &Hash, out: &mut HashSet<Hash>) -> Result<()> {
    if !out.insert(*hash) {
        return Ok(());
    }
    let data: crate::core::index::working_set::WorkingSetData =
        serde_json::from_slice(&store.get(hash)?)?;
    walk_root(store, &data.working, out)?;
    walk_root(store, &data.staged, out)?;
    walk_commits(store, &[data.head], &HashSet::new(), out)?;
    if let Some(merge) = &data.merge_state {
        walk_commits(store, &[merge.merge_head], &HashSet::new(), out)?;
        walk_root(store, &merge.pre_merge_working, out)?;
    }
    if let Some(rebase) = &data.rebase_state {
        walk_commits(store, &[rebase.original_head], &HashSet::new(), out)?;
        walk_commits(store, &[rebase.onto], &HashSet::new(), out)?;
        walk_commits(store, &[rebase.output_head], &HashSet::new(), out)?;
    }
    Ok(())
}

/// Chunks reachable from commit `tips`, stopping at (and excluding) ghosts
/// and any commit in `stop`. Parents of stopped commits are not walked.
pub fn walk_commits(
    store: &StoreRef,
    tips: &[Hash],
    stop: &HashSet<Hash>,
    out: &mut HashSet<Hash>,
) -> Result<()> {
    let mut queue: VecDeque<Hash> = tips.iter().copied().collect();
    let mut seen_commits: HashSet<Hash> = HashSet::new();
    while let Some(id) = queue.pop_front() {
        if !seen_commits.insert(id) || stop.contains(&id) || store.is_ghost(&id) {
            continue;
        }
        let bytes = store.get(&id)?;
        let commit: StoredCommit = serde_json::from_slice(&bytes)
            .map_err(|_| DoltError::commit_not_found(id))?;
        out.insert(id);
        walk_root(store, &commit.root, out)?;
        queue.extend(commit.parents.iter().copied());
    }
    Ok(())
}

pub fn walk_root(store: &StoreRef, root: &Hash, out: &mut HashSet<Hash>) -> Result<()> {
    if !out.insert(*root) {
        return Ok(());
    }
    let root_value: RootValue = serde_json::from_slice(&store.get(root)?)?;
    for table_hash in root_value.tables.values() {
        if !out.insert(*table_hash) {
            continue;
        }
        let data: TableData = serde_json::from_slice(&store.get(table_hash)?)?;
        out.insert(data.schema);
        walk_tree(store, data.primary, out)?;
        for index_root in data.indexes.values() {
            walk_tree(store, *index_root, out)?;
        }
        walk_tree(store, data.conflicts, out)?;
        walk_tree(store, data.violations, out)?;
    }
    Ok(())
}

fn walk_tree(store: &StoreRef, root: Option<Hash>, out: &mut HashSet<Hash>) -> Result<()> {
    let Some(root) = root else {
        return Ok(());
    };
    let mut queue = VecDeque::from([root]);
    while let Some(hash) = queue.pop_front() {
        if !out.insert(hash) {
            continue;
        }
        match Node::decode(&store.get(&hash)?)? {
            Node::Internal(children) => {
                queue.extend(children.iter().map(|(_, h)| *h));
            }
            Node::Leaf(entries) => {
                for (_, value_bytes) in entries {
                    collect_value_refs(store, &value_bytes, out)?;
                }
            }
        }
    }
    Ok(())
}

/// Gather spilled-blob and ref hashes embedded in an encoded value
fn collect_value_refs(store: &StoreRef, bytes: &[u8], out: &mut HashSet<Hash>) -> Result<()> {
    let mut pos = 0;
    // Violation entries are JSON, not codec values; they carry no refs
    let Ok(value) = codec::decode_value(bytes, &mut pos) else {
        return Ok(());
    };
    let mut stack = vec![value];
    while let Some(value) = stack.pop() {
        match value {
            Value::Ref(hash) => {
                out.insert(hash);
            }
            Value::BlobRef { hash, .. } => walk_blob(store, &hash, out)?,
            Value::Tuple(tuple) => {
                stack.extend(tuple.fields().iter().map(|(_, v)| v.clone()));
            }
            Value::List(items) | Value::Set(items) => stack.extend(items),
            Value::Map(entries) => {
                for (_, (k, v)) in entries {
                    stack.push(k);
                    stack.push(v);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn walk_blob(store: &StoreRef, root: &Hash, out: &mut HashSet<Hash>) -> Result<()> {
    let mut queue = VecDeque::from([*root]);
    while let Some(hash) = queue.pop_front() {
        if !out.insert(hash) {
            continue;
        }
        let node = store.get(&hash)?;
        if node.first() == Some(&1) {
            for child in node[1..].chunks(20) {
                if child.len() == 20 {
                    queue.push_back(Hash(child.try_into().unwrap()));
                }
            }
        }
    }
    Ok(())
}

/// Select the commits for a shallow clone: walk at most `depth` commits back
/// from `tip`, returning the kept commit hashes and the frontier parents
/// that become ghosts.
pub fn shallow_commit_set(
    store: &StoreRef,
    tip: &Hash,
    depth: usize,
) -> Result<(Vec<Hash>, HashSet<Hash>)> {
    if depth == 0 {
        return Err(DoltError::InvalidArgument(
            "shallow clone depth must be at least 1".to_string(),
        ));
    }
    let mut kept = Vec::new();
    let mut ghosts = HashSet::new();
    let mut seen = HashSet::new();
    let mut frontier = vec![*tip];
    for level in 0..depth {
        let mut next = Vec::new();
        for id in frontier.drain(..) {
            if !seen.insert(id) || store.is_ghost(&id) {
                continue;
            }
            let commit: StoredCommit = serde_json::from_slice(&store.get(&id)?)
                .map_err(|_| DoltError::commit_not_found(id))?;
            kept.push(id);
            if level + 1 == depth {
                ghosts.extend(commit.parents.iter().copied());
            } else {
                next.extend(commit.parents.iter().copied());
            }
        }
        frontier = next;
    }
    ghosts.retain(|h| !seen.contains(h));
    Ok((kept, ghosts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::{ChunkStore, MemStore};
    use crate::core::index::commit_writer::{signature, CommitWriter};
    use crate::core::index::refs::RefWriter;
    use crate::core::table::Table;
    use crate::core::value::Tuple;
    use crate::model::schema::{Column, DataType, Schema};
    use std::sync::Arc;

    fn commit_with_table(store: &StoreRef, parents: Vec<Hash>, rows: i64) -> Hash {
        let schema = Schema::new(
            vec![
                Column::new("pk", DataType::Int64, 1, false),
                Column::new("c", DataType::Int64, 2, true),
            ],
            vec!["pk".to_string()],
        );
        let mut table = Table::create(store.clone(), "t", schema).unwrap();
        for i in 0..rows {
            table
                .insert_row(Tuple::from_fields(vec![
                    (1, Value::Int(i)),
                    (2, Value::Int(i * 10)),
                ]))
                .unwrap();
        }
        let mut root = RootValue::empty();
        root.put_table(store, &table).unwrap();
        let root_hash = root.write(store).unwrap();
        CommitWriter::new(store.clone())
            .write_commit(crate::model::StoredCommit {
                root: root_hash,
                parents,
                author: signature("t", "t@example.com", None),
                committer: signature("t", "t@example.com", None),
                message: "commit".to_string(),
                signature: None,
            })
            .unwrap()
            .id
    }

    #[test]
    fn test_reachable_covers_commit_root_and_rows() {
        let store: StoreRef = Arc::new(MemStore::new());
        let c1 = commit_with_table(&store, vec![], 100);
        RefWriter::new(store.clone()).create_branch("main", c1).unwrap();

        let live = reachable_from_refs(&store).unwrap();
        assert!(live.contains(&c1));
        // The closure must cover the commit, root, table, schema, and nodes
        assert!(live.len() >= 5);
        for hash in &live {
            assert!(store.has(hash).unwrap(), "unreachable chunk in live set");
        }
    }

    #[test]
    fn test_walk_stops_at_stop_set() {
        let store: StoreRef = Arc::new(MemStore::new());
        let c1 = commit_with_table(&store, vec![], 5);
        let c2 = commit_with_table(&store, vec![c1], 6);

        let mut all = HashSet::new();
        walk_commits(&store, &[c2], &HashSet::new(), &mut all).unwrap();
        assert!(all.contains(&c1));

        let mut stopped = HashSet::new();
        walk_commits(&store, &[c2], &HashSet::from([c1]), &mut stopped).unwrap();
        assert!(!stopped.contains(&c1));
        assert!(stopped.contains(&c2));
        assert!(stopped.len() < all.len());
    }

    #[test]
    fn test_shallow_commit_set_depth() {
        let store: StoreRef = Arc::new(MemStore::new());
        let c1 = commit_with_table(&store, vec![], 1);
        let c2 = commit_with_table(&store, vec![c1], 2);
        let c3 = commit_with_table(&store, vec![c2], 3);

        let (kept, ghosts) = shallow_commit_set(&store, &c3, 2).unwrap();
        assert_eq!(kept, vec![c3, c2]);
        assert_eq!(ghosts, HashSet::from([c1]));

        // Depth covering everything leaves no ghosts
        let (kept, ghosts) = shallow_commit_set(&store, &c3, 10).unwrap();
        assert_eq!(kept.len(), 3);
        assert!(ghosts.is_empty());

        assert!(matches!(
            shallow_commit_set(&store, &c3, 0),
            Err(DoltError::InvalidArgument(_))
        ));
    }
}
