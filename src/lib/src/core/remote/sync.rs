//! Push, fetch, clone (full and shallow), and backup sync. Negotiation is
//! chunk-level: the sender walks the closure of the wanted commits, asks the
//! receiver which chunks it already has, and moves the complement. Ref
//! updates ride the receiving store's root CAS, retried on races.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::constants::{BRANCHES_PREFIX, PUSH_CAS_RETRIES, TAGS_PREFIX};
use crate::core::db::{ChunkStore, StoreRef};
use crate::core::index::refs::{branch_ref, remote_ref, tag_ref, RefReader, RefWriter};
use crate::core::index::walk;
use crate::core::remote::Transport;
use crate::error::{DoltError, Result};
use crate::model::{Hash, StoredCommit};
use crate::util::cancel::CancelToken;

const UPLOAD_BATCH: usize = 256;

/// A read-through store: misses are fetched from the transport and cached
/// into the local store, so the ordinary reachability walkers double as
/// downloaders.
struct FetchingStore {
    local: StoreRef,
    remote_shallow: HashSet<Hash>,
    transport: Arc<dyn Transport>,
}

impl ChunkStore for FetchingStore {
    fn has(&self, hash: &Hash) -> Result<bool> {
        if self.local.has(hash)? {
            return Ok(true);
        }
        Ok(!self.transport.has_chunks(&[*hash])?.is_empty())
    }

    fn get(&self, hash: &Hash) -> Result<Vec<u8>> {
        match self.local.get(hash) {
            Ok(bytes) => return Ok(bytes),
            Err(DoltError::NotFound(_)) | Err(DoltError::ShallowBoundary(_)) => {}
            Err(e) => return Err(e),
        }
        let mut chunks = self.transport.get_chunks(&[*hash])?;
        match chunks.pop() {
            Some((_, bytes)) => {
                self.local.put(&bytes)?;
                Ok(bytes)
            }
            None => {
                if self.remote_shallow.contains(hash) {
                    Err(DoltError::ShallowBoundary(*hash))
                } else {
                    Err(DoltError::chunk_not_found(hash))
                }
            }
        }
    }

    fn put(&self, bytes: &[u8]) -> Result<Hash> {
        self.local.put(bytes)
    }

    fn root(&self) -> Result<Option<Hash>> {
        self.local.root()
    }

    fn commit_root(&self, old: Option<Hash>, new: Hash) -> Result<bool> {
        self.local.commit_root(old, new)
    }

    fn sources(&self) -> Result<Vec<crate::core::db::store::SourceDesc>> {
        self.local.sources()
    }

    fn rebase(&self) -> Result<()> {
        self.local.rebase()
    }

    fn ghosts(&self) -> HashSet<Hash> {
        // During a download the remote's ghost set bounds the walk
        let mut ghosts = self.local.ghosts();
        ghosts.extend(self.remote_shallow.iter().copied());
        ghosts
    }

    fn add_ghosts(&self, hashes: &HashSet<Hash>) -> Result<()> {
        self.local.add_ghosts(hashes)
    }

    fn remove_ghosts(&self, hashes: &HashSet<Hash>) -> Result<()> {
        self.local.remove_ghosts(hashes)
    }
}

/// Push `commit` to `refs/heads/<branch>` on the remote. Refuses
/// non-fast-forward updates unless `force`. On success the local
/// remote-tracking ref under `remote_name` equals the pushed commit.
pub fn push(
    store: &StoreRef,
    transport: &Arc<dyn Transport>,
    remote_name: &str,
    branch: &str,
    commit: Hash,
    force: bool,
    cancel: &CancelToken,
) -> Result<()> {
    let remote_refs = transport.list_refs()?;
    let remote_head = remote_refs.get(&branch_ref(branch)).copied();

    let mut stop = HashSet::new();
    if let Some(remote_head) = remote_head {
        if remote_head != commit {
            let reader = crate::core::index::CommitReader::new(store.clone());
            let known_locally = store.has(&remote_head)?;
            let fast_forward =
                known_locally && reader.is_ancestor(&remote_head, &commit)?;
            if !fast_forward && !force {
                return Err(DoltError::NonFastForward(branch.to_string()));
            }
            if known_locally {
                stop.insert(remote_head);
            }
        } else {
            log::debug!("push: remote {branch} already at {commit}");
            return Ok(());
        }
    }
    // Every commit the remote advertises bounds the upload
    for hash in remote_refs.values() {
        if store.has(hash)? {
            stop.insert(*hash);
        }
    }

    let mut candidates = HashSet::new();
    walk::walk_commits(store, &[commit], &stop, &mut candidates)?;
    upload_missing(store, transport, candidates, cancel)?;

    // CAS the remote ref map, retrying against racing pushers
    for attempt in 0..PUSH_CAS_RETRIES {
        cancel.check()?;
        let old_root = transport.root()?;
        let mut map: BTreeMap<String, Hash> = match old_root {
            Some(root) => {
                let chunks = transport.get_chunks(&[root])?;
                let (_, bytes) = chunks
                    .into_iter()
                    .next()
                    .ok_or_else(|| DoltError::chunk_not_found(&root))?;
                serde_json::from_slice(&bytes)?
            }
            None => BTreeMap::new(),
        };
        if let Some(current) = map.get(&branch_ref(branch)) {
            if remote_head != Some(*current) && !force {
                return Err(DoltError::NonFastForward(branch.to_string()));
            }
        }
        map.insert(branch_ref(branch), commit);
        let bytes = serde_json::to_vec(&map)?;
        let new_root = crate::util::hasher::hash_buffer(&bytes);
        transport.put_chunks(&[(new_root, bytes)])?;
        if transport.commit_root(old_root, new_root)? {
            RefWriter::new(store.clone()).set_remote_branch(remote_name, branch, commit)?;
            return Ok(());
        }
        log::debug!("push: remote root CAS lost (attempt {attempt}), retrying");
    }
    Err(DoltError::Internal(
        "push could not win the remote root CAS".to_string(),
    ))
}

fn upload_missing(
    store: &StoreRef,
    transport: &Arc<dyn Transport>,
    candidates: HashSet<Hash>,
    cancel: &CancelToken,
) -> Result<()> {
    let candidate_list: Vec<Hash> = candidates.into_iter().collect();
    let mut missing: Vec<Hash> = Vec::new();
    for batch in candidate_list.chunks(UPLOAD_BATCH) {
        cancel.check()?;
        let present = transport.has_chunks(batch)?;
        missing.extend(batch.iter().filter(|h| !present.contains(h)));
    }
    log::debug!(
        "uploading {} of {} candidate chunks",
        missing.len(),
        candidate_list.len()
    );
    for batch in missing.chunks(UPLOAD_BATCH) {
        cancel.check()?;
        let chunks: Vec<(Hash, Vec<u8>)> = batch
            .iter()
            .map(|h| Ok((*h, store.get(h)?)))
            .collect::<Result<_>>()?;
        transport.put_chunks(&chunks)?;
    }
    Ok(())
}

/// Download the closure of `tip` into the local store. Commits already
/// present locally are assumed complete and bound the walk; ghosts the
/// remote can supply are healed.
fn download_commit_closure(
    store: &StoreRef,
    transport: &Arc<dyn Transport>,
    tip: Hash,
    remote_shallow: &HashSet<Hash>,
    cancel: &CancelToken,
) -> Result<()> {
    let fetching: StoreRef = Arc::new(FetchingStore {
        local: store.clone(),
        remote_shallow: remote_shallow.clone(),
        transport: transport.clone(),
    });
    let mut queue = VecDeque::from([tip]);
    let mut seen = HashSet::new();
    let mut healed: HashSet<Hash> = HashSet::new();
    while let Some(id) = queue.pop_front() {
        cancel.check()?;
        if !seen.insert(id) {
            continue;
        }
        if remote_shallow.contains(&id) {
            // The remote itself lacks this commit; it stays a ghost here
            store.add_ghosts(&HashSet::from([id]))?;
            continue;
        }
        let locally_ghost = store.is_ghost(&id);
        if !locally_ghost && store.has(&id)? {
            continue;
        }
        let bytes = match fetching.get(&id) {
            Ok(bytes) => bytes,
            Err(DoltError::ShallowBoundary(_)) | Err(DoltError::NotFound(_)) => {
                store.add_ghosts(&HashSet::from([id]))?;
                continue;
            }
            Err(e) => return Err(e),
        };
        let commit: StoredCommit = serde_json::from_slice(&bytes)
            .map_err(|_| DoltError::commit_not_found(id))?;
        let mut chunk_set = HashSet::new();
        walk::walk_root(&fetching, &commit.root, &mut chunk_set)?;
        if locally_ghost {
            healed.insert(id);
        }
        queue.extend(commit.parents.iter().copied());
    }
    if !healed.is_empty() {
        log::debug!("fetch healed {} ghost commits", healed.len());
        store.remove_ghosts(&healed)?;
    }
    Ok(())
}

/// Fetch every branch and tag from the remote, updating remote-tracking
/// refs. Returns the branches observed.
pub fn fetch(
    store: &StoreRef,
    transport: &Arc<dyn Transport>,
    remote_name: &str,
    cancel: &CancelToken,
) -> Result<Vec<(String, Hash)>> {
    let metadata = transport.get_repo_metadata()?;
    let remote_refs = transport.list_refs()?;
    let mut branches = Vec::new();
    for (name, hash) in &remote_refs {
        if let Some(branch) = name.strip_prefix(BRANCHES_PREFIX) {
            download_commit_closure(store, transport, *hash, &metadata.shallow, cancel)?;
            branches.push((branch.to_string(), *hash));
        }
    }
    fetch_tag_objects(store, transport, &remote_refs)?;
    let writer = RefWriter::new(store.clone());
    writer.update(|map| {
        for (branch, hash) in &branches {
            map.insert(remote_ref(remote_name, branch), *hash);
        }
        for (name, hash) in &remote_refs {
            if let Some(tag) = name.strip_prefix(TAGS_PREFIX) {
                map.entry(tag_ref(tag)).or_insert(*hash);
            }
        }
        Ok(())
    })?;
    Ok(branches)
}

/// Annotated tag objects live outside any branch closure; pull the chunks
/// behind tag refs explicitly
fn fetch_tag_objects(
    store: &StoreRef,
    transport: &Arc<dyn Transport>,
    remote_refs: &BTreeMap<String, Hash>,
) -> Result<()> {
    for (name, hash) in remote_refs {
        if name.starts_with(TAGS_PREFIX) && !store.has(hash)? {
            if let Some((_, bytes)) = transport.get_chunks(&[*hash])?.into_iter().next() {
                store.put(&bytes)?;
            }
        }
    }
    Ok(())
}

pub struct CloneOutcome {
    pub branches: Vec<(String, Hash)>,
    pub checkout_branch: String,
    pub head: Hash,
}

/// Populate a fresh local store from the remote. A `depth` bounds the
/// commit walk per spec: at depth N the frontier parents become ghosts and
/// only the selected branch is installed.
pub fn clone_into(
    store: &StoreRef,
    transport: &Arc<dyn Transport>,
    remote_name: &str,
    branch: Option<&str>,
    depth: Option<usize>,
    cancel: &CancelToken,
) -> Result<CloneOutcome> {
    if depth == Some(0) {
        return Err(DoltError::InvalidArgument(
            "shallow clone depth must be at least 1".to_string(),
        ));
    }
    let metadata = transport.get_repo_metadata()?;
    let remote_refs = transport.list_refs()?;
    let mut branches: Vec<(String, Hash)> = remote_refs
        .iter()
        .filter_map(|(name, hash)| {
            name.strip_prefix(BRANCHES_PREFIX)
                .map(|b| (b.to_string(), *hash))
        })
        .collect();
    if branches.is_empty() {
        return Err(DoltError::NotFound("remote has no branches".to_string()));
    }
    let checkout_branch = match branch {
        Some(b) => b.to_string(),
        None => {
            if branches.iter().any(|(b, _)| b == crate::constants::DEFAULT_BRANCH_NAME) {
                crate::constants::DEFAULT_BRANCH_NAME.to_string()
            } else {
                branches[0].0.clone()
            }
        }
    };
    let head = branches
        .iter()
        .find(|(b, _)| *b == checkout_branch)
        .map(|(_, h)| *h)
        .ok_or_else(|| DoltError::branch_not_found(&checkout_branch))?;

    match depth {
        None => {
            for (_, hash) in &branches {
                download_commit_closure(store, transport, *hash, &metadata.shallow, cancel)?;
            }
        }
        Some(depth) => {
            shallow_download(store, transport, head, depth, &metadata.shallow, cancel)?;
            branches.retain(|(b, _)| *b == checkout_branch);
        }
    }

    if depth.is_none() {
        fetch_tag_objects(store, transport, &remote_refs)?;
    }
    let writer = RefWriter::new(store.clone());
    writer.update(|map| {
        map.insert(branch_ref(&checkout_branch), head);
        for (b, hash) in &branches {
            map.insert(remote_ref(remote_name, b), *hash);
        }
        if depth.is_none() {
            for (name, hash) in &remote_refs {
                if name.starts_with(TAGS_PREFIX) {
                    map.insert(name.clone(), *hash);
                }
            }
        }
        Ok(())
    })?;

    Ok(CloneOutcome {
        branches,
        checkout_branch,
        head,
    })
}

/// Walk at most `depth` commits from `tip` through the transport, download
/// their roots, and record the frontier as ghosts.
fn shallow_download(
    store: &StoreRef,
    transport: &Arc<dyn Transport>,
    tip: Hash,
    depth: usize,
    remote_shallow: &HashSet<Hash>,
    cancel: &CancelToken,
) -> Result<()> {
    let fetching: StoreRef = Arc::new(FetchingStore {
        local: store.clone(),
        remote_shallow: remote_shallow.clone(),
        transport: transport.clone(),
    });
    let mut ghosts: HashSet<Hash> = HashSet::new();
    let mut kept: HashSet<Hash> = HashSet::new();
    let mut frontier = vec![tip];
    for level in 0..depth {
        cancel.check()?;
        let mut next = Vec::new();
        for id in frontier.drain(..) {
            if !kept.insert(id) {
                continue;
            }
            if remote_shallow.contains(&id) {
                ghosts.insert(id);
                kept.remove(&id);
                continue;
            }
            let bytes = fetching.get(&id)?;
            let commit: StoredCommit = serde_json::from_slice(&bytes)
                .map_err(|_| DoltError::commit_not_found(id))?;
            let mut chunk_set = HashSet::new();
            walk::walk_root(&fetching, &commit.root, &mut chunk_set)?;
            if level + 1 == depth {
                ghosts.extend(commit.parents.iter().copied());
            } else {
                next.extend(commit.parents.iter().copied());
            }
        }
        frontier = next;
    }
    ghosts.retain(|h| !kept.contains(h));
    if !ghosts.is_empty() {
        store.add_ghosts(&ghosts)?;
    }
    Ok(())
}

/// Mirror every local ref to the backup remote. Atomic at the ref-set
/// level: the backup's root is swapped to the local ref map in one CAS.
pub fn backup_sync(
    store: &StoreRef,
    transport: &Arc<dyn Transport>,
    cancel: &CancelToken,
) -> Result<()> {
    if store.is_shallow() {
        return Err(DoltError::InvalidArgument(
            "a shallow clone cannot be backed up".to_string(),
        ));
    }
    let chunks = walk::reachable_from_refs(store)?;
    upload_missing(store, transport, chunks, cancel)?;

    let local_refs = RefReader::new(store.clone()).load()?;
    let bytes = serde_json::to_vec(&local_refs)?;
    let new_root = crate::util::hasher::hash_buffer(&bytes);
    transport.put_chunks(&[(new_root, bytes)])?;
    for _ in 0..PUSH_CAS_RETRIES {
        cancel.check()?;
        let old_root = transport.root()?;
        if transport.commit_root(old_root, new_root)? {
            return Ok(());
        }
    }
    Err(DoltError::Internal(
        "backup sync could not win the remote root CAS".to_string(),
    ))
}
