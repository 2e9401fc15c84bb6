//! One working set per branch: the mutable triple (working root, staged
//! root, HEAD) plus any in-flight merge or rebase state, stored as a chunk
//! behind `refs/internal/heads/<branch>`. Every update is a ref-map CAS, so
//! writes to one branch's working set are linearizable.

use serde::{Deserialize, Serialize};

use crate::core::db::StoreRef;
use crate::core::index::refs::{working_set_ref, RefReader, RefWriter};
use crate::core::rebase::RebaseState;
use crate::core::root::RootValue;
use crate::error::{DoltError, Result};
use crate::model::Hash;

/// Present iff a merge started and has not finished
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MergeState {
    pub merge_head: Hash,
    pub pre_merge_working: Hash,
    pub conflicted_tables: Vec<String>,
    pub violated_tables: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkingSetData {
    pub working: Hash,
    pub staged: Hash,
    pub head: Hash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_state: Option<MergeState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rebase_state: Option<RebaseState>,
}

#[derive(Clone)]
pub struct WorkingSet {
    pub branch: String,
    pub data: WorkingSetData,
    store: StoreRef,
}

impl WorkingSet {
    /// Create the working set for a fresh branch pointed at `head`
    pub fn create(store: StoreRef, branch: &str, head: Hash, root: Hash) -> Result<WorkingSet> {
        let data = WorkingSetData {
            working: root,
            staged: root,
            head,
            merge_state: None,
            rebase_state: None,
        };
        let ws = WorkingSet {
            branch: branch.to_string(),
            data,
            store,
        };
        ws.save()?;
        Ok(ws)
    }

    pub fn load(store: StoreRef, branch: &str) -> Result<WorkingSet> {
        let reader = RefReader::new(store.clone());
        let hash = reader
            .get_ref(&working_set_ref(branch))?
            .ok_or_else(|| DoltError::NotFound(format!("working set for branch {branch}")))?;
        let data: WorkingSetData = serde_json::from_slice(&store.get(&hash)?)?;
        Ok(WorkingSet {
            branch: branch.to_string(),
            data,
            store,
        })
    }

    /// Persist this working set under its ref. Unconditional: callers that
    /// need optimistic concurrency use `save_if_unchanged`.
    pub fn save(&self) -> Result<()> {
        let hash = self.store.put(&serde_json::to_vec(&self.data)?)?;
        let writer = RefWriter::new(self.store.clone());
        writer.update(|map| {
            map.insert(working_set_ref(&self.branch), hash);
            Ok(())
        })?;
        Ok(())
    }

    /// CAS-style save: only persists if the stored working set still matches
    /// `expected`. Returns false when a concurrent writer won.
    pub fn save_if_unchanged(&self, expected: &WorkingSetData) -> Result<bool> {
        let expected_bytes = serde_json::to_vec(expected)?;
        let expected_hash = crate::util::hasher::hash_buffer(&expected_bytes);
        let new_hash = self.store.put(&serde_json::to_vec(&self.data)?)?;
        let writer = RefWriter::new(self.store.clone());
        let mut swapped = false;
        writer.update(|map| {
            let current = map.get(&working_set_ref(&self.branch)).copied();
            if current == Some(expected_hash) {
                map.insert(working_set_ref(&self.branch), new_hash);
                swapped = true;
            } else {
                swapped = false;
            }
            Ok(())
        })?;
        Ok(swapped)
    }

    pub fn store(&self) -> &StoreRef {
        &self.store
    }

    pub fn working_root(&self) -> Result<RootValue> {
        RootValue::read(&self.store, &self.data.working)
    }

    pub fn staged_root(&self) -> Result<RootValue> {
        RootValue::read(&self.store, &self.data.staged)
    }

    pub fn set_working_root(&mut self, root: &RootValue) -> Result<()> {
        self.data.working = root.write(&self.store)?;
        Ok(())
    }

    pub fn is_clean(&self) -> bool {
        self.data.working == self.data.staged && self.data.merge_state.is_none()
    }

    /// Copy the named tables (or everything) from working into staged
    pub fn stage(&mut self, tables: Option<&[String]>) -> Result<()> {
        match tables {
            None => {
                self.data.staged = self.data.working;
            }
            Some(names) => {
                let working = self.working_root()?;
                let mut staged = self.staged_root()?;
                for name in names {
                    match working.tables.get(name) {
                        Some(hash) => {
                            staged.tables.insert(name.clone(), *hash);
                        }
                        None => {
                            // Staging a deletion
                            if staged.tables.remove(name).is_none() {
                                return Err(DoltError::table_not_found(name));
                            }
                        }
                    }
                }
                // Non-table state stages wholesale
                staged.views = working.views.clone();
                staged.triggers = working.triggers.clone();
                staged.routines = working.routines.clone();
                staged.foreign_keys = working.foreign_keys.clone();
                self.data.staged = staged.write(&self.store)?;
            }
        }
        Ok(())
    }

    /// Overwrite both working and staged with the commit's root
    pub fn reset_hard(&mut self, head: Hash, root: Hash) {
        self.data.head = head;
        self.data.working = root;
        self.data.staged = root;
        self.data.merge_state = None;
    }

    /// Move HEAD, leaving working and staged alone
    pub fn reset_soft(&mut self, head: Hash) {
        self.data.head = head;
    }

    pub fn start_merge(&mut self, merge_head: Hash) {
        self.data.merge_state = Some(MergeState {
            merge_head,
            pre_merge_working: self.data.working,
            conflicted_tables: vec![],
            violated_tables: vec![],
        });
    }

    /// Restore the pre-merge working root and clear merge state
    pub fn abort_merge(&mut self) -> Result<()> {
        let state = self
            .data
            .merge_state
            .take()
            .ok_or_else(|| DoltError::NotFound("merge in progress".to_string()))?;
        self.data.working = state.pre_merge_working;
        Ok(())
    }

    pub fn has_conflicts(&self) -> bool {
        self.data
            .merge_state
            .as_ref()
            .is_some_and(|m| !m.conflicted_tables.is_empty())
    }

    pub fn has_violations(&self) -> bool {
        self.data
            .merge_state
            .as_ref()
            .is_some_and(|m| !m.violated_tables.is_empty())
    }
}
