//! The ref map: one ordered map from ref name to chunk hash, serialized as
//! the chunk the store's root pointer names. Branches, tags, remote-tracking
//! refs, and working sets all live here, so a single CAS retargets any
//! combination of them atomically.

use std::collections::BTreeMap;

use crate::constants::{
    BRANCHES_PREFIX, REMOTES_PREFIX, TAGS_PREFIX, WORKING_SETS_PREFIX,
};
use crate::core::db::StoreRef;
use crate::error::{DoltError, Result};
use crate::model::{Branch, Hash};

pub type RefMap = BTreeMap<String, Hash>;

/// Ref names follow Git's rules: no `..`, no leading or trailing `/`, no
/// whitespace or control characters, no empty segments.
pub fn validate_ref_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(DoltError::InvalidArgument(format!(
            "invalid ref name {name:?}: {reason}"
        )))
    };
    if name.is_empty() {
        return invalid("empty");
    }
    if name.contains("..") {
        return invalid("contains '..'");
    }
    if name.starts_with('/') || name.ends_with('/') {
        return invalid("leading or trailing '/'");
    }
    if name.contains("//") {
        return invalid("empty path segment");
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return invalid("contains whitespace");
    }
    if name.ends_with(".lock") {
        return invalid("ends with '.lock'");
    }
    Ok(())
}

pub struct RefReader {
    store: StoreRef,
}

impl RefReader {
    pub fn new(store: StoreRef) -> RefReader {
        RefReader { store }
    }

    pub fn load(&self) -> Result<RefMap> {
        match self.store.root()? {
            Some(root) => Ok(serde_json::from_slice(&self.store.get(&root)?)?),
            None => Ok(RefMap::new()),
        }
    }

    pub fn get_ref(&self, name: &str) -> Result<Option<Hash>> {
        Ok(self.load()?.get(name).copied())
    }

    pub fn has_branch(&self, name: &str) -> Result<bool> {
        Ok(self.get_ref(&branch_ref(name))?.is_some())
    }

    pub fn get_branch(&self, name: &str) -> Result<Option<Branch>> {
        Ok(self.get_ref(&branch_ref(name))?.map(|commit_id| Branch {
            name: name.to_string(),
            commit_id,
        }))
    }

    pub fn expect_branch(&self, name: &str) -> Result<Branch> {
        self.get_branch(name)?
            .ok_or_else(|| DoltError::branch_not_found(name))
    }

    pub fn list_branches(&self) -> Result<Vec<Branch>> {
        Ok(self
            .load()?
            .iter()
            .filter_map(|(name, hash)| {
                name.strip_prefix(BRANCHES_PREFIX).map(|short| Branch {
                    name: short.to_string(),
                    commit_id: *hash,
                })
            })
            .collect())
    }

    pub fn get_tag(&self, name: &str) -> Result<Option<Hash>> {
        self.get_ref(&tag_ref(name))
    }

    pub fn list_tags(&self) -> Result<Vec<(String, Hash)>> {
        Ok(self
            .load()?
            .iter()
            .filter_map(|(name, hash)| {
                name.strip_prefix(TAGS_PREFIX)
                    .map(|short| (short.to_string(), *hash))
            })
            .collect())
    }

    pub fn get_remote_branch(&self, remote: &str, branch: &str) -> Result<Option<Hash>> {
        self.get_ref(&remote_ref(remote, branch))
    }

    pub fn list_remote_branches(&self, remote: &str) -> Result<Vec<(String, Hash)>> {
        let prefix = format!("{REMOTES_PREFIX}{remote}/");
        Ok(self
            .load()?
            .iter()
            .filter_map(|(name, hash)| {
                name.strip_prefix(&prefix)
                    .map(|short| (short.to_string(), *hash))
            })
            .collect())
    }
}

pub struct RefWriter {
    store: StoreRef,
}

impl RefWriter {
    pub fn new(store: StoreRef) -> RefWriter {
        RefWriter { store }
    }

    /// Apply `mutate` to the current ref map and CAS it in, retrying against
    /// concurrent writers. The closure may be invoked more than once.
    pub fn update<F>(&self, mut mutate: F) -> Result<RefMap>
    where
        F: FnMut(&mut RefMap) -> Result<()>,
    {
        loop {
            let old_root = self.store.root()?;
            let mut map: RefMap = match old_root {
                Some(root) => serde_json::from_slice(&self.store.get(&root)?)?,
                None => RefMap::new(),
            };
            mutate(&mut map)?;
            let new_root = self.store.put(&serde_json::to_vec(&map)?)?;
            if self.store.commit_root(old_root, new_root)? {
                return Ok(map);
            }
            log::debug!("ref map CAS lost the race, retrying");
            self.store.rebase()?;
        }
    }

    pub fn set_branch(&self, name: &str, commit_id: Hash) -> Result<()> {
        validate_ref_name(name)?;
        self.update(|map| {
            map.insert(branch_ref(name), commit_id);
            Ok(())
        })?;
        Ok(())
    }

    pub fn create_branch(&self, name: &str, commit_id: Hash) -> Result<()> {
        validate_ref_name(name)?;
        self.update(|map| {
            if map.contains_key(&branch_ref(name)) {
                return Err(DoltError::AlreadyExists(format!("branch {name}")));
            }
            map.insert(branch_ref(name), commit_id);
            Ok(())
        })?;
        Ok(())
    }

    pub fn delete_branch(&self, name: &str) -> Result<()> {
        self.update(|map| {
            if map.remove(&branch_ref(name)).is_none() {
                return Err(DoltError::branch_not_found(name));
            }
            map.remove(&working_set_ref(name));
            Ok(())
        })?;
        Ok(())
    }

    pub fn create_tag(&self, name: &str, target: Hash) -> Result<()> {
        validate_ref_name(name)?;
        self.update(|map| {
            if map.contains_key(&tag_ref(name)) {
                return Err(DoltError::AlreadyExists(format!("tag {name}")));
            }
            map.insert(tag_ref(name), target);
            Ok(())
        })?;
        Ok(())
    }

    pub fn delete_tag(&self, name: &str) -> Result<()> {
        self.update(|map| {
            if map.remove(&tag_ref(name)).is_none() {
                return Err(DoltError::NotFound(format!("tag {name}")));
            }
            Ok(())
        })?;
        Ok(())
    }

    pub fn set_remote_branch(&self, remote: &str, branch: &str, commit_id: Hash) -> Result<()> {
        self.update(|map| {
            map.insert(remote_ref(remote, branch), commit_id);
            Ok(())
        })?;
        Ok(())
    }

    pub fn remove_remote_refs(&self, remote: &str) -> Result<()> {
        let prefix = format!("{REMOTES_PREFIX}{remote}/");
        self.update(|map| {
            map.retain(|name, _| !name.starts_with(&prefix));
            Ok(())
        })?;
        Ok(())
    }
}

pub fn branch_ref(name: &str) -> String {
    format!("{BRANCHES_PREFIX}{name}")
}

pub fn tag_ref(name: &str) -> String {
    format!("{TAGS_PREFIX}{name}")
}

pub fn remote_ref(remote: &str, branch: &str) -> String {
    format!("{REMOTES_PREFIX}{remote}/{branch}")
}

pub fn working_set_ref(branch: &str) -> String {
    format!("{WORKING_SETS_PREFIX}{branch}")
}
