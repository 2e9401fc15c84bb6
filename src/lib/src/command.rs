//! # Dolt Commands
//!
//! Top level verbs you are likely to run on a dolt repository. Every verb
//! has a CLI form and a stored-procedure form with identical behavior; both
//! call straight into these functions.

pub mod add;
pub mod backup;
pub mod branch;
pub mod checkout;
pub mod cherry_pick;
pub mod clone;
pub mod commit;
pub mod conflicts;
pub mod diff;
pub mod fetch;
pub mod gc;
pub mod log;
pub mod merge;
pub mod pull;
pub mod push;
pub mod rebase;
pub mod remote;
pub mod reset;
pub mod revert;
pub mod tag;

use std::path::Path;

use crate::core::index::{CommitReader, CommitWriter, RefWriter, WorkingSet};
use crate::core::root::RootValue;
use crate::error::{DoltError, Result};
use crate::model::{Commit, LocalRepository, StagedData, TableStatus};

pub const INITIAL_COMMIT_MSG: &str = "Initialize data repository";

/// # Initialize an empty dolt repository
///
/// Creates `.dolt`, the chunk store, the default branch with an initial
/// empty commit, and that branch's working set. Requires `user.name` and
/// `user.email` to be configured.
pub fn init(path: &Path) -> Result<LocalRepository> {
    let repo = LocalRepository::init(path)?;
    let config = repo.config()?;
    let (name, email) = config.user_identity()?;
    let branch = config.default_branch();

    let store = repo.store();
    let root = RootValue::empty().write(&store)?;
    let sig = crate::core::index::commit_writer::signature(&name, &email, commit::author_date()?);
    let commit = CommitWriter::new(store.clone()).create_commit(
        root,
        vec![],
        sig.clone(),
        sig,
        INITIAL_COMMIT_MSG,
    )?;
    RefWriter::new(store.clone()).create_branch(&branch, commit.id)?;
    WorkingSet::create(store, &branch, commit.id, root)?;
    repo.set_current_branch(&branch)?;
    ::log::debug!("initialized repository on branch {branch} at {}", commit.id);
    Ok(repo)
}

/// The working set of the checked-out branch
pub fn current_working_set(repo: &LocalRepository) -> Result<WorkingSet> {
    let branch = repo.current_branch()?;
    WorkingSet::load(repo.store(), &branch)
}

/// The HEAD commit of the checked-out branch
pub fn head_commit(repo: &LocalRepository) -> Result<Commit> {
    let ws = current_working_set(repo)?;
    CommitReader::new(repo.store()).get_commit(&ws.data.head)
}

/// # Get status of tables in the repository
///
/// Which tables are staged for commit, which carry unstaged edits, and
/// which are blocked on conflicts or constraint violations.
pub fn status(repo: &LocalRepository) -> Result<StagedData> {
    let store = repo.store();
    let ws = current_working_set(repo)?;
    let head = CommitReader::new(store.clone()).get_commit(&ws.data.head)?;
    let head_root = RootValue::read(&store, &head.root)?;
    let staged_root = ws.staged_root()?;
    let working_root = ws.working_root()?;

    let mut status = StagedData {
        staged_tables: classify_tables(&head_root, &staged_root),
        unstaged_tables: classify_tables(&staged_root, &working_root),
        merge_in_progress: ws.data.merge_state.is_some(),
        rebase_in_progress: ws.data.rebase_state.is_some(),
        ..Default::default()
    };
    for name in working_root.table_names() {
        let table = working_root.expect_table(&store, &name)?;
        if table.has_conflicts() {
            status.conflicted_tables.push(name.clone());
        }
        if table.has_violations() {
            status.violated_tables.push(name);
        }
    }
    Ok(status)
}

fn classify_tables(from: &RootValue, to: &RootValue) -> Vec<(String, TableStatus)> {
    to.changed_tables(from)
        .into_iter()
        .map(|name| {
            let status = if !from.has_table(&name) {
                TableStatus::Added
            } else if !to.has_table(&name) {
                TableStatus::Dropped
            } else {
                TableStatus::Modified
            };
            (name, status)
        })
        .collect()
}

/// Tables in the working root currently carrying unresolved conflicts
pub fn conflicted_tables(repo: &LocalRepository) -> Result<Vec<String>> {
    Ok(status(repo)?.conflicted_tables)
}

/// Guard used by merge and rebase: uncommitted changes touching any of
/// `tables` abort with `DirtyWorkingSet`.
pub fn check_tables_clean(
    repo: &LocalRepository,
    ws: &WorkingSet,
    tables: &[String],
    operation: &str,
) -> Result<()> {
    let store = repo.store();
    let head = CommitReader::new(store.clone()).get_commit(&ws.data.head)?;
    let head_root = RootValue::read(&store, &head.root)?;
    let working_root = ws.working_root()?;
    let dirty = working_root.changed_tables(&head_root);
    let blocked: Vec<&String> = dirty.iter().filter(|t| tables.contains(t)).collect();
    if !blocked.is_empty() {
        return Err(DoltError::DirtyWorkingSet(operation.to_string()));
    }
    Ok(())
}
