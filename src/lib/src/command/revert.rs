//! Revert: apply the inverse diff of a commit onto HEAD as a new commit.

use crate::command;
use crate::core::index::refs::{branch_ref, working_set_ref, RefWriter};
use crate::core::index::{revisions, CommitWriter};
use crate::core::rebase::{revert_commit, ReplayOutcome};
use crate::core::root::RootValue;
use crate::error::{DoltError, Result};
use crate::model::{Commit, LocalRepository};
use crate::util::cancel::CancelToken;

pub fn revert(repo: &LocalRepository, revision: &str) -> Result<Commit> {
    let store = repo.store();
    let branch = repo.current_branch()?;
    let ws = command::current_working_set(repo)?;
    if !ws.is_clean() {
        return Err(DoltError::DirtyWorkingSet("revert".to_string()));
    }
    let target = revisions::resolve_commit(&store, Some(&branch), revision)?;
    let head = command::head_commit(repo)?;
    let head_root = RootValue::read(&store, &head.root)?;

    let outcome = revert_commit(&store, &target, &head_root, &CancelToken::new())?;
    let new_root = match outcome {
        ReplayOutcome::Clean(root) => root,
        ReplayOutcome::Empty => head_root,
        ReplayOutcome::Conflicted(_, stats) => {
            return Err(DoltError::MergeConflict(stats.conflicted_tables.len()));
        }
        ReplayOutcome::SchemaConflict(tables) => {
            return Err(DoltError::SchemaConflict(tables.join(", ")));
        }
    };

    let config = repo.config()?;
    let (name, email) = config.user_identity()?;
    let sig = crate::core::index::commit_writer::signature(
        name,
        email,
        command::commit::author_date()?,
    );
    let root_hash = new_root.write(&store)?;
    let commit = CommitWriter::new(store.clone()).create_commit(
        root_hash,
        vec![head.id],
        sig.clone(),
        sig,
        format!("Revert \"{}\"", target.summary()),
    )?;

    let mut ws = ws;
    ws.reset_hard(commit.id, root_hash);
    let ws_hash = store.put(&serde_json::to_vec(&ws.data)?)?;
    RefWriter::new(store.clone()).update(|map| {
        map.insert(branch_ref(&branch), commit.id);
        map.insert(working_set_ref(&branch), ws_hash);
        Ok(())
    })?;
    Ok(commit)
}
