//! Commit history listing, with `BASE..HEAD` range support.

use crate::command;
use crate::core::index::commit_reader::History;
use crate::core::index::{revisions, CommitReader};
use crate::error::Result;
use crate::model::{Commit, LocalRepository};
use crate::opts::LogOpts;

pub fn log(repo: &LocalRepository, opts: &LogOpts) -> Result<History> {
    let store = repo.store();
    let branch = repo.current_branch()?;
    let reader = CommitReader::new(store.clone());

    match &opts.revision {
        Some(revision) if revision.contains("..") => {
            let (base, head) = revision
                .split_once("..")
                .expect("contains found the separator");
            let base = revisions::resolve_commit(&store, Some(&branch), base)?;
            let head = revisions::resolve_commit(&store, Some(&branch), head)?;
            let mut commits = reader.commits_between(&base.id, &head.id)?;
            commits.reverse();
            Ok(History {
                commits,
                shallow_boundary: None,
            })
        }
        Some(revision) => {
            let commit = revisions::resolve_commit(&store, Some(&branch), revision)?;
            reader.history_from(&commit.id)
        }
        None => {
            let head = command::head_commit(repo)?;
            reader.history_from(&head.id)
        }
    }
}

pub fn head_history(repo: &LocalRepository) -> Result<Vec<Commit>> {
    Ok(log(repo, &LogOpts::default())?.commits)
}
