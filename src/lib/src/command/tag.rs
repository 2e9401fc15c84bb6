//! Tags: immutable named pointers to commits, optionally annotated.

use crate::command;
use crate::core::index::refs::{RefReader, RefWriter};
use crate::core::index::{revisions, CommitReader, CommitWriter};
use crate::error::Result;
use crate::model::{Commit, LocalRepository, StoredTag};

/// Create a tag at the revision (HEAD by default). A message makes it an
/// annotated tag object; otherwise the tag points straight at the commit.
pub fn create(
    repo: &LocalRepository,
    name: &str,
    revision: Option<&str>,
    message: Option<&str>,
) -> Result<()> {
    let store = repo.store();
    let commit = match revision {
        Some(rev) => revisions::resolve_commit(&store, Some(&repo.current_branch()?), rev)?,
        None => command::head_commit(repo)?,
    };
    let target = match message {
        Some(message) => {
            let config = repo.config()?;
            let (user, email) = config.user_identity()?;
            CommitWriter::new(store.clone()).write_tag(&StoredTag {
                commit: commit.id,
                tagger: Some(crate::core::index::commit_writer::signature(
                    user, email, None,
                )),
                message: Some(message.to_string()),
            })?
        }
        None => commit.id,
    };
    RefWriter::new(store).create_tag(name, target)
}

pub fn delete(repo: &LocalRepository, name: &str) -> Result<()> {
    RefWriter::new(repo.store()).delete_tag(name)
}

/// (tag name, target commit) pairs, annotated tags peeled
pub fn list(repo: &LocalRepository) -> Result<Vec<(String, Commit)>> {
    let store = repo.store();
    let reader = CommitReader::new(store.clone());
    RefReader::new(store)
        .list_tags()?
        .into_iter()
        .map(|(name, hash)| Ok((name, reader.peel_to_commit(&hash)?)))
        .collect()
}
