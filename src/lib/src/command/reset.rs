//! `reset`: move HEAD, and with `--hard` overwrite working and staged.

use crate::command;
use crate::core::index::refs::{branch_ref, working_set_ref, RefWriter};
use crate::core::index::revisions;
use crate::error::Result;
use crate::model::LocalRepository;
use crate::opts::ResetOpts;

pub fn reset(repo: &LocalRepository, opts: &ResetOpts) -> Result<()> {
    let store = repo.store();
    let branch = repo.current_branch()?;
    let revision = opts.revision.as_deref().unwrap_or("HEAD");
    let target = revisions::resolve_commit(&store, Some(&branch), revision)?;

    let mut ws = command::current_working_set(repo)?;
    if opts.hard {
        ws.reset_hard(target.id, target.root);
    } else {
        ws.reset_soft(target.id);
    }
    let ws_hash = store.put(&serde_json::to_vec(&ws.data)?)?;
    RefWriter::new(store.clone()).update(|map| {
        map.insert(branch_ref(&branch), target.id);
        map.insert(working_set_ref(&branch), ws_hash);
        Ok(())
    })?;
    Ok(())
}
