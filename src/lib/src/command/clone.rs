//! Clone a remote into a fresh directory, full or shallow. A shallow clone
//! keeps only the newest `depth` commits of one branch and records the
//! frontier parents as ghosts.

use std::path::Path;
use std::sync::Arc;

use crate::command;
use crate::core::index::{CommitReader, WorkingSet};
use crate::core::remote::{open_transport, Transport};
use crate::error::Result;
use crate::model::LocalRepository;
use crate::opts::CloneOpts;
use crate::util::cancel::CancelToken;

pub fn clone(opts: &CloneOpts, dir: &Path) -> Result<LocalRepository> {
    let repo = LocalRepository::init(dir)?;
    let store = repo.store();
    let transport: Arc<dyn Transport> = Arc::from(open_transport(&opts.url)?);

    let outcome = crate::core::remote::sync::clone_into(
        &store,
        &transport,
        &opts.remote_name,
        opts.branch.as_deref(),
        opts.depth,
        &CancelToken::new(),
    )?;

    let head = CommitReader::new(store.clone()).get_commit(&outcome.head)?;
    WorkingSet::create(store, &outcome.checkout_branch, head.id, head.root)?;
    repo.set_current_branch(&outcome.checkout_branch)?;
    repo.add_remote(&opts.remote_name, &opts.url)?;
    log::debug!(
        "cloned {} at {} (branch {})",
        opts.url,
        head.id,
        outcome.checkout_branch
    );
    Ok(repo)
}
