//! Push the current (or named) branch to a remote.

use std::sync::Arc;

use crate::command;
use crate::constants::DEFAULT_REMOTE_NAME;
use crate::core::index::refs::RefReader;
use crate::core::remote::{open_transport, Transport};
use crate::error::{DoltError, Result};
use crate::model::LocalRepository;
use crate::opts::PushOpts;
use crate::util::cancel::CancelToken;

pub fn push(repo: &LocalRepository, opts: &PushOpts) -> Result<()> {
    let store = repo.store();
    let remote_name = opts.remote.as_deref().unwrap_or(DEFAULT_REMOTE_NAME);
    let remote = repo
        .get_remote(remote_name)?
        .ok_or_else(|| DoltError::remote_not_found(remote_name))?;
    let branch = match &opts.branch {
        Some(branch) => branch.clone(),
        None => repo.current_branch()?,
    };
    let commit = RefReader::new(store.clone())
        .expect_branch(&branch)?
        .commit_id;

    let transport: Arc<dyn Transport> = Arc::from(open_transport(&remote.url)?);
    log::debug!("pushing {branch} ({commit}) to {remote_name}");
    crate::core::remote::sync::push(
        &store,
        &transport,
        remote_name,
        &branch,
        commit,
        opts.force,
        &CancelToken::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test;

    #[test]
    fn test_push_then_remote_has_branch() {
        test::run_table_repo_test(|repo| {
            let (_guard, url) = test::new_remote();
            command::remote::add(repo, "origin", &url)?;
            test::set_row(repo, "t", 1, 1)?;
            let head = test::commit_all(repo, "c1")?;

            push(repo, &PushOpts::default())?;

            // The remote now advertises the branch at our head
            let transport = open_transport(&url)?;
            let refs = transport.list_refs()?;
            assert_eq!(refs.get("refs/heads/main"), Some(&head.id));

            // And the local remote-tracking ref matches
            let tracking = RefReader::new(repo.store())
                .get_remote_branch("origin", "main")?
                .unwrap();
            assert_eq!(tracking, head.id);
            Ok(())
        });
    }

    #[test]
    fn test_non_fast_forward_push_rejected_then_forced() {
        test::run_table_repo_test(|repo| {
            let (_guard, url) = test::new_remote();
            command::remote::add(repo, "origin", &url)?;
            test::set_row(repo, "t", 1, 1)?;
            test::commit_all(repo, "c1")?;
            push(repo, &PushOpts::default())?;

            // Clone, then diverge both sides
            let dir = tempfile::tempdir().unwrap();
            let clone = command::clone::clone(
                &crate::opts::CloneOpts {
                    url: url.clone(),
                    branch: None,
                    depth: None,
                    remote_name: "origin".to_string(),
                },
                dir.path(),
            )?;
            test::set_row(repo, "t", 2, 2)?;
            test::commit_all(repo, "remote advanced")?;
            push(repo, &PushOpts::default())?;

            test::set_row(&clone, "t", 3, 3)?;
            let local_head = test::commit_all(&clone, "local divergence")?;

            let rejected = push(&clone, &PushOpts::default());
            assert!(matches!(rejected, Err(DoltError::NonFastForward(_))));

            push(
                &clone,
                &PushOpts {
                    force: true,
                    ..Default::default()
                },
            )?;
            let transport = open_transport(&url)?;
            let refs = transport.list_refs()?;
            assert_eq!(refs.get("refs/heads/main"), Some(&local_head.id));
            Ok(())
        });
    }

    #[test]
    fn test_push_twice_is_idempotent() {
        test::run_table_repo_test(|repo| {
            let (_guard, url) = test::new_remote();
            command::remote::add(repo, "origin", &url)?;
            test::set_row(repo, "t", 1, 1)?;
            test::commit_all(repo, "c1")?;
            push(repo, &PushOpts::default())?;
            push(repo, &PushOpts::default())?;
            Ok(())
        });
    }
}
