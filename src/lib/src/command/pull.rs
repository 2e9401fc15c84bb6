//! Pull: fetch the remote, then merge its tracking branch into the current
//! branch.

use crate::command;
use crate::command::merge::MergeOutcome;
use crate::constants::DEFAULT_REMOTE_NAME;
use crate::error::{DoltError, Result};
use crate::model::LocalRepository;
use crate::opts::{FetchOpts, MergeOpts, PullOpts};

pub fn pull(repo: &LocalRepository, opts: &PullOpts) -> Result<MergeOutcome> {
    let remote_name = opts.remote.as_deref().unwrap_or(DEFAULT_REMOTE_NAME);
    let branch = repo.current_branch()?;
    let branches = command::fetch::fetch(
        repo,
        &FetchOpts {
            remote: Some(remote_name.to_string()),
        },
    )?;
    if !branches.iter().any(|(b, _)| *b == branch) {
        return Err(DoltError::NotFound(format!(
            "branch {branch} on remote {remote_name}"
        )));
    }
    command::merge::merge(
        repo,
        &format!("{remote_name}/{branch}"),
        &MergeOpts::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opts::PushOpts;
    use crate::test;

    #[test]
    fn test_pull_fast_forwards_clone() {
        test::run_table_repo_test(|repo| {
            let (_guard, url) = test::new_remote();
            command::remote::add(repo, "origin", &url)?;
            test::set_row(repo, "t", 1, 1)?;
            test::commit_all(repo, "c1")?;
            command::push::push(repo, &PushOpts::default())?;

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

            // Source advances; the clone pulls the new commit
            test::set_row(repo, "t", 2, 2)?;
            let newer = test::commit_all(repo, "c2")?;
            command::push::push(repo, &PushOpts::default())?;

            let outcome = pull(&clone, &PullOpts::default())?;
            assert!(matches!(outcome, MergeOutcome::FastForward(_)));
            assert_eq!(command::head_commit(&clone)?.id, newer.id);
            assert_eq!(test::get_c(&clone, "t", 2)?, Some(2));
            Ok(())
        });
    }
}
