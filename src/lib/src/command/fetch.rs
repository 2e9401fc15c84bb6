//! Download refs and chunks from a remote, updating remote-tracking refs.
//! Fetch may heal ghost commits when the remote can supply their content.

use std::sync::Arc;

use crate::constants::DEFAULT_REMOTE_NAME;
use crate::core::remote::{open_transport, Transport};
use crate::error::{DoltError, Result};
use crate::model::{Hash, LocalRepository};
use crate::opts::FetchOpts;
use crate::util::cancel::CancelToken;

pub fn fetch(repo: &LocalRepository, opts: &FetchOpts) -> Result<Vec<(String, Hash)>> {
    let remote_name = opts.remote.as_deref().unwrap_or(DEFAULT_REMOTE_NAME);
    let remote = repo
        .get_remote(remote_name)?
        .ok_or_else(|| DoltError::remote_not_found(remote_name))?;
    let transport: Arc<dyn Transport> = Arc::from(open_transport(&remote.url)?);
    log::debug!("fetching from {remote_name} ({})", remote.url);
    crate::core::remote::sync::fetch(&repo.store(), &transport, remote_name, &CancelToken::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command;
    use crate::opts::PushOpts;
    use crate::test;

    #[test]
    fn test_fetch_updates_tracking_refs() {
        test::run_table_repo_test(|repo| {
            let (_guard, url) = test::new_remote();
            command::remote::add(repo, "origin", &url)?;
            test::set_row(repo, "t", 1, 1)?;
            let pushed = test::commit_all(repo, "c1")?;
            command::push::push(repo, &PushOpts::default())?;

            // A second repo fetches and sees the branch
            let dir = tempfile::tempdir().unwrap();
            let other = command::init(dir.path())?;
            command::remote::add(&other, "origin", &url)?;
            let branches = fetch(&other, &FetchOpts::default())?;
            assert!(branches.iter().any(|(b, h)| b == "main" && *h == pushed.id));

            let tracking = crate::core::index::refs::RefReader::new(other.store())
                .get_remote_branch("origin", "main")?;
            assert_eq!(tracking, Some(pushed.id));
            Ok(())
        });
    }
}
