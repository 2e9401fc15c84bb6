//! Switch HEAD to another branch. Each branch owns its working set, so
//! checkout never rewrites table data; it just moves the HEAD pointer and
//! materializes a working set for branches that lack one (e.g. created by a
//! fetch).

use crate::core::index::refs::{working_set_ref, RefReader};
use crate::core::index::{CommitReader, WorkingSet};
use crate::error::{DoltError, Result};
use crate::model::LocalRepository;

pub fn checkout(repo: &LocalRepository, name: &str, create: bool) -> Result<()> {
    if repo.current_branch().ok().as_deref() == Some(name) {
        return Err(DoltError::InvalidArgument(format!(
            "already on branch {name}"
        )));
    }
    let store = repo.store();
    let reader = RefReader::new(store.clone());
    if !reader.has_branch(name)? {
        if !create {
            return Err(DoltError::branch_not_found(name));
        }
        super::branch::create(repo, name, None)?;
    }
    let branch = reader.expect_branch(name)?;
    if reader.get_ref(&working_set_ref(name))?.is_none() {
        let commit = CommitReader::new(store.clone()).get_commit(&branch.commit_id)?;
        WorkingSet::create(store, name, commit.id, commit.root)?;
    }
    repo.set_current_branch(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command;
    use crate::test;

    #[test]
    fn test_checkout_switches_branches_and_working_sets() {
        test::run_table_repo_test(|repo| {
            checkout(repo, "feature", true)?;
            assert_eq!(repo.current_branch()?, "feature");
            test::set_row(repo, "t", 1, 100)?;
            assert_eq!(test::get_c(repo, "t", 1)?, Some(100));

            // The original branch's working set is untouched
            let original = command::status(repo)?;
            assert!(!original.is_clean());
            checkout(repo, "main", false)?;
            assert_eq!(test::get_c(repo, "t", 1)?, None);
            assert!(command::status(repo)?.is_clean());
            Ok(())
        });
    }

    #[test]
    fn test_checkout_missing_branch() {
        test::run_table_repo_test(|repo| {
            assert!(matches!(
                checkout(repo, "nope", false),
                Err(DoltError::NotFound(_))
            ));
            Ok(())
        });
    }
}
